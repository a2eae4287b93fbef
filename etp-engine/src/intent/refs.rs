// Requirement reference extraction from folded user text

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::ListRef;

static R_PREFIXED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\br(\d+)\b").unwrap());
static STANDALONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d+)\b").unwrap());
static RANGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d+)\s*(?:-|a)\s*(\d+)\b").unwrap());

// Ranges wider than this are ignored as references; the endpoints are still
// picked up individually.
const MAX_RANGE_SPAN: usize = 100;

const ORDINALS: &[(&str, usize)] = &[
    ("primeiro", 1),
    ("primeira", 1),
    ("segundo", 2),
    ("segunda", 2),
    ("terceiro", 3),
    ("terceira", 3),
    ("quarto", 4),
    ("quarta", 4),
    ("quinto", 5),
    ("quinta", 5),
    ("sexto", 6),
    ("sexta", 6),
    ("setimo", 7),
    ("setima", 7),
    ("oitavo", 8),
    ("oitava", 8),
    ("nono", 9),
    ("nona", 9),
    ("decimo", 10),
    ("decima", 10),
];

fn push_unique(out: &mut Vec<ListRef>, r: ListRef) {
    if !out.contains(&r) {
        out.push(r);
    }
}

fn word_present(folded: &str, word: &str) -> bool {
    folded.split(|c: char| !c.is_alphanumeric()).any(|w| w == word)
}

/// Extract every requirement reference in the text: cardinal numbers,
/// R-prefixed labels, numeric ranges ("2-4", "1 a 5") and positional words.
/// Expects text already lower-cased and accent-folded. Extraction is
/// context-free; range validity against the actual list is checked when the
/// references are resolved.
pub fn extract(folded: &str) -> Vec<ListRef> {
    let mut out = Vec::new();

    for caps in R_PREFIXED.captures_iter(folded) {
        if let Ok(n) = caps[1].parse::<usize>() {
            push_unique(&mut out, ListRef::Index(n));
        }
    }

    for caps in STANDALONE.captures_iter(folded) {
        if let Ok(n) = caps[1].parse::<usize>() {
            push_unique(&mut out, ListRef::Index(n));
        }
    }

    for caps in RANGE.captures_iter(folded) {
        let (start, end) = match (caps[1].parse::<usize>(), caps[2].parse::<usize>()) {
            (Ok(s), Ok(e)) => (s, e),
            _ => continue,
        };
        if start < end && end - start <= MAX_RANGE_SPAN {
            for n in start..=end {
                push_unique(&mut out, ListRef::Index(n));
            }
        }
    }

    for (word, index) in ORDINALS {
        if word_present(folded, word) {
            push_unique(&mut out, ListRef::Index(*index));
        }
    }
    // "penultimo" contains no standalone "ultimo" word, so order is free here
    if word_present(folded, "ultimo") || word_present(folded, "ultima") {
        push_unique(&mut out, ListRef::Last);
    }
    if word_present(folded, "penultimo") || word_present(folded, "penultima") {
        push_unique(&mut out, ListRef::SecondLast);
    }

    out
}
