//! Stage-specific answer interpretation: turns a free-text answer into the
//! canonical value stored under the stage's answer key, plus the solution-path
//! catalog and its numeric/fuzzy selection.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::text;
use crate::types::Stage;

/// Contracting-path options presented at `recommend_solution_path`
pub const SOLUTION_PATHS: &[(&str, &str)] = &[
    (
        "Compra Direta",
        "Aquisição patrimonial, controle total, ideal quando há verba CAPEX e vida útil longa.",
    ),
    (
        "Leasing Operacional",
        "Aluguel com manutenção incluída, menor investimento inicial, ideal para ativos com obsolescência rápida.",
    ),
    (
        "Serviço por Desempenho",
        "Contratado assume a operação e entrega resultado (ex.: disponibilidade 98%), transferindo riscos operacionais.",
    ),
    (
        "Comodato",
        "Equipamento cedido gratuitamente vinculado a contrato de consumíveis ou serviço.",
    ),
    (
        "Acordo de Registro de Preços (ARP)",
        "Registro de preços com múltiplas contratações futuras.",
    ),
];

static SINGLE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([1-9])\s*$").unwrap());

/// Resolve a user turn to a 0-based solution-path index: bare number first,
/// then exact/substring title match, then token-overlap similarity against
/// the threshold. `None` when nothing is close enough.
pub fn select_solution_path(raw: &str, threshold: f64) -> Option<usize> {
    if let Some(caps) = SINGLE_NUMBER.captures(raw) {
        let n: usize = caps[1].parse().ok()?;
        if (1..=SOLUTION_PATHS.len()).contains(&n) {
            return Some(n - 1);
        }
        return None;
    }

    let folded = text::fold(raw.trim());
    if folded.is_empty() {
        return None;
    }

    for (i, (title, _)) in SOLUTION_PATHS.iter().enumerate() {
        let folded_title = text::fold(title);
        if folded.contains(&folded_title) || folded_title.contains(&folded) {
            return Some(i);
        }
    }

    let input_tokens: Vec<&str> = folded.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).collect();
    let mut best: Option<(usize, f64)> = None;
    for (i, (title, _)) in SOLUTION_PATHS.iter().enumerate() {
        let folded_title = text::fold(title);
        let title_tokens: Vec<&str> = folded_title
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();
        let hits = input_tokens.iter().filter(|t| title_tokens.contains(t)).count();
        let union = input_tokens.len() + title_tokens.len() - hits;
        if union == 0 {
            continue;
        }
        let score = hits as f64 / union as f64;
        if score >= threshold && best.map_or(true, |(_, s)| score > s) {
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i)
}

static AFFIRMATIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(sim|tenho|possuo|previsto|prevista|consta|tem|havera|tera|sera)\b").unwrap());
static NEGATIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bnao\b|sem\s+pca|sem\s+parcelamento").unwrap());
static LEGAL_NORM_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(lei|decreto|instrucao\s+normativa|portaria|resolucao|norma)\b").unwrap()
});
static LOT_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(lote|lotes|fase|fases|regiao|regioes|etapa|etapas)\b").unwrap());

static QUANTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)\s*(unidades?|itens?|aeronaves?|veiculos?|servidores?|equipamentos?|licencas?)").unwrap()
});
// Longer scale words first: alternation is leftmost-first and "mil" is a
// prefix of "milhoes".
static MONEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(r\$\s*)?(\d+(?:[.,]\d+)*)\s*(milhoes|milhao|mil|mi|k)?").unwrap()
});

/// Canonical stored value for one answer stage. Stored answers feed the
/// summary recap and the generated document verbatim.
pub fn interpret(stage: Stage, raw: &str) -> String {
    let trimmed = raw.trim();
    let folded = text::fold(trimmed);
    match stage {
        Stage::AskPca => {
            if NEGATIVE.is_match(&folded) {
                "não previsto no PCA".to_string()
            } else if AFFIRMATIVE.is_match(&folded) && trimmed.len() <= 25 {
                "sim, previsto no PCA".to_string()
            } else {
                trimmed.to_string()
            }
        }
        Stage::AskLegalNorms => trimmed.to_string(),
        Stage::AskQuantValue => trimmed.to_string(),
        Stage::AskParcelamento => {
            if LOT_WORDS.is_match(&folded) {
                trimmed.to_string()
            } else if NEGATIVE.is_match(&folded) {
                "não".to_string()
            } else if AFFIRMATIVE.is_match(&folded) {
                "sim".to_string()
            } else {
                trimmed.to_string()
            }
        }
        other => {
            log::warn!("interpret called for non-answer stage {other}");
            trimmed.to_string()
        }
    }
}

/// Whether a legal-norms answer names a recognizable norm (drives the echo
/// wording, not the stored value).
pub fn mentions_legal_norm(raw: &str) -> bool {
    LEGAL_NORM_WORDS.is_match(&text::fold(raw))
}

/// Parsed quantity/value echo: what the engine repeats back so the user can
/// catch a misread number. The stored answer stays verbatim.
pub fn quant_value_echo(raw: &str) -> Option<String> {
    let folded = text::fold(raw);
    let mut parts: Vec<String> = Vec::new();

    if let Some(caps) = QUANTITY.captures(&folded) {
        let qty = &caps[1];
        let unit = caps.get(2).map(|m| m.as_str()).unwrap_or("unidades");
        parts.push(format!("{qty} {unit}"));
    }

    // A bare number is a quantity, not money; require the currency sign or a
    // scale word before reading a value out of it.
    for caps in MONEY.captures_iter(&folded) {
        if caps.get(1).is_none() && caps.get(3).is_none() {
            continue;
        }
        let digits = caps[2].replace('.', "").replace(',', ".");
        if let Ok(mut value) = digits.parse::<f64>() {
            match caps.get(3).map(|m| m.as_str()) {
                Some("mil") | Some("k") => value *= 1_000.0,
                Some("milhao") | Some("milhoes") | Some("mi") => value *= 1_000_000.0,
                _ => {}
            }
            if value >= 1.0 {
                parts.push(format!("valor estimado de R$ {}", format_brl(value)));
                break;
            }
        }
    }

    if folded.contains("ano") || folded.contains("anual") {
        parts.push("por ano".to_string());
    } else if folded.contains("mes") || folded.contains("mensal") {
        parts.push("por mês".to_string());
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

/// Thousands separated by dots, two decimal places with a comma.
fn format_brl(value: f64) -> String {
    let cents = (value * 100.0).round() as u64;
    let whole = cents / 100;
    let frac = cents % 100;
    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    format!("{grouped},{frac:02}")
}
