//! Requirement list manager: structural edits over the ID-addressed list.
//!
//! Every mutating path renumbers IDs back to a contiguous 1..N and re-checks
//! the normalized-text duplicate invariant before the new list is returned.
//! A mutation that would break the invariant is rejected wholesale; the
//! caller keeps the untouched list.

use thiserror::Error;

use crate::text;
use crate::types::{resolve_refs, Command, Requirement};

/// Why a structural command was not applied
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ListRejection {
    #[error("ambiguous requirement reference ({resolved} resolved)")]
    AmbiguousReference { resolved: usize },
    #[error("duplicate requirement text rejected: {text}")]
    DuplicateRejected { text: String },
}

/// Apply one structural command to the list. Returns the new list and
/// whether it differs from the input. The input is never mutated: on
/// rejection the caller still holds the original.
pub fn apply(
    requirements: &[Requirement],
    command: &Command,
    necessity: Option<&str>,
) -> Result<(Vec<Requirement>, bool), ListRejection> {
    let next = match command {
        Command::Remove { targets } => {
            let resolved = resolve_refs(targets, requirements.len());
            if resolved.is_empty() {
                return Err(ListRejection::AmbiguousReference { resolved: 0 });
            }
            requirements
                .iter()
                .enumerate()
                .filter(|(i, _)| !resolved.contains(&(i + 1)))
                .map(|(_, r)| r.clone())
                .collect::<Vec<_>>()
        }
        Command::KeepOnly { targets } => {
            let resolved = resolve_refs(targets, requirements.len());
            if resolved.is_empty() {
                return Err(ListRejection::AmbiguousReference { resolved: 0 });
            }
            // Iteration order keeps the survivors in their original relative
            // order no matter how the user listed them.
            requirements
                .iter()
                .enumerate()
                .filter(|(i, _)| resolved.contains(&(i + 1)))
                .map(|(_, r)| r.clone())
                .collect::<Vec<_>>()
        }
        Command::Edit { targets, text } => {
            let resolved = resolve_refs(targets, requirements.len());
            if resolved.len() != 1 {
                return Err(ListRejection::AmbiguousReference {
                    resolved: resolved.len(),
                });
            }
            // The engine only delegates edits that carry replacement text;
            // without it the list stays as-is.
            let Some(new_text) = text.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
                return Ok((requirements.to_vec(), false));
            };
            let index = resolved[0] - 1;
            let new_key = text::dedupe_key(new_text);
            for (i, other) in requirements.iter().enumerate() {
                if i != index && text::dedupe_key(&other.text) == new_key {
                    return Err(ListRejection::DuplicateRejected {
                        text: new_text.to_string(),
                    });
                }
            }
            let mut next = requirements.to_vec();
            next[index].text = new_text.to_string();
            if next[index].justification.is_none() {
                next[index].justification = Some(generate_justification(new_text, necessity));
            }
            next
        }
        Command::Include { text } => {
            let new_text = text.trim();
            let new_key = text::dedupe_key(new_text);
            if requirements.iter().any(|r| text::dedupe_key(&r.text) == new_key) {
                return Err(ListRejection::DuplicateRejected {
                    text: new_text.to_string(),
                });
            }
            let mut next = requirements.to_vec();
            next.push(Requirement::with_justification(
                next.len() as u32 + 1,
                new_text,
                generate_justification(new_text, necessity),
            ));
            next
        }
        other => {
            log::warn!("requirement list manager received non-structural command: {other:?}");
            return Ok((requirements.to_vec(), false));
        }
    };

    let next = renumber(next);
    ensure_no_duplicates(&next)?;
    let changed = next.as_slice() != requirements;
    Ok((next, changed))
}

/// Relabel IDs to the contiguous sequence 1..N.
pub fn renumber(mut requirements: Vec<Requirement>) -> Vec<Requirement> {
    for (i, requirement) in requirements.iter_mut().enumerate() {
        requirement.id = i as u32 + 1;
    }
    requirements
}

fn ensure_no_duplicates(requirements: &[Requirement]) -> Result<(), ListRejection> {
    let mut seen: Vec<String> = Vec::with_capacity(requirements.len());
    for requirement in requirements {
        let key = text::dedupe_key(&requirement.text);
        if seen.contains(&key) {
            return Err(ListRejection::DuplicateRejected {
                text: requirement.text.clone(),
            });
        }
        seen.push(key);
    }
    Ok(())
}

/// Fill in a rationale for requirements the user added or rewrote without
/// one. Keyword templates keyed on the requirement wording.
pub fn generate_justification(requirement_text: &str, necessity: Option<&str>) -> String {
    let necessity = match necessity.map(str::trim).filter(|n| !n.is_empty()) {
        Some(n) => n.to_lowercase(),
        None => return "Justificativa necessária para atender à demanda".to_string(),
    };
    let folded = text::fold(requirement_text);

    if ["material", "equipamento", "ferramenta"].iter().any(|w| folded.contains(w)) {
        format!("Material necessário para execução adequada de {necessity}")
    } else if ["mao de obra", "pessoal", "profissional"].iter().any(|w| folded.contains(w)) {
        format!("Recursos humanos qualificados para {necessity}")
    } else if ["prazo", "cronograma", "tempo"].iter().any(|w| folded.contains(w)) {
        format!("Cronograma adequado para atender {necessity}")
    } else if ["qualidade", "padrao", "especificacao"].iter().any(|w| folded.contains(w)) {
        format!("Garantia de qualidade para {necessity}")
    } else {
        format!("Requisito essencial para atendimento de {necessity}")
    }
}
