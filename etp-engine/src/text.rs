// Text folding shared by intent matching and duplicate detection

/// Lowercase and strip Portuguese diacritics so that "Não" and "nao"
/// compare equal before any pattern is evaluated.
pub fn fold(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

/// Comparison key for requirement texts: folded, punctuation dropped,
/// whitespace runs collapsed to single spaces. Two requirements are
/// duplicates exactly when their keys are equal.
pub fn dedupe_key(text: &str) -> String {
    let folded = fold(text);
    let mut key = String::with_capacity(folded.len());
    let mut pending_space = false;
    for c in folded.chars() {
        if c.is_alphanumeric() {
            if pending_space && !key.is_empty() {
                key.push(' ');
            }
            pending_space = false;
            key.push(c);
        } else {
            pending_space = true;
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_strips_accents_and_case() {
        assert_eq!(fold("Não Sei"), "nao sei");
        assert_eq!(fold("MANUTENÇÃO preventiva"), "manutencao preventiva");
        assert_eq!(fold("último"), "ultimo");
    }

    #[test]
    fn dedupe_key_ignores_punctuation_and_spacing() {
        assert_eq!(dedupe_key("Garantia mínima, de 12 meses."), "garantia minima de 12 meses");
        assert_eq!(
            dedupe_key("garantia  minima de 12 meses"),
            dedupe_key("Garantia mínima de 12 meses!")
        );
    }

    #[test]
    fn dedupe_key_has_no_edge_spaces() {
        assert_eq!(dedupe_key("  - item um -  "), "item um");
    }
}
