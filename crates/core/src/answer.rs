//! Comparison of typed answers against the expected text.

use unidecode::unidecode;

/// Canonical form used when comparing a written answer: trimmed, lowercased
/// and with diacritics folded to ASCII, so `"Café "` and `"cafe"` compare equal.
#[must_use]
pub fn normalize_answer(raw: &str) -> String {
    let trimmed = raw.trim();
    let folded = if trimmed.is_ascii() {
        trimmed.to_owned()
    } else {
        unidecode(trimmed)
    };
    folded.trim().to_lowercase()
}

#[must_use]
pub fn answers_match(given: &str, expected: &str) -> bool {
    let given = normalize_answer(given);
    !given.is_empty() && given == normalize_answer(expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_ignores_case_whitespace_and_accents() {
        assert_eq!(normalize_answer("  Élève "), "eleve");
        assert!(answers_match("cafe", "Café"));
        assert!(answers_match("  HAUS", "haus"));
    }

    #[test]
    fn different_words_do_not_match() {
        assert!(!answers_match("chien", "chat"));
    }

    #[test]
    fn blank_answers_never_match() {
        assert!(!answers_match("   ", ""));
        assert!(!answers_match("", "chat"));
    }
}
