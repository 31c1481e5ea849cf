//! Text canonicalization shared by intent matching, retrieval scoring,
//! and the self-check rewriter. Handles mixed English/Arabic input:
//! diacritics are stripped and common letter variants folded so that
//! `مُساعَدة` and `مساعده` index to the same tokens.

/// Lowercase, fold Arabic letter variants, strip punctuation, and
/// collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.to_lowercase().chars() {
        match ch {
            // Arabic diacritics (harakat/tashkeel)
            '\u{064B}'..='\u{0652}' => {}
            'أ' | 'إ' | 'آ' => out.push('ا'),
            'ة' => out.push('ه'),
            'ى' => out.push('ي'),
            '؟' | '?' | '.' | ',' | '!' | '|' | ':' | ';' | '-' => out.push(' '),
            other => out.push(other),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split normalized text into keyword tokens of at least two characters.
pub fn tokenize(text: &str) -> Vec<String> {
    normalize_text(text)
        .split(' ')
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{normalize_text, tokenize};

    #[test]
    fn folds_arabic_variants_and_strips_diacritics() {
        assert_eq!(normalize_text("مُساعَدة"), "مساعده");
        assert_eq!(normalize_text("أهلاً"), "اهلا");
        assert_eq!(normalize_text("على وإلى"), "علي والي");
    }

    #[test]
    fn strips_punctuation_and_collapses_whitespace() {
        assert_eq!(normalize_text("Hello,   World!  How?"), "hello world how");
        assert_eq!(normalize_text("status: ready; go"), "status ready go");
    }

    #[test]
    fn tokenize_drops_single_character_tokens() {
        assert_eq!(tokenize("a big deal"), vec!["big", "deal"]);
    }

    #[test]
    fn tokenize_is_stable_for_already_normalized_input() {
        assert_eq!(tokenize("send usdc now"), vec!["send", "usdc", "now"]);
    }

    #[test]
    fn empty_input_produces_no_tokens() {
        assert_eq!(normalize_text(""), "");
        assert!(tokenize("  ؟! ").is_empty());
    }
}
