//! Heuristic source-language detection for selected text

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::Language;

static IDEOGRAPH: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\x{4e00}-\x{9fff}]").unwrap());

static FRENCH_CHAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[àâæçéèêëïîôœùûüÿÀÂÆÇÉÈÊËÏÎÔŒÙÛÜŸ]").unwrap());

static FRENCH_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(le|la|les|de|du|des|un|une|et|est|que|qui|dans|pour|avec|sur|pas|nous|vous|ils|elles|sont|ont|être|avoir|je|tu|il|elle|ce|cette|ces|mon|ton|son|mais|ou|donc|car|ni|très|aussi|plus|moins|chez|entre|depuis|pendant|avant|après|bonjour|merci|oui|non)\b",
    )
    .unwrap()
});

/// Share of ideographs above which text counts as Chinese
const IDEOGRAPH_RATIO: f64 = 0.3;

/// Guess the language of `text`. Defaults to English.
pub fn detect_language(text: &str) -> Language {
    let total = text.chars().count();
    let ideographs = IDEOGRAPH.find_iter(text).count();
    if ideographs > 0 && ideographs as f64 > total as f64 * IDEOGRAPH_RATIO {
        return Language::Zh;
    }

    if FRENCH_CHAR.find_iter(text).count() >= 2 {
        return Language::Fr;
    }
    if FRENCH_WORD.find_iter(text).count() >= 2 {
        return Language::Fr;
    }

    Language::En
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chinese() {
        assert_eq!(detect_language("你好，世界"), Language::Zh);
    }

    #[test]
    fn test_mostly_latin_with_few_ideographs_is_not_chinese() {
        assert_eq!(detect_language("The word 你 means you"), Language::En);
    }

    #[test]
    fn test_french_by_accents() {
        assert_eq!(detect_language("Café crème"), Language::Fr);
    }

    #[test]
    fn test_french_by_function_words() {
        assert_eq!(detect_language("Bonjour le monde"), Language::Fr);
    }

    #[test]
    fn test_single_french_marker_is_english() {
        assert_eq!(detect_language("The cafe is open"), Language::En);
        assert_eq!(detect_language("A naïve idea"), Language::En);
    }

    #[test]
    fn test_default_english() {
        assert_eq!(detect_language("Hello world"), Language::En);
        assert_eq!(detect_language(""), Language::En);
    }
}
