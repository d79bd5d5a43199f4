//! Splits row text into highlightable units.
//!
//! Concatenating the units of a text always reproduces the text exactly,
//! whitespace and punctuation included. Blank units exist for layout only
//! and are skipped when speaking.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::Language;

/// One or two ideographs, or a run of anything else
static LOGOGRAPHIC_UNITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x{4e00}-\x{9fff}]{1,2}|[^\x{4e00}-\x{9fff}]+").unwrap());

/// Runs of non-whitespace alternating with runs of whitespace
static SPACED_UNITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+|\s+").unwrap());

/// Split `text` into ordered units using the rules for `language`.
pub fn tokenize(text: &str, language: Language) -> Vec<String> {
    let pattern = if language.is_logographic() {
        &LOGOGRAPHIC_UNITS
    } else {
        &SPACED_UNITS
    };

    let units: Vec<String> = pattern
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();

    if units.is_empty() {
        vec![text.to_string()]
    } else {
        units
    }
}

/// Units worth speaking, as `(unit index, trimmed text)`.
pub fn speakable_units<S: AsRef<str>>(units: &[S]) -> Vec<(usize, &str)> {
    units
        .iter()
        .enumerate()
        .filter_map(|(i, unit)| {
            let trimmed = unit.as_ref().trim();
            (!trimmed.is_empty()).then_some((i, trimmed))
        })
        .collect()
}
