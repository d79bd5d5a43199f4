//! Translation bubble model: the rows shown for a selection and their
//! speaking/highlight flags.

use tracing::{debug, info};

use crate::client::{translate_all, Translator};
use crate::detect::detect_language;
use crate::sequencer::HighlightSink;
use crate::tokenizer::tokenize;
use crate::types::{Language, RowId};

/// One language line of the bubble
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub language: Language,
    pub text: String,
    /// Display units; concatenated they equal `text`
    pub units: Vec<String>,
    /// The untranslated selection
    pub is_source: bool,
    pub speaking: bool,
    pub active_unit: Option<usize>,
}

impl Row {
    pub fn new(language: Language, text: impl Into<String>, is_source: bool) -> Self {
        let text = text.into();
        let units = tokenize(&text, language);
        Self {
            language,
            text,
            units,
            is_source,
            speaking: false,
            active_unit: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Bubble {
    rows: Vec<Row>,
    visible: bool,
    max_selection_chars: usize,
}

impl Bubble {
    pub fn new(max_selection_chars: usize) -> Self {
        Self {
            rows: Vec::new(),
            visible: false,
            max_selection_chars,
        }
    }

    /// Translate a selection and fill the bubble with the source row followed
    /// by one row per target language.
    ///
    /// Returns `false` (and hides the bubble) for empty or oversized
    /// selections.
    pub async fn present<T: Translator>(&mut self, selection: &str, translator: &T) -> bool {
        let text = selection.trim();
        let chars = text.chars().count();
        if chars == 0 || chars >= self.max_selection_chars {
            debug!(chars, "Selection ignored");
            self.hide();
            return false;
        }

        let source = detect_language(text);
        info!(source = %source, chars, "Translating selection");

        let translations = translate_all(translator, text, source).await;
        self.show_rows(source, text, translations);
        true
    }

    /// Fill the bubble from already translated text
    pub fn show_rows(
        &mut self,
        source: Language,
        text: &str,
        translations: Vec<(Language, String)>,
    ) {
        self.rows.clear();
        self.rows.push(Row::new(source, text, true));
        self.rows.extend(
            translations
                .into_iter()
                .map(|(language, translated)| Row::new(language, translated, false)),
        );
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, row: RowId) -> Option<&Row> {
        self.rows.get(row)
    }

    /// The single active unit, if any
    pub fn active_unit(&self) -> Option<(RowId, usize)> {
        self.rows
            .iter()
            .enumerate()
            .find_map(|(i, r)| r.active_unit.map(|u| (i, u)))
    }

    pub fn speaking_rows(&self) -> Vec<RowId> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.speaking)
            .map(|(i, _)| i)
            .collect()
    }
}

impl HighlightSink for Bubble {
    fn set_row_speaking(&mut self, row: RowId, speaking: bool) {
        if let Some(r) = self.rows.get_mut(row) {
            r.speaking = speaking;
        }
    }

    fn activate_unit(&mut self, row: RowId, unit: usize) {
        self.clear_active_units();
        if let Some(r) = self.rows.get_mut(row) {
            if unit < r.units.len() {
                r.active_unit = Some(unit);
            }
        }
    }

    fn clear_active_units(&mut self) {
        for r in &mut self.rows {
            r.active_unit = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::NETWORK_FAILURE;

    struct FakeTranslator;

    impl Translator for FakeTranslator {
        async fn translate(&self, _text: &str, _from: Language, to: Language) -> String {
            match to {
                Language::En => "Hello the world".to_string(),
                Language::Zh => "你好世界".to_string(),
                Language::Fr => NETWORK_FAILURE.to_string(),
            }
        }
    }

    #[tokio::test]
    async fn test_present_builds_source_then_targets() {
        let mut bubble = Bubble::new(5000);
        assert!(bubble.present("  Bonjour le monde \n", &FakeTranslator).await);

        assert!(bubble.is_visible());
        let rows = bubble.rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].language, Language::Fr);
        assert!(rows[0].is_source);
        assert_eq!(rows[0].text, "Bonjour le monde");
        assert_eq!(rows[0].units, vec!["Bonjour", " ", "le", " ", "monde"]);
        assert_eq!(rows[1].language, Language::Zh);
        assert_eq!(rows[1].units, vec!["你好", "世界"]);
        assert_eq!(rows[2].language, Language::En);
        assert!(!rows[2].is_source);
    }

    #[tokio::test]
    async fn test_failure_message_stays_inline() {
        let mut bubble = Bubble::new(5000);
        bubble.present("Hello world", &FakeTranslator).await;

        let fr = bubble
            .rows()
            .iter()
            .find(|r| r.language == Language::Fr)
            .unwrap();
        assert_eq!(fr.text, NETWORK_FAILURE);
        let zh = bubble
            .rows()
            .iter()
            .find(|r| r.language == Language::Zh)
            .unwrap();
        assert_eq!(zh.text, "你好世界");
    }

    #[tokio::test]
    async fn test_blank_selection_hides() {
        let mut bubble = Bubble::new(5000);
        bubble.present("Hello", &FakeTranslator).await;

        assert!(!bubble.present("   ", &FakeTranslator).await);
        assert!(!bubble.is_visible());
    }

    #[tokio::test]
    async fn test_oversized_selection_hides() {
        let mut bubble = Bubble::new(10);
        assert!(!bubble.present("0123456789", &FakeTranslator).await);
        assert!(bubble.present("012345678", &FakeTranslator).await);
    }

    #[test]
    fn test_single_active_unit_across_rows() {
        let mut bubble = Bubble::new(5000);
        bubble.show_rows(
            Language::En,
            "Hello world",
            vec![
                (Language::Zh, "你好世界".to_string()),
                (Language::Fr, "Bonjour le monde".to_string()),
            ],
        );

        bubble.activate_unit(0, 2);
        assert_eq!(bubble.active_unit(), Some((0, 2)));

        bubble.activate_unit(2, 4);
        assert_eq!(bubble.active_unit(), Some((2, 4)));
        let active = bubble.rows().iter().filter(|r| r.active_unit.is_some()).count();
        assert_eq!(active, 1);

        bubble.clear_active_units();
        assert_eq!(bubble.active_unit(), None);
    }

    #[test]
    fn test_out_of_range_unit_is_ignored() {
        let mut bubble = Bubble::new(5000);
        bubble.show_rows(Language::En, "Hi", vec![]);

        bubble.activate_unit(0, 9);
        bubble.activate_unit(7, 0);
        assert_eq!(bubble.active_unit(), None);
    }
}
