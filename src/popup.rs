//! Settings surface: per-language voice selection and preview.
//!
//! This is the only place voice preferences are written. Consumers pick the
//! change up through the store's subscription.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::prefs::PreferenceStore;
use crate::tts::SpeechEngine;
use crate::types::{
    Language, SpeechError, StoreError, UtteranceId, UtteranceRequest, Voice, VoicePrefs,
    VOICE_PREFS_KEY,
};
use crate::voices::VoiceCatalog;

static VENDOR_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(Microsoft|Google)\s*").unwrap());
static TRAILING_PARENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\(.*\)$").unwrap());

/// One entry of a language's voice dropdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceOption {
    /// Stored in preferences
    pub value: String,
    pub label: String,
}

/// Shortened label: vendor prefix and parenthesized suffix removed, `*`
/// marking network voices.
pub fn display_name(voice: &Voice) -> String {
    let name = VENDOR_PREFIX.replace(&voice.name, "");
    let mut label = TRAILING_PARENS.replace(&name, "").into_owned();
    if !voice.local {
        label.push_str(" *");
    }
    label
}

/// Dropdown entries for `language`; empty when no voice speaks it
pub fn options(catalog: &VoiceCatalog, language: Language) -> Vec<VoiceOption> {
    catalog
        .voices_for(language)
        .map(|v| VoiceOption {
            value: v.name.clone(),
            label: display_name(v),
        })
        .collect()
}

/// Build preferences from the dropdown selections, skipping empty ones
pub fn prefs_from_selections(selections: &BTreeMap<Language, String>) -> VoicePrefs {
    selections
        .iter()
        .filter(|(_, name)| !name.is_empty())
        .map(|(language, name)| (*language, name.clone()))
        .collect()
}

/// Persist the selections; every subscriber sees the new mapping
pub fn save(
    store: &dyn PreferenceStore,
    selections: &BTreeMap<Language, String>,
) -> Result<VoicePrefs, StoreError> {
    let prefs = prefs_from_selections(selections);
    store.set(VOICE_PREFS_KEY, serde_json::to_value(&prefs)?)?;
    info!(count = prefs.len(), "Voice preferences saved");
    Ok(prefs)
}

/// Selections restored from the store, for pre-filling the dropdowns
pub fn saved_selections(store: &dyn PreferenceStore) -> BTreeMap<Language, String> {
    let prefs: VoicePrefs = match store.get(VOICE_PREFS_KEY) {
        Ok(Some(value)) => serde_json::from_value(value).unwrap_or_default(),
        Ok(None) => VoicePrefs::new(),
        Err(e) => {
            warn!(error = %e, "Failed to read saved voices");
            VoicePrefs::new()
        }
    };
    prefs
        .iter()
        .map(|(language, name)| (language, name.to_string()))
        .collect()
}

/// Speak the language's sample sentence with the selected voice.
///
/// Stops whatever is playing first. An unknown selection falls back to the
/// platform default for the language.
pub fn preview<E: SpeechEngine + ?Sized>(
    engine: &mut E,
    catalog: &VoiceCatalog,
    language: Language,
    selected: Option<&str>,
    rate: f32,
) -> Result<UtteranceId, SpeechError> {
    engine.cancel_all()?;

    let voice = selected.and_then(|name| catalog.find_by_name(name)).cloned();
    debug!(language = %language, voice = ?voice.as_ref().map(|v| &v.name), "Previewing voice");

    engine.speak(UtteranceRequest {
        text: language.sample_text().to_string(),
        locale: language.locale_prefix().to_string(),
        rate,
        pitch: 1.0,
        voice,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::MemoryStore;
    use crate::tts::testing::RecordingEngine;

    #[test]
    fn test_display_name_strips_vendor_and_suffix() {
        let voice = Voice::new("Microsoft Denise Online (Natural) - French (France)", "fr-FR", false);
        assert_eq!(display_name(&voice), "Denise Online *");

        let voice = Voice::new("Google français", "fr-FR", false);
        assert_eq!(display_name(&voice), "français *");

        let voice = Voice::new("Thomas", "fr-FR", true);
        assert_eq!(display_name(&voice), "Thomas");
    }

    #[test]
    fn test_options_filter_by_language() {
        let catalog = VoiceCatalog::new(vec![
            Voice::new("Thomas", "fr-FR", true),
            Voice::new("Samantha", "en-US", true),
            Voice::new("Amélie", "fr-CA", true),
        ]);

        let fr = options(&catalog, Language::Fr);
        let values: Vec<_> = fr.iter().map(|o| o.value.as_str()).collect();
        assert_eq!(values, vec!["Thomas", "Amélie"]);
        assert!(options(&catalog, Language::Zh).is_empty());
    }

    #[tokio::test]
    async fn test_save_notifies_and_skips_empty() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();

        let mut selections = BTreeMap::new();
        selections.insert(Language::En, "Samantha".to_string());
        selections.insert(Language::Fr, String::new());
        let prefs = save(&store, &selections).unwrap();

        assert_eq!(prefs.len(), 1);
        let change = rx.recv().await.unwrap();
        assert_eq!(change.key, VOICE_PREFS_KEY);
        assert_eq!(change.new_value, Some(serde_json::json!({"en": "Samantha"})));

        let restored = saved_selections(&store);
        assert_eq!(restored.get(&Language::En).map(String::as_str), Some("Samantha"));
        assert!(!restored.contains_key(&Language::Fr));
    }

    #[test]
    fn test_preview_cancels_and_speaks_sample() {
        let catalog = VoiceCatalog::new(vec![Voice::new("Tingting", "zh-CN", true)]);
        let mut engine = RecordingEngine::default();

        preview(&mut engine, &catalog, Language::Zh, Some("Tingting"), 0.9).unwrap();

        assert_eq!(engine.cancels, 1);
        let request = &engine.requests[0].1;
        assert_eq!(request.text, "你好，欢迎使用翻译助手");
        assert_eq!(request.locale, "zh");
        assert_eq!(request.rate, 0.9);
        assert_eq!(request.voice.as_ref().unwrap().name, "Tingting");
    }

    #[test]
    fn test_preview_unknown_voice_uses_default() {
        let catalog = VoiceCatalog::default();
        let mut engine = RecordingEngine::default();

        preview(&mut engine, &catalog, Language::En, Some("Ghost"), 0.9).unwrap();
        assert!(engine.requests[0].1.voice.is_none());
    }
}
