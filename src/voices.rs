//! Voice catalog and best-voice resolution

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::types::{Language, Voice, VoicePrefs};

/// Voice names that usually indicate a higher-quality voice
static PREMIUM_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)premium|enhanced|natural").unwrap());

/// Snapshot of the voices the speech engine currently offers
#[derive(Debug, Clone, Default)]
pub struct VoiceCatalog {
    voices: Vec<Voice>,
}

impl VoiceCatalog {
    pub fn new(voices: Vec<Voice>) -> Self {
        Self { voices }
    }

    /// Replace the cached list wholesale
    pub fn refresh(&mut self, voices: Vec<Voice>) {
        debug!(count = voices.len(), "Voice catalog refreshed");
        self.voices = voices;
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Voices whose locale matches the language, in catalog order
    pub fn voices_for(&self, language: Language) -> impl Iterator<Item = &Voice> {
        self.voices.iter().filter(move |v| v.speaks(language))
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Voice> {
        self.voices.iter().find(|v| v.name == name)
    }

    /// Pick the voice to speak `language` with.
    ///
    /// Order: the user's pick if it still exists, then the ranked name list
    /// (substring match), then a premium-marked voice for the locale, then any
    /// voice for the locale. `None` means the platform default.
    pub fn find_best_voice(&self, language: Language, prefs: &VoicePrefs) -> Option<&Voice> {
        if let Some(user_pick) = prefs.get(language).and_then(|name| self.find_by_name(name)) {
            return Some(user_pick);
        }

        for name in language.preferred_voices() {
            if let Some(voice) = self.voices.iter().find(|v| v.name.contains(name)) {
                return Some(voice);
            }
        }

        self.voices_for(language)
            .find(|v| PREMIUM_MARKER.is_match(&v.name))
            .or_else(|| self.voices_for(language).next())
    }
}
