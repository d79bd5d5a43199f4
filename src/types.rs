//! Shared types and error definitions

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Storage key under which voice preferences are persisted
pub const VOICE_PREFS_KEY: &str = "voicePrefs";

/// Index of a row inside the bubble (source row is 0)
pub type RowId = usize;

/// The configured languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Zh,
    En,
    Fr,
}

impl Language {
    /// All languages in display order
    pub const ALL: [Language; 3] = [Language::Zh, Language::En, Language::Fr];

    /// Short code used by the translation provider and in storage
    pub fn code(&self) -> &'static str {
        match self {
            Self::Zh => "zh",
            Self::En => "en",
            Self::Fr => "fr",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Zh => "中文",
            Self::En => "English",
            Self::Fr => "Français",
        }
    }

    /// Synthesis locale tag
    pub fn locale(&self) -> &'static str {
        match self {
            Self::Zh => "zh-CN",
            Self::En => "en-US",
            Self::Fr => "fr-FR",
        }
    }

    /// Locale up to the first `-`, used to match voice locales
    pub fn locale_prefix(&self) -> &'static str {
        let locale = self.locale();
        locale.split('-').next().unwrap_or(locale)
    }

    /// Ranked voice names, most natural first
    pub fn preferred_voices(&self) -> &'static [&'static str] {
        match self {
            Self::Zh => &["Tingting", "Sinji", "Meijia", "Google 普通话"],
            Self::En => &["Samantha", "Karen", "Daniel", "Google US English"],
            Self::Fr => &["Thomas", "Amélie", "Audrey", "Google français"],
        }
    }

    /// Sentence spoken when previewing a voice
    pub fn sample_text(&self) -> &'static str {
        match self {
            Self::Zh => "你好，欢迎使用翻译助手",
            Self::En => "Hello, welcome to the translator",
            Self::Fr => "Bonjour, bienvenue au traducteur",
        }
    }

    /// Whether text is written without word separators
    pub fn is_logographic(&self) -> bool {
        matches!(self, Self::Zh)
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.code() == code)
    }

    /// The other two languages, in display order
    pub fn targets(self) -> impl Iterator<Item = Language> {
        Self::ALL.into_iter().filter(move |l| *l != self)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A synthesis voice reported by the speech engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voice {
    /// Voice identifier (also the display name on most platforms)
    pub name: String,
    /// Locale tag, e.g. "en-US"
    pub locale: String,
    /// Whether synthesis happens on-device
    pub local: bool,
}

impl Voice {
    pub fn new(name: impl Into<String>, locale: impl Into<String>, local: bool) -> Self {
        Self {
            name: name.into(),
            locale: locale.into(),
            local,
        }
    }

    pub fn speaks(&self, language: Language) -> bool {
        self.locale.starts_with(language.locale_prefix())
    }
}

/// User-chosen voice name per language.
///
/// Persisted as a JSON object keyed by language code. Unknown codes are
/// dropped on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct VoicePrefs(BTreeMap<Language, String>);

impl VoicePrefs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, language: Language) -> Option<&str> {
        self.0.get(&language).map(String::as_str)
    }

    pub fn insert(&mut self, language: Language, voice: impl Into<String>) {
        self.0.insert(language, voice.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Language, &str)> {
        self.0.iter().map(|(l, v)| (*l, v.as_str()))
    }
}

impl From<BTreeMap<String, String>> for VoicePrefs {
    fn from(raw: BTreeMap<String, String>) -> Self {
        Self(
            raw.into_iter()
                .filter_map(|(code, voice)| Language::from_code(&code).map(|l| (l, voice)))
                .collect(),
        )
    }
}

impl From<VoicePrefs> for BTreeMap<String, String> {
    fn from(prefs: VoicePrefs) -> Self {
        prefs
            .0
            .into_iter()
            .map(|(l, v)| (l.code().to_string(), v))
            .collect()
    }
}

impl FromIterator<(Language, String)> for VoicePrefs {
    fn from_iter<T: IntoIterator<Item = (Language, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ===== Speech Types =====

/// Handle for one queued speech request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtteranceId(pub u64);

/// One queued speech request
#[derive(Debug, Clone, PartialEq)]
pub struct UtteranceRequest {
    pub text: String,
    pub locale: String,
    /// Multiplier of the engine's normal rate
    pub rate: f32,
    /// Multiplier of the engine's normal pitch
    pub pitch: f32,
    /// `None` means the platform default voice for `locale`
    pub voice: Option<Voice>,
}

/// Lifecycle callbacks fired by the speech engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechEventKind {
    Start,
    End,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeechEvent {
    pub id: UtteranceId,
    pub kind: SpeechEventKind,
}

impl SpeechEvent {
    pub fn start(id: UtteranceId) -> Self {
        Self {
            id,
            kind: SpeechEventKind::Start,
        }
    }

    pub fn end(id: UtteranceId) -> Self {
        Self {
            id,
            kind: SpeechEventKind::End,
        }
    }

    pub fn error(id: UtteranceId) -> Self {
        Self {
            id,
            kind: SpeechEventKind::Error,
        }
    }
}

// ===== Translation Provider Types =====

/// Raw response from the MyMemory `get` endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTranslation {
    /// Usually an integer, occasionally a numeric string
    #[serde(default)]
    pub response_status: Option<serde_json::Value>,
    #[serde(default)]
    pub response_data: Option<RawTranslationData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTranslationData {
    pub translated_text: Option<String>,
}

impl RawTranslation {
    pub fn status(&self) -> Option<i64> {
        self.response_status.as_ref().and_then(serde_json::Value::as_i64)
    }
}

// ===== Error Types =====

/// Translation failures. Callers surface these as fixed messages.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Provider rejected request (status {0:?})")]
    Provider(Option<i64>),
}

impl TranslateError {
    /// Whether the failure happened below the provider (network, decoding)
    pub fn is_transport(&self) -> bool {
        !matches!(self, Self::Provider(_))
    }
}

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("Speech engine unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to queue utterance: {0}")]
    Queue(String),

    #[error("Failed to stop speech: {0}")]
    Stop(String),

    #[error("Failed to list voices: {0}")]
    Voices(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid translation endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}
