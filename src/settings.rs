//! Runtime configuration
//!
//! Read from `settings.json` in the platform config directory:
//!
//! - macOS: `~/Library/Application Support/trilingo/settings.json`
//! - Linux: `~/.config/trilingo/settings.json`
//! - Windows: `%APPDATA%/trilingo/settings.json`
//!
//! Every field is optional; missing fields take the defaults below.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::prefs::FileStore;
use crate::sequencer::{SpeechRates, NATURAL_RATE, WORD_RATE};
use crate::types::SettingsError;

pub const DEFAULT_ENDPOINT: &str = "https://api.mymemory.translated.net/get";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// MyMemory-compatible `get` endpoint
    pub translate_endpoint: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// How long successful translations stay cached
    pub cache_ttl_secs: u64,
    pub natural_rate: f32,
    pub word_rate: f32,
    pub preview_rate: f32,
    /// Selections this long or longer are ignored
    pub max_selection_chars: usize,
    /// Preference storage file; platform default when unset
    pub storage_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            translate_endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            cache_ttl_secs: 10 * 60,
            natural_rate: NATURAL_RATE,
            word_rate: WORD_RATE,
            preview_rate: NATURAL_RATE,
            max_selection_chars: 5000,
            storage_path: None,
        }
    }
}

impl Settings {
    /// Load settings from `path`, validating the endpoint.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&raw)?;
        settings.validate()?;
        info!(path = %path.display(), "Settings loaded");
        Ok(settings)
    }

    /// Load from the platform config file if present, otherwise defaults.
    pub fn load_or_default() -> Result<Self, SettingsError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                debug!("No settings file; using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("trilingo").join("settings.json"))
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        url::Url::parse(&self.translate_endpoint)?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn rates(&self) -> SpeechRates {
        SpeechRates {
            natural: self.natural_rate,
            word: self.word_rate,
        }
    }

    pub fn storage_path(&self) -> Option<PathBuf> {
        self.storage_path.clone().or_else(FileStore::default_path)
    }
}
