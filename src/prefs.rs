//! Voice preference storage and the read-only resolver used while speaking.
//!
//! The settings surface writes preferences through a [`PreferenceStore`];
//! every consumer holds a [`PreferenceResolver`] that is loaded once and then
//! replaced wholesale on each storage change, so edits apply immediately.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::types::{Language, StoreError, VoicePrefs, VOICE_PREFS_KEY};

const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// A key changed in the store. `new_value` is `None` when the key was removed.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub key: String,
    pub new_value: Option<Value>,
}

/// Key/value settings store with change notifications
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Receive every change made through this store
    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;
}

/// In-process store, mainly for tests and ephemeral sessions
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
    changes: broadcast::Sender<StorageChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            values: Mutex::new(HashMap::new()),
            changes,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        {
            let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
            values.insert(key.to_string(), value.clone());
        }
        // No subscribers is fine
        let _ = self.changes.send(StorageChange {
            key: key.to_string(),
            new_value: Some(value),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}

/// JSON-object file on disk, re-read on every `get`
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
    changes: broadcast::Sender<StorageChange>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            changes,
        }
    }

    /// Platform config location, e.g. `~/.config/trilingo/storage.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("trilingo").join("storage.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map<String, Value>, StoreError> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }

        Ok(serde_json::from_str(&raw)?)
    }
}

impl PreferenceStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        {
            let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
            let mut all = self.read_all()?;
            all.insert(key.to_string(), value.clone());

            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&self.path, serde_json::to_string_pretty(&all)?)?;
        }

        debug!(path = %self.path.display(), key = %key, "Storage written");
        let _ = self.changes.send(StorageChange {
            key: key.to_string(),
            new_value: Some(value),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}

/// Decode the preference mapping carried by a storage change.
///
/// Returns `None` for changes to other keys. A removed or unreadable value
/// decodes to an empty mapping.
pub fn prefs_from_change(change: &StorageChange) -> Option<VoicePrefs> {
    if change.key != VOICE_PREFS_KEY {
        return None;
    }

    let prefs = match &change.new_value {
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring malformed voice preferences");
            VoicePrefs::new()
        }),
        None => VoicePrefs::new(),
    };
    Some(prefs)
}

/// Read-only view of the user's voice choices
#[derive(Debug, Clone, Default)]
pub struct PreferenceResolver {
    prefs: VoicePrefs,
}

impl PreferenceResolver {
    pub fn new(prefs: VoicePrefs) -> Self {
        Self { prefs }
    }

    /// Load the persisted mapping. Missing or unreadable data yields an
    /// empty mapping.
    pub fn load(store: &dyn PreferenceStore) -> Self {
        let prefs = match store.get(VOICE_PREFS_KEY) {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!(error = %e, "Stored voice preferences are malformed");
                VoicePrefs::new()
            }),
            Ok(None) => VoicePrefs::new(),
            Err(e) => {
                warn!(error = %e, "Failed to load voice preferences");
                VoicePrefs::new()
            }
        };

        debug!(count = prefs.len(), "Voice preferences loaded");
        Self { prefs }
    }

    /// Replace the mapping wholesale
    pub fn on_external_change(&mut self, prefs: VoicePrefs) {
        debug!(count = prefs.len(), "Voice preferences replaced");
        self.prefs = prefs;
    }

    pub fn prefs(&self) -> &VoicePrefs {
        &self.prefs
    }

    pub fn get(&self, language: Language) -> Option<&str> {
        self.prefs.get(language)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_load_from_empty_store() {
        let store = MemoryStore::new();
        let resolver = PreferenceResolver::load(&store);
        assert!(resolver.prefs().is_empty());
    }

    #[test]
    fn test_load_existing_prefs() {
        let store = MemoryStore::new();
        store
            .set(VOICE_PREFS_KEY, json!({"zh": "Tingting", "fr": "Thomas"}))
            .unwrap();

        let resolver = PreferenceResolver::load(&store);
        assert_eq!(resolver.get(Language::Zh), Some("Tingting"));
        assert_eq!(resolver.get(Language::Fr), Some("Thomas"));
        assert_eq!(resolver.get(Language::En), None);
    }

    #[test]
    fn test_load_malformed_prefs_is_empty() {
        let store = MemoryStore::new();
        store.set(VOICE_PREFS_KEY, json!("not a map")).unwrap();

        let resolver = PreferenceResolver::load(&store);
        assert!(resolver.prefs().is_empty());
    }

    #[test]
    fn test_external_change_replaces_wholesale() {
        let mut initial = VoicePrefs::new();
        initial.insert(Language::Zh, "Tingting");
        initial.insert(Language::En, "Samantha");
        let mut resolver = PreferenceResolver::new(initial);

        let mut updated = VoicePrefs::new();
        updated.insert(Language::Fr, "Thomas");
        resolver.on_external_change(updated);

        assert_eq!(resolver.get(Language::Zh), None);
        assert_eq!(resolver.get(Language::En), None);
        assert_eq!(resolver.get(Language::Fr), Some("Thomas"));
    }

    #[test]
    fn test_prefs_from_change_ignores_other_keys() {
        let change = StorageChange {
            key: "theme".to_string(),
            new_value: Some(json!("dark")),
        };
        assert!(prefs_from_change(&change).is_none());
    }

    #[test]
    fn test_prefs_from_removed_value_is_empty() {
        let change = StorageChange {
            key: VOICE_PREFS_KEY.to_string(),
            new_value: None,
        };
        assert_eq!(prefs_from_change(&change), Some(VoicePrefs::new()));
    }

    #[tokio::test]
    async fn test_memory_store_notifies_subscribers() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();

        store.set(VOICE_PREFS_KEY, json!({"en": "Karen"})).unwrap();

        let change = rx.recv().await.unwrap();
        let prefs = prefs_from_change(&change).unwrap();
        assert_eq!(prefs.get(Language::En), Some("Karen"));
    }

    #[test]
    fn test_file_store_roundtrip_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("storage.json"));

        store.set("theme", json!("dark")).unwrap();
        store.set(VOICE_PREFS_KEY, json!({"fr": "Amélie"})).unwrap();

        assert_eq!(store.get("theme").unwrap(), Some(json!("dark")));
        let resolver = PreferenceResolver::load(&store);
        assert_eq!(resolver.get(Language::Fr), Some("Amélie"));
    }

    #[test]
    fn test_file_store_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("absent.json"));
        assert_eq!(store.get(VOICE_PREFS_KEY).unwrap(), None);
    }

    #[test]
    fn test_file_store_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "{ broken").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(store.get(VOICE_PREFS_KEY), Err(StoreError::Parse(_))));
        assert!(PreferenceResolver::load(&store).prefs().is_empty());
    }
}
