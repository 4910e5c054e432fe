//! Typed key-value persistence for client preferences.
//!
//! Values are stored as JSON under string keys. [`TypedKey`] binds a key name
//! to a value type and a default, so readers never see a missing or
//! undecodable entry: they get the default and a warning in the log.

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{ClientError, Result};
use crate::models::{AspectRatio, ValidatedImage};

/// Raw storage backend.
pub trait KeyValueStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Option<Value>;

    fn set_raw(&self, key: &str, value: Value) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// Process-local store, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_raw(&self, key: &str) -> Option<Value> {
        self.entries.lock().get(key).cloned()
    }

    fn set_raw(&self, key: &str, value: Value) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// A JSON object persisted to one file. Every write rewrites the file through
/// a temporary sibling and a rename.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`. A corrupt file is logged
    /// and treated as empty; it is replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => Map::new(),
            Ok(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(map)) => map,
                Ok(_) | Err(_) => {
                    warn!(path = %path.display(), "Preference store is not a JSON object, starting empty");
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), keys = entries.len(), "Preference store opened");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &Map<String, Value>) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, entries)?;
        tmp.write_all(b"\n")?;
        tmp.persist(&self.path)
            .map_err(|e| ClientError::store(format!("failed to save {}: {}", self.path.display(), e)))?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get_raw(&self, key: &str) -> Option<Value> {
        self.entries.lock().get(key).cloned()
    }

    fn set_raw(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value);
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

/// A key name bound to its value type and default.
pub struct TypedKey<T> {
    name: &'static str,
    default: fn() -> T,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedKey<T> {
    pub const fn new(name: &'static str, default: fn() -> T) -> Self {
        Self {
            name,
            default,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T: Serialize + DeserializeOwned> TypedKey<T> {
    /// Read the value, falling back to the default when missing or undecodable.
    pub fn load(&self, store: &dyn KeyValueStore) -> T {
        match store.get_raw(self.name) {
            None => (self.default)(),
            Some(raw) => serde_json::from_value(raw).unwrap_or_else(|e| {
                warn!(key = self.name, error = %e, "Stored value is unreadable, using default");
                (self.default)()
            }),
        }
    }

    pub fn save(&self, store: &dyn KeyValueStore, value: &T) -> Result<()> {
        store.set_raw(self.name, serde_json::to_value(value)?)
    }

    pub fn clear(&self, store: &dyn KeyValueStore) -> Result<()> {
        store.remove(self.name)
    }
}

fn none<T>() -> Option<T> {
    None
}

/// Keys persisted between runs.
pub mod keys {
    use super::*;

    pub const SESSION_KEY: TypedKey<Option<String>> = TypedKey::new("sessionKey", none::<String>);
    pub const SELECTED_TRACK: TypedKey<Option<String>> =
        TypedKey::new("selectedTrack", none::<String>);
    pub const SELECTED_ASPECT_RATIO: TypedKey<AspectRatio> =
        TypedKey::new("selectedAspectRatio", AspectRatio::default);
    pub const VALIDATED_IMAGES: TypedKey<Vec<ValidatedImage>> =
        TypedKey::new("validatedImages", Vec::new);
    pub const SESSION_EMAIL: TypedKey<Option<String>> =
        TypedKey::new("sessionEmail", none::<String>);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_key_defaults() {
        let store = MemoryStore::new();
        assert_eq!(keys::SELECTED_ASPECT_RATIO.load(&store), AspectRatio::Landscape);
        assert!(keys::VALIDATED_IMAGES.load(&store).is_empty());
        assert_eq!(keys::SESSION_EMAIL.load(&store), None);
    }

    #[test]
    fn test_typed_key_save_load_clear() {
        let store = MemoryStore::new();
        keys::SELECTED_ASPECT_RATIO
            .save(&store, &AspectRatio::Square)
            .unwrap();
        assert_eq!(store.get_raw("selectedAspectRatio"), Some(json!("1:1")));
        assert_eq!(keys::SELECTED_ASPECT_RATIO.load(&store), AspectRatio::Square);

        keys::SELECTED_ASPECT_RATIO.clear(&store).unwrap();
        assert_eq!(keys::SELECTED_ASPECT_RATIO.load(&store), AspectRatio::Landscape);
    }

    #[test]
    fn test_undecodable_value_falls_back_to_default() {
        let store = MemoryStore::new();
        store.set_raw("selectedAspectRatio", json!("4:3")).unwrap();
        assert_eq!(keys::SELECTED_ASPECT_RATIO.load(&store), AspectRatio::Landscape);
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");

        let store = JsonFileStore::open(&path).unwrap();
        keys::SELECTED_TRACK
            .save(&store, &Some("track-7".to_string()))
            .unwrap();
        keys::SESSION_EMAIL
            .save(&store, &Some("agent@realty.test".to_string()))
            .unwrap();
        keys::SESSION_EMAIL.clear(&store).unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(
            keys::SELECTED_TRACK.load(&reopened),
            Some("track-7".to_string())
        );
        assert_eq!(keys::SESSION_EMAIL.load(&reopened), None);
    }

    #[test]
    fn test_file_store_tolerates_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "[1, 2").unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get_raw("sessionKey"), None);
        store.set_raw("sessionKey", json!("abc")).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["sessionKey"], "abc");
    }
}
