//! Persistence of editor contents across sessions.
//!
//! Writes go through a trailing [`Debouncer`] so a burst of keystrokes
//! results in a single store write holding the latest text.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::schedule::Debouncer;

/// Layout version of persisted data.
pub const VERSION: &str = "1";

/// Quiescence window for store writes.
pub const WRITE_DELAY_MS: u64 = 100;

/// Keys under which editor contents are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKey {
    Markdown,
    Css,
}

impl StorageKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Css => "css",
        }
    }
}

pub trait KeyValueStore {
    /// # Errors
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    /// Returns an error if the backing storage cannot be written.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Store that lives for the process only.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set` calls so far.
    pub const fn writes(&self) -> usize {
        self.writes
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value.to_string());
        self.writes += 1;
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    version: String,
    #[serde(default)]
    values: BTreeMap<String, String>,
}

/// Store backed by a JSON file, rewritten on every `set`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open the store at `path`; a missing file is an empty store.
    ///
    /// Values saved under a different layout version are ignored.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                path,
                values: BTreeMap::new(),
            });
        }
        let content = fs::read_to_string(&path).map_err(|source| StorageError::Read {
            path: path.clone(),
            source,
        })?;
        let file: StoreFile =
            serde_json::from_str(&content).map_err(|source| StorageError::Corrupt {
                path: path.clone(),
                source,
            })?;
        let values = if file.version == VERSION {
            file.values
        } else {
            tracing::warn!(
                path = %path.display(),
                found = %file.version,
                expected = VERSION,
                "ignoring store saved by another version"
            );
            BTreeMap::new()
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), StorageError> {
        let file = StoreFile {
            version: VERSION.to_string(),
            values: self.values.clone(),
        };
        let write_err = |source| StorageError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(&file).map_err(|source| {
            StorageError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;
        fs::write(&self.path, json).map_err(write_err)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value.to_string());
        self.persist()
    }
}

/// One persisted value with a debounced writer.
#[derive(Debug, Clone)]
pub struct StoredValue {
    key: StorageKey,
    pending: Option<String>,
    debouncer: Debouncer,
}

impl StoredValue {
    pub const fn new(key: StorageKey) -> Self {
        Self {
            key,
            pending: None,
            debouncer: Debouncer::trailing(WRITE_DELAY_MS),
        }
    }

    pub const fn key(&self) -> StorageKey {
        self.key
    }

    /// # Errors
    /// Propagates store read failures.
    pub fn get_value(&self, store: &dyn KeyValueStore) -> Result<Option<String>, StorageError> {
        store.get(self.key.as_str())
    }

    /// Queue `value` for writing; only the latest value of a burst is written.
    pub fn set_value(&mut self, value: &str, now_ms: u64) {
        self.pending = Some(value.to_string());
        self.debouncer.schedule(now_ms);
    }

    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Write the queued value once its window has elapsed.
    ///
    /// Returns whether a write happened.
    ///
    /// # Errors
    /// Propagates store write failures; the value is dropped either way.
    pub fn tick(&mut self, store: &mut dyn KeyValueStore, now_ms: u64) -> Result<bool, StorageError> {
        if !self.debouncer.take_ready(now_ms) {
            return Ok(false);
        }
        self.write_pending(store)
    }

    /// Write the queued value now.
    ///
    /// # Errors
    /// Propagates store write failures.
    pub fn flush(&mut self, store: &mut dyn KeyValueStore) -> Result<bool, StorageError> {
        self.debouncer.flush_now();
        self.write_pending(store)
    }

    fn write_pending(&mut self, store: &mut dyn KeyValueStore) -> Result<bool, StorageError> {
        let Some(value) = self.pending.take() else {
            return Ok(false);
        };
        store.set(self.key.as_str(), &value)?;
        tracing::debug!(key = self.key.as_str(), bytes = value.len(), "persisted value");
        Ok(true)
    }
}

/// The markdown and CSS values the session persists.
#[derive(Debug, Clone)]
pub struct Storage {
    pub markdown: StoredValue,
    pub css: StoredValue,
}

impl Storage {
    pub const fn new() -> Self {
        Self {
            markdown: StoredValue::new(StorageKey::Markdown),
            css: StoredValue::new(StorageKey::Css),
        }
    }

    /// Write any value whose window has elapsed.
    ///
    /// # Errors
    /// Returns the first write failure; the other value is still attempted.
    pub fn tick(&mut self, store: &mut dyn KeyValueStore, now_ms: u64) -> Result<(), StorageError> {
        let markdown = self.markdown.tick(store, now_ms);
        let css = self.css.tick(store, now_ms);
        markdown.and(css).map(|_| ())
    }

    /// # Errors
    /// Returns the first write failure; the other value is still attempted.
    pub fn flush(&mut self, store: &mut dyn KeyValueStore) -> Result<(), StorageError> {
        let markdown = self.markdown.flush(store);
        let css = self.css.flush(store);
        markdown.and(css).map(|_| ())
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self::new()
    }
}
