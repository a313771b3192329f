// Durable key-value storage
// The preference layer, the preset repository and any grid adapter all receive
// an explicit StoreHandle instead of reaching for a global.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Error type for storage operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Reading or writing the backing file failed
    Io(String),
    /// Serializing the backing file failed
    Parse(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "storage I/O error: {msg}"),
            Self::Parse(msg) => write!(f, "storage parse error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// String-keyed, string-valued durable store.
///
/// Writes are write-through: once `set` or `remove` returns `Ok`, the change
/// is visible to every other holder of the same handle.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&mut self, key: &str) -> Result<(), StoreError>;

    /// Block until every prior write is durable.
    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    /// All keys currently present, sorted
    fn keys(&self) -> Vec<String>;
}

/// In-memory store. Nothing survives the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with existing entries
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Store backed by a single JSON object file.
/// Every mutation rewrites the whole file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Default location: ~/.config/gridview/storage.json
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gridview")
            .join("storage.json")
    }

    /// Open the store at `path`. A missing file is an empty store; a malformed
    /// one is logged and treated as empty (it is replaced on the next write).
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = if path.exists() {
            let contents = fs::read_to_string(&path)
                .map_err(|e| StoreError::Io(format!("{}: {}", path.display(), e)))?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                match serde_json::from_str(&contents) {
                    Ok(entries) => entries,
                    Err(e) => {
                        log::warn!(
                            "Ignoring malformed storage file {}: {}",
                            path.display(),
                            e
                        );
                        BTreeMap::new()
                    }
                }
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), StoreError> {
        self.write_entries(&self.entries)
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
            }
        }
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| StoreError::Parse(e.to_string()))?;
        fs::write(&self.path, json)
            .map_err(|e| StoreError::Io(format!("{}: {}", self.path.display(), e)))
    }

    /// Write `next` to disk and adopt it only if the write succeeded
    fn commit(&mut self, next: BTreeMap<String, String>) -> Result<(), StoreError> {
        self.write_entries(&next)?;
        self.entries = next;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut next = self.entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.commit(next)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if !self.entries.contains_key(key) {
            return Ok(());
        }
        let mut next = self.entries.clone();
        next.remove(key);
        self.commit(next)
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.persist()
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Shared handle to a store.
///
/// Cloning the handle shares the underlying store. Single-threaded by
/// construction, like the UI event loop it serves.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Rc<RefCell<Box<dyn KeyValueStore>>>,
}

impl StoreHandle {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Box::new(store))),
        }
    }

    /// Fresh in-memory store
    pub fn memory() -> Self {
        Self::new(MemoryStore::new())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.borrow().get(key)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.borrow_mut().set(key, value)
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.borrow_mut().remove(key)
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.inner.borrow_mut().flush()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.borrow().keys()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("keys", &self.keys())
            .finish()
    }
}
