//! Durable key-value storage for session entries.
//!
//! The session holder only talks to the `KeyValueStore` trait. Backends:
//! `FileStore` (a JSON file shared by every process of the same user),
//! `KeyringStore` (OS keychain, see `credentials`) and `MemoryStore`.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Session file name in the data directory
pub const SESSION_FILE: &str = "session.json";

/// One mutation of the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Set { key: String, value: String },
    Remove { key: String },
}

impl StoreChange {
    pub fn set(key: &str, value: &str) -> Self {
        StoreChange::Set {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    pub fn remove(key: &str) -> Self {
        StoreChange::Remove {
            key: key.to_string(),
        }
    }
}

/// Trait for durable string key-value backends
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    fn remove(&mut self, key: &str) -> Result<()>;

    /// Read several keys. Backends that can read them in one go should, so
    /// a concurrent writer is never observed halfway.
    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>> {
        keys.iter().map(|k| self.get(k)).collect()
    }

    /// Apply a batch of changes, in order.
    fn apply(&mut self, changes: &[StoreChange]) -> Result<()> {
        for change in changes {
            match change {
                StoreChange::Set { key, value } => self.set(key, value)?,
                StoreChange::Remove { key } => self.remove(key)?,
            }
        }
        Ok(())
    }
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

// ============================================================================
// File store
// ============================================================================

/// JSON object of string entries on disk.
///
/// Every read goes to disk so writes from other processes are seen. Writes
/// go through a uniquely named temp file and a rename. An unreadable file is replaced on
/// the next write.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store at `<dir>/session.json`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SESSION_FILE))
    }

    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read store file: {}", self.path.display()))?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse store file: {}", self.path.display()))
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        // Each writer gets its own temp file; concurrent writers never share one
        let contents = serde_json::to_string_pretty(entries)?;
        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        tmp.write_all(contents.as_bytes())
            .with_context(|| format!("Failed to write temp file: {}", tmp.path().display()))?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to replace store file: {}", self.path.display()))?;
        debug!(path = %self.path.display(), entries = entries.len(), "Store file written");
        Ok(())
    }

    /// Hash of the current file contents, `None` when the file is absent
    pub fn fingerprint(&self) -> Result<Option<u64>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => {
                let mut hasher = DefaultHasher::new();
                bytes.hash(&mut hasher);
                Ok(Some(hasher.finish()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read store file: {}", self.path.display())),
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_entries()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.apply(&[StoreChange::set(key, value)])
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.apply(&[StoreChange::remove(key)])
    }

    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>> {
        let entries = self.read_entries()?;
        Ok(keys.iter().map(|k| entries.get(*k).cloned()).collect())
    }

    fn apply(&mut self, changes: &[StoreChange]) -> Result<()> {
        let mut entries = match self.read_entries() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Replacing unreadable store file");
                BTreeMap::new()
            }
        };
        for change in changes {
            match change {
                StoreChange::Set { key, value } => {
                    entries.insert(key.clone(), value.clone());
                }
                StoreChange::Remove { key } => {
                    entries.remove(key);
                }
            }
        }
        self.write_entries(&entries)
    }
}

// ============================================================================
// Change detection
// ============================================================================

/// Detects writes to a `FileStore` made by other processes.
///
/// Our own writes are detected too; reloading after them is harmless.
#[derive(Debug)]
pub struct StoreWatcher {
    store: FileStore,
    last_seen: Option<u64>,
}

impl StoreWatcher {
    pub fn new(store: &FileStore) -> Self {
        let last_seen = store.fingerprint().ok().flatten();
        Self {
            store: store.clone(),
            last_seen,
        }
    }

    /// Returns true when the file changed since the previous poll
    pub fn poll(&mut self) -> bool {
        let current = match self.store.fingerprint() {
            Ok(fp) => fp,
            Err(e) => {
                debug!(error = %e, "Store fingerprint unavailable");
                return false;
            }
        };
        if current != self.last_seen {
            self.last_seen = current;
            true
        } else {
            false
        }
    }
}
