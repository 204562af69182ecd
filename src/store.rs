//! Durable key/value storage for transcript and style state.
//!
//! Storage is addressed by two logical slots. Reads and writes are always
//! whole-value; callers own any read-modify-write sequencing. An absent or
//! corrupt stored value is indistinguishable from an empty one, so a damaged
//! file can never take the client down.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::Value;

use crate::errors::StoreError;

/// Logical storage slots, independently addressable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Ordered array of `{ text, sender }` objects.
    Transcript,
    /// Object mapping selector to an object mapping property to value.
    Styles,
}

impl Slot {
    /// Stable storage key for this slot.
    pub fn key(self) -> &'static str {
        match self {
            Slot::Transcript => "transcript",
            Slot::Styles => "styles",
        }
    }
}

/// Whole-value durable storage keyed by [`Slot`].
pub trait PersistenceStore: Send + Sync {
    /// Load the value stored in `slot`.
    ///
    /// Returns `None` when the slot is absent or its content is corrupt.
    fn load(&self, slot: Slot) -> Option<Value>;

    /// Replace the value stored in `slot`.
    fn save(&self, slot: Slot, value: &Value) -> Result<(), StoreError>;

    /// Delete the value stored in `slot`. Removing an absent slot is a no-op.
    fn remove(&self, slot: Slot) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Ephemeral store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<Slot, Value>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceStore for MemoryStore {
    fn load(&self, slot: Slot) -> Option<Value> {
        self.entries.lock().get(&slot).cloned()
    }

    fn save(&self, slot: Slot, value: &Value) -> Result<(), StoreError> {
        self.entries.lock().insert(slot, value.clone());
        Ok(())
    }

    fn remove(&self, slot: Slot) -> Result<(), StoreError> {
        self.entries.lock().remove(&slot);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// Store writing one pretty-printed JSON file per slot under a directory.
///
/// The directory is created on first write.
#[derive(Debug, Clone)]
pub struct FileStore {
    directory: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `directory`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn path(&self, slot: Slot) -> PathBuf {
        self.directory.join(format!("{}.json", slot.key()))
    }
}

impl PersistenceStore for FileStore {
    fn load(&self, slot: Slot) -> Option<Value> {
        let path = self.path(slot);
        if !path.exists() {
            return None;
        }
        let content = fs::read_to_string(&path).ok()?;
        serde_json::from_str(&content).ok()
    }

    fn save(&self, slot: Slot, value: &Value) -> Result<(), StoreError> {
        let dir = Path::new(&self.directory);
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(value)?;
        fs::write(self.path(slot), content)?;
        Ok(())
    }

    fn remove(&self, slot: Slot) -> Result<(), StoreError> {
        match fs::remove_file(self.path(slot)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
