//! Debounced snapshot persistence of the editor document.
//!
//! Mutations only mark the document dirty. A snapshot is written once no
//! further change has happened for the debounce window, so a burst of drag
//! updates produces a single write.

use crate::types::EditorDocument;
use anyhow::{Context, Result};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Durable key/value slot holding the latest document snapshot.
pub trait Storage {
    /// Reads the stored snapshot, if any.
    fn load(&self) -> Result<Option<String>>;
    /// Replaces the stored snapshot.
    fn save(&mut self, snapshot: &str) -> Result<()>;
    /// Removes the stored snapshot.
    fn clear(&mut self) -> Result<()>;
}

/// Stores the snapshot in a JSON file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Creates a storage backed by `path`. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for FileStorage {
    fn load(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", self.path.display())),
        }
    }

    fn save(&mut self, snapshot: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        // Write beside the target and rename so a crash never leaves half a file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, snapshot)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))
    }

    fn clear(&mut self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to remove {}", self.path.display())),
        }
    }
}

#[derive(Debug, Default)]
struct MemorySlot {
    snapshot: Option<String>,
    writes: usize,
}

/// In-memory storage. Clones share the same slot, so a caller can keep a
/// handle to inspect what the store wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slot: Rc<RefCell<MemorySlot>>,
}

impl MemoryStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a storage that already holds `snapshot`.
    pub fn with_snapshot(snapshot: impl Into<String>) -> Self {
        let storage = Self::default();
        storage.slot.borrow_mut().snapshot = Some(snapshot.into());
        storage
    }

    /// The stored snapshot.
    pub fn snapshot(&self) -> Option<String> {
        self.slot.borrow().snapshot.clone()
    }

    /// Number of saves performed so far.
    pub fn write_count(&self) -> usize {
        self.slot.borrow().writes
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.snapshot())
    }

    fn save(&mut self, snapshot: &str) -> Result<()> {
        let mut slot = self.slot.borrow_mut();
        slot.snapshot = Some(snapshot.to_owned());
        slot.writes += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.slot.borrow_mut().snapshot = None;
        Ok(())
    }
}

/// Trailing-edge debouncer in front of a [`Storage`].
pub struct Persistence {
    storage: Box<dyn Storage>,
    debounce: Duration,
    last_change: Option<Instant>,
}

impl Persistence {
    /// Wraps `storage` with the given quiet period.
    pub fn new(storage: Box<dyn Storage>, debounce: Duration) -> Self {
        Self {
            storage,
            debounce,
            last_change: None,
        }
    }

    /// Reads the stored document.
    pub fn load(&self) -> Result<Option<EditorDocument>> {
        match self.storage.load()? {
            Some(text) => {
                let doc = EditorDocument::from_json(&text).context("stored document is invalid")?;
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    /// Records a change at `now`, restarting the quiet period.
    pub fn mark_dirty(&mut self, now: Instant) {
        self.last_change = Some(now);
    }

    /// True if a change has not been written yet.
    pub fn is_pending(&self) -> bool {
        self.last_change.is_some()
    }

    /// Writes the snapshot once the quiet period has elapsed.
    ///
    /// Returns `Ok(true)` if a write happened.
    pub fn poll(&mut self, now: Instant, doc: &EditorDocument) -> Result<bool> {
        match self.last_change {
            Some(changed) if now.saturating_duration_since(changed) >= self.debounce => {
                self.write(doc)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Writes any pending change immediately.
    pub fn flush(&mut self, doc: &EditorDocument) -> Result<bool> {
        if !self.is_pending() {
            return Ok(false);
        }
        self.write(doc)?;
        Ok(true)
    }

    /// Drops any pending change and removes the stored snapshot.
    pub fn clear(&mut self) -> Result<()> {
        self.last_change = None;
        self.storage.clear()
    }

    fn write(&mut self, doc: &EditorDocument) -> Result<()> {
        // A failed write stays pending so the next poll retries it.
        let snapshot = doc.to_json().context("failed to serialize document")?;
        self.storage.save(&snapshot)?;
        self.last_change = None;
        log::debug!("Persisted document ({} bytes)", snapshot.len());
        Ok(())
    }
}
