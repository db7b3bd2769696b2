//! Recently submitted free-text values, per field.
//!
//! A [`HistoryStore`] keeps, for every identifier, the most recently submitted
//! values of a field (for example the filter expressions of a query page),
//! most recent first. Adding a value that is already present moves it to the
//! front; empty values are ignored; the list is capped at the store capacity
//! and the oldest values are evicted first.
//!
//! Entries are persisted through a [`HistoryBackend`] as a JSON array of
//! strings. [`MemoryBackend`] keeps them for the life of the process,
//! [`FileBackend`] writes one `<identifier>.json` file per entry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::error::HistoryError;

/// Number of values kept per identifier unless configured otherwise.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Storage identifier of a plugin field, e.g. `kobs-mongodb-filterhistory`.
pub fn history_identifier(plugin: &str, field: &str) -> String {
    format!("{plugin}-{field}history")
}

/// Persistence for history entries.
///
/// Backends store opaque JSON text per identifier; decoding and the list
/// policy live in [`HistoryStore`].
pub trait HistoryBackend: Send + Sync + 'static {
    /// Read the raw entry of `identifier`, `None` if nothing was stored.
    fn load(&self, identifier: &str) -> Result<Option<String>, HistoryError>;

    /// Replace the raw entry of `identifier`.
    fn store(&self, identifier: &str, raw: &str) -> Result<(), HistoryError>;

    /// Remove the entry of `identifier`. Removing a missing entry succeeds.
    fn remove(&self, identifier: &str) -> Result<(), HistoryError>;
}

/// Backend keeping entries in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryBackend for MemoryBackend {
    fn load(&self, identifier: &str) -> Result<Option<String>, HistoryError> {
        Ok(self.entries.lock().get(identifier).cloned())
    }

    fn store(&self, identifier: &str, raw: &str) -> Result<(), HistoryError> {
        self.entries
            .lock()
            .insert(identifier.to_string(), raw.to_string());
        Ok(())
    }

    fn remove(&self, identifier: &str) -> Result<(), HistoryError> {
        self.entries.lock().remove(identifier);
        Ok(())
    }
}

/// Backend writing one JSON file per identifier into a directory.
///
/// The directory is created on the first write. Identifiers are restricted to
/// ASCII alphanumerics, `-`, `_` and `.` so they map onto plain file names.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, identifier: &str) -> Result<PathBuf, HistoryError> {
        let valid = !identifier.is_empty()
            && !identifier.starts_with('.')
            && identifier
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(HistoryError::InvalidIdentifier(identifier.to_string()));
        }
        Ok(self.dir.join(format!("{identifier}.json")))
    }
}

impl HistoryBackend for FileBackend {
    fn load(&self, identifier: &str) -> Result<Option<String>, HistoryError> {
        let path = self.path(identifier)?;
        match std::fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(HistoryError::Io { path, source }),
        }
    }

    fn store(&self, identifier: &str, raw: &str) -> Result<(), HistoryError> {
        let path = self.path(identifier)?;
        std::fs::create_dir_all(&self.dir).map_err(|source| HistoryError::Io {
            path: self.dir.clone(),
            source,
        })?;
        std::fs::write(&path, raw).map_err(|source| HistoryError::Io { path, source })
    }

    fn remove(&self, identifier: &str) -> Result<(), HistoryError> {
        let path = self.path(identifier)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(HistoryError::Io { path, source }),
        }
    }
}

/// Most-recent-first lists of submitted values.
///
/// Read-modify-write cycles are serialized per store, so concurrent `add`
/// calls never lose values.
pub struct HistoryStore {
    backend: Arc<dyn HistoryBackend>,
    capacity: usize,
    write: Mutex<()>,
}

static GLOBAL: OnceCell<HistoryStore> = OnceCell::new();

impl Default for HistoryStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl HistoryStore {
    /// Create a store over `backend` keeping at most `capacity` values per identifier.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(backend: impl HistoryBackend, capacity: usize) -> Self {
        Self::with_shared_backend(Arc::new(backend), capacity)
    }

    /// Create a store over a backend shared with other stores.
    pub fn with_shared_backend(backend: Arc<dyn HistoryBackend>, capacity: usize) -> Self {
        Self {
            backend,
            capacity: capacity.max(1),
            write: Mutex::new(()),
        }
    }

    /// In-memory store with the default capacity.
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new(), DEFAULT_HISTORY_CAPACITY)
    }

    /// The process-wide store.
    ///
    /// Unless [`install_global`](Self::install_global) ran first, this is an
    /// in-memory store with the default capacity.
    pub fn global() -> &'static HistoryStore {
        GLOBAL.get_or_init(HistoryStore::in_memory)
    }

    /// Install the process-wide store.
    ///
    /// Fails, handing `store` back, if the global store was already installed
    /// or used.
    pub fn install_global(store: HistoryStore) -> Result<(), HistoryStore> {
        GLOBAL.set(store)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record `value` as the most recent entry of `identifier`.
    ///
    /// An existing equal value is moved to the front instead of duplicated.
    /// Empty values are ignored. Returns the updated list.
    pub fn add(&self, identifier: &str, value: &str) -> Result<Vec<String>, HistoryError> {
        let _guard = self.write.lock();
        let mut values = self.read(identifier)?;
        if value.is_empty() {
            return Ok(values);
        }

        values.retain(|existing| existing != value);
        values.insert(0, value.to_string());
        values.truncate(self.capacity);

        let raw = serde_json::to_string(&values).map_err(|source| HistoryError::Malformed {
            identifier: identifier.to_string(),
            source,
        })?;
        self.backend.store(identifier, &raw)?;
        tracing::trace!(identifier, len = values.len(), "history updated");
        Ok(values)
    }

    /// The values of `identifier`, most recent first.
    ///
    /// Each call returns a fresh copy. An entry that cannot be decoded is
    /// logged and treated as empty; the next `add` overwrites it.
    pub fn list(&self, identifier: &str) -> Result<Vec<String>, HistoryError> {
        self.read(identifier)
    }

    /// Forget all values of `identifier`.
    pub fn clear(&self, identifier: &str) -> Result<(), HistoryError> {
        let _guard = self.write.lock();
        self.backend.remove(identifier)
    }

    fn read(&self, identifier: &str) -> Result<Vec<String>, HistoryError> {
        let Some(raw) = self.backend.load(identifier)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(mut values) => {
                values.truncate(self.capacity);
                Ok(values)
            }
            Err(source) => {
                let err = HistoryError::Malformed {
                    identifier: identifier.to_string(),
                    source,
                };
                tracing::warn!(error = %err, "ignoring unreadable history");
                Ok(Vec::new())
            }
        }
    }
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
