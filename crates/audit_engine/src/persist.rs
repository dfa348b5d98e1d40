use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use audit_logging::{audit_debug, audit_warn};
use serde_json::Value;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("state directory missing or not writable: {0}")]
    StateDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("could not encode state: {0}")]
    Encode(String),
    #[error("could not decode state: {0}")]
    Decode(String),
    #[error("store unavailable")]
    Unavailable,
}

/// Minimal key-value contract behind session records.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, PersistError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), PersistError>;
}

/// In-process store; can be switched offline to exercise fallbacks.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), PersistError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PersistError::Unavailable);
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, PersistError> {
        self.ensure_online()?;
        Ok(self.entries.lock().expect("lock memory store").get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), PersistError> {
        self.ensure_online()?;
        self.entries
            .lock()
            .expect("lock memory store")
            .insert(key.to_string(), value);
        Ok(())
    }
}

/// Ensure the state directory exists and is writable; create it if missing.
pub fn ensure_state_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::StateDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::StateDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::StateDir(e.to_string()))?;
    }
    NamedTempFile::new_in(dir).map_err(|e| PersistError::StateDir(e.to_string()))?;
    Ok(())
}

/// Writes `{dir}/{filename}` through a temp file and a rename.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        ensure_state_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// Store persisted as one RON map of key to JSON text.
///
/// Every write rewrites the whole file; the mutex serializes
/// read-modify-write cycles within the process.
pub struct FileStore {
    path: PathBuf,
    writer: AtomicFileWriter,
    filename: String,
    guard: Mutex<()>,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>, filename: &str) -> Self {
        let dir = dir.into();
        Self {
            path: dir.join(filename),
            writer: AtomicFileWriter::new(dir),
            filename: filename.to_string(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, PersistError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(err.into()),
        };
        let text = String::from_utf8(bytes).map_err(|e| PersistError::Decode(e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        ron::from_str(&text).map_err(|e| PersistError::Decode(e.to_string()))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, PersistError> {
        let _guard = self.guard.lock().expect("lock file store");
        let Some(text) = self.load()?.remove(key) else {
            return Ok(None);
        };
        match serde_json::from_str(&text) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                audit_warn!("Discarding unreadable entry key={} error={}", key, err);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), PersistError> {
        let _guard = self.guard.lock().expect("lock file store");
        // Only a corrupt file is replaced; read failures leave it untouched.
        let mut entries = match self.load() {
            Ok(entries) => entries,
            Err(err @ PersistError::Decode(_)) => {
                audit_warn!("Resetting corrupt store path={} error={}", self.path.display(), err);
                BTreeMap::new()
            }
            Err(err) => {
                audit_warn!("Store unreadable path={} error={}", self.path.display(), err);
                return Err(err);
            }
        };
        entries.insert(key.to_string(), value.to_string());
        let text = ron::ser::to_string_pretty(&entries, ron::ser::PrettyConfig::default())
            .map_err(|e| PersistError::Encode(e.to_string()))?;
        self.writer.write(&self.filename, &text)?;
        audit_debug!("Stored key={} path={}", key, self.path.display());
        Ok(())
    }
}
