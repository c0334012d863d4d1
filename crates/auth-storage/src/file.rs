//! File-backed storage backend.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use crate::{StorageAdapter, StorageError, StorageResult};

/// Storage persisted as a single JSON document on disk.
///
/// The default backend for native desktop builds. The whole document is
/// rewritten on every mutation through a temp file and rename, so a
/// crash mid-write leaves the previous document intact. A document that
/// fails to parse at open time is discarded and logged, not surfaced;
/// rehydration treats it as an empty store.
pub struct FileStorage {
    path: PathBuf,
    data: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    /// Opens (or creates) the document at `path`.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(map) => map,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "discarding unreadable storage document");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, data: &HashMap<String, String>) -> StorageResult<()> {
        let content = serde_json::to_string_pretty(data)
            .map_err(|e| StorageError::Encoding(e.to_string()))?;

        let tmp_path = self.path.with_extension("tmp");
        let result = fs::write(&tmp_path, content)
            .and_then(|_| fs::rename(&tmp_path, &self.path));
        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result.map_err(Into::into)
    }
}

impl StorageAdapter for FileStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let data = self.data.lock().expect("lock poisoned");
        Ok(data.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut data = self.data.lock().expect("lock poisoned");
        data.insert(key.to_string(), value.to_string());
        self.persist(&data)
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        let mut data = self.data.lock().expect("lock poisoned");
        let removed = data.remove(key).is_some();
        if removed {
            self.persist(&data)?;
        }
        Ok(removed)
    }
}
