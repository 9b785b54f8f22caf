use std::{
    collections::BTreeMap,
    ffi::OsString,
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use fd_lock::RwLock as FileLock;
use serde_json::Value;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{SessionStorage, StorageError};

const SOURCE: &str = "infra::storage::file";
const LOCK_SUFFIX: &str = ".lock";
const QUARANTINE_SUFFIX: &str = ".corrupt";

type Items = BTreeMap<String, Value>;

/// Session storage persisted to a JSON object on disk.
///
/// The file plays the role of one browsing session and may be shared by
/// several processes, as well as by data that is not ours. Reads always see
/// the file as it is now; writes hold an advisory lock on `<path>.lock`,
/// re-read the file, apply their change and replace the file atomically, so
/// concurrent writers never drop each other's keys.
///
/// Values that are not strings (a browser would never store them, but other
/// tools might) are kept verbatim and read back as their JSON text. A file
/// that is not a JSON object at all is moved to `<path>.corrupt` and the
/// session starts over empty.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock_path: PathBuf,
    max_bytes: Option<usize>,
}

impl FileStorage {
    /// Open the session file at `path`. A missing file is an empty session.
    pub fn open(path: impl Into<PathBuf>, max_bytes: Option<usize>) -> Result<Self, StorageError> {
        let path = path.into();
        let storage = Self {
            lock_path: sibling(&path, LOCK_SUFFIX),
            path,
            max_bytes,
        };

        if storage.read_items().is_err() {
            storage.with_write_lock(|path| load_or_quarantine(path).map(drop))?;
        }
        Ok(storage)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unlocked snapshot of the session. The file is only ever replaced by an
    /// atomic rename, so readers see either the old or the new contents.
    fn read_items(&self) -> Result<Items, ReadFailure> {
        read_session(&self.path)
    }

    fn snapshot(&self, op: &'static str) -> Items {
        match self.read_items() {
            Ok(items) => items,
            Err(failure) => {
                warn!(
                    target = SOURCE,
                    op,
                    result = "unreadable",
                    path = %self.path.display(),
                    error = %failure,
                    "Session file unreadable; treating it as empty"
                );
                Items::new()
            }
        }
    }

    fn with_write_lock<T>(
        &self,
        f: impl FnOnce(&Path) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        fs::create_dir_all(parent_dir(&self.path))?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)?;
        let mut lock = FileLock::new(file);
        let _guard = lock.write()?;
        f(&self.path)
    }

    /// Re-read the session under the write lock, let `change` edit it, and
    /// persist the result when `change` reports a modification.
    fn update(
        &self,
        change: impl FnOnce(&mut Items) -> Result<bool, StorageError>,
    ) -> Result<(), StorageError> {
        self.with_write_lock(|path| {
            let mut items = load_or_quarantine(path)?;
            if change(&mut items)? {
                persist(path, &items)?;
            }
            Ok(())
        })
    }
}

impl SessionStorage for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.snapshot("get_item").remove(key).map(value_text)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let limit = self.max_bytes;
        self.update(|items| {
            if let Some(limit) = limit {
                let used: usize = items
                    .iter()
                    .filter(|(existing, _)| existing.as_str() != key)
                    .map(|(k, v)| stored_len(k, v))
                    .sum();
                let needed = used + key.len() + value.len();
                if needed > limit {
                    return Err(StorageError::QuotaExceeded {
                        key: key.to_string(),
                        needed,
                        limit,
                    });
                }
            }
            items.insert(key.to_string(), Value::String(value.to_string()));
            Ok(true)
        })
    }

    fn remove_item(&self, key: &str) {
        if let Err(err) = self.update(|items| Ok(items.remove(key).is_some())) {
            warn!(
                target = SOURCE,
                op = "file_storage::remove_item",
                result = "persist_error",
                path = %self.path.display(),
                key,
                error = %err,
                "Failed to remove key from session file"
            );
        }
    }

    fn keys(&self) -> Vec<String> {
        self.snapshot("keys").into_keys().collect()
    }
}

#[derive(Debug, Error)]
enum ReadFailure {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("not a JSON object: {0}")]
    Malformed(#[from] serde_json::Error),
}

fn read_session(path: &Path) -> Result<Items, ReadFailure> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(serde_json::from_str(&raw)?),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(Items::new()),
        Err(err) => Err(err.into()),
    }
}

/// Load the session while holding the write lock. A malformed file is moved
/// aside rather than overwritten.
fn load_or_quarantine(path: &Path) -> Result<Items, StorageError> {
    match read_session(path) {
        Ok(items) => Ok(items),
        Err(ReadFailure::Io(err)) => Err(StorageError::Io(err)),
        Err(ReadFailure::Malformed(err)) => {
            let quarantine = sibling(path, QUARANTINE_SUFFIX);
            fs::rename(path, &quarantine)?;
            warn!(
                target = SOURCE,
                op = "file_storage::load",
                result = "quarantined",
                path = %path.display(),
                moved_to = %quarantine.display(),
                error = %err,
                "Session file is not a JSON object; moved it aside and started empty"
            );
            Ok(Items::new())
        }
    }
}

fn persist(path: &Path, items: &Items) -> Result<(), StorageError> {
    let mut file = NamedTempFile::new_in(parent_dir(path))?;
    serde_json::to_writer(&mut file, items)?;
    file.flush()?;
    file.persist(path).map_err(|err| StorageError::Io(err.error))?;
    debug!(
        target = SOURCE,
        op = "file_storage::persist",
        result = "written",
        path = %path.display(),
        keys = items.len(),
        "Session file rewritten"
    );
    Ok(())
}

fn value_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

fn stored_len(key: &str, value: &Value) -> usize {
    key.len()
        + match value {
            Value::String(text) => text.len(),
            other => other.to_string().len(),
        }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}
