//! # Directory-backed store shared across processes.
//!
//! Each key is one JSON file `{dir}/{key}.json`, the key percent-encoded:
//! ```text
//! {"value": true, "expires_at_ms": null}
//! ```
//! Writes go through a temporary file in the same directory and an atomic rename, so
//! concurrent readers never observe a half-written entry.

use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::StoreError;
use crate::store::Store;

#[derive(Serialize, Deserialize)]
struct Record {
    value: Value,
    expires_at_ms: Option<u64>,
}

/// Store persisting one file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Root directory of the store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// One file per key; bytes outside `[A-Za-z0-9._-]` are percent-encoded.
    fn path_for(&self, key: &str) -> PathBuf {
        let mut safe = String::with_capacity(key.len() + 5);
        for b in key.bytes() {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.') {
                safe.push(b as char);
            } else {
                let _ = write!(safe, "%{b:02X}");
            }
        }
        safe.push_str(".json");
        self.dir.join(safe)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl Store for FileStore {
    fn get(&self, key: &str) -> Option<Value> {
        let path = self.path_for(key);
        let raw = fs::read(&path).ok()?;
        let record: Record = match serde_json::from_slice(&raw) {
            Ok(r) => r,
            Err(e) => {
                debug!(key, error = %e, "ignoring unreadable store entry");
                return None;
            }
        };
        if record.expires_at_ms.is_some_and(|at| at <= now_ms()) {
            let _ = fs::remove_file(&path);
            return None;
        }
        Some(record.value)
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), StoreError> {
        let record = Record {
            value,
            expires_at_ms: ttl.map(|d| now_ms().saturating_add(d.as_millis() as u64)),
        };
        let bytes = serde_json::to_vec(&record).map_err(|source| StoreError::Codec {
            key: key.to_string(),
            source,
        })?;

        let path = self.path_for(key);
        let io_err = |source: io::Error| StoreError::Io {
            path: path.clone(),
            source,
        };
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(&bytes).map_err(io_err)?;
        tmp.persist(&path).map_err(|e| io_err(e.error))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}
