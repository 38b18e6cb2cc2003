//! Durable typed state behind short string keys.
//!
//! Reads are cache-first; the first touch of a key loads from disk.
//! Writes land in the cache and are then flushed to disk via an atomic
//! replace (temp sibling + durable rename), so a crash mid-write never
//! leaves a partial file. Orphaned temp files from prior crashes are
//! cleaned up at startup.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors from K/V operations.
#[derive(Debug, Error)]
pub enum KvError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write `bytes` to `path` atomically: temp sibling, fsync, rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)
}

/// Move a corrupt file aside so the caller can start fresh.
pub(crate) fn rotate_corrupt(path: &Path) {
    let bak = path.with_extension("bak");
    warn!(
        path = %path.display(),
        bak = %bak.display(),
        "corrupt state file, moving to .bak and starting fresh",
    );
    let _ = fs::rename(path, &bak);
}

/// File-backed key/value store with a write-through cache.
pub struct KvStore {
    dir: PathBuf,
    cache: Mutex<HashMap<String, Value>>,
}

impl KvStore {
    /// Open a store rooted at `dir`, sweeping orphaned temp files left
    /// by a prior crash.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, KvError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("tmp") {
                warn!(path = %path.display(), "removing orphaned temp file");
                let _ = fs::remove_file(&path);
            }
        }
        Ok(Self {
            dir,
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Raw value for `key`, or `None` if never written.
    pub fn get(&self, key: &str) -> Result<Option<Value>, KvError> {
        if let Some(value) = self.cache.lock().get(key) {
            return Ok(Some(value.clone()));
        }
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => {
                self.cache.lock().insert(key.to_string(), value.clone());
                Ok(Some(value))
            }
            Err(_) => {
                rotate_corrupt(&path);
                Ok(None)
            }
        }
    }

    /// Typed view of `get`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, KvError> {
        match self.get(key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Shallow-merge `partial` into the stored object and stamp
    /// `updated_at`.
    ///
    /// Non-object values replace wholesale. The cache is updated before
    /// the disk write, so a disk failure surfaces as an error while the
    /// in-memory state stays current.
    pub fn set(&self, key: &str, partial: Value, now_ms: u64) -> Result<(), KvError> {
        let mut merged = self.get(key)?.unwrap_or(Value::Object(Default::default()));
        match (&mut merged, partial) {
            (Value::Object(base), Value::Object(fields)) => {
                for (k, v) in fields {
                    base.insert(k, v);
                }
                base.insert("updated_at".to_string(), Value::from(now_ms));
            }
            (slot, other) => *slot = other,
        }
        self.cache.lock().insert(key.to_string(), merged.clone());
        self.flush(key, &merged)
    }

    /// Replace the full value for `key` with a serialisable record.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), KvError> {
        let value = serde_json::to_value(value)?;
        self.cache.lock().insert(key.to_string(), value.clone());
        self.flush(key, &value)
    }

    /// Set one field of the stored object.
    pub fn update_field(
        &self,
        key: &str,
        field: &str,
        value: Value,
        now_ms: u64,
    ) -> Result<(), KvError> {
        let mut partial = serde_json::Map::new();
        partial.insert(field.to_string(), value);
        self.set(key, Value::Object(partial), now_ms)
    }

    /// Add `by` to a numeric field, treating missing or non-numeric as 0.
    pub fn increment(&self, key: &str, field: &str, by: f64, now_ms: u64) -> Result<f64, KvError> {
        let current = self
            .get(key)?
            .as_ref()
            .and_then(|v| v.get(field))
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let next = current + by;
        self.update_field(key, field, Value::from(next), now_ms)?;
        Ok(next)
    }

    fn flush(&self, key: &str, value: &Value) -> Result<(), KvError> {
        let bytes = serde_json::to_vec_pretty(value)?;
        write_atomic(&self.key_path(key), &bytes)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "kv_tests.rs"]
mod tests;
