//! File-Backed Cache
//!
//! [`FileCache`] persists every item to its own file and keeps a
//! [`MemoryCache`] in front of the disk:
//!
//! ```text
//!   get ──> memory hit? ──yes──> value
//!               │ no
//!               ▼
//!          read file ──> decode ──> expired? ──yes──> delete file, None
//!                                      │ no
//!                                      ▼
//!                           refill memory, value
//!
//!   set ──> memory (canonical item) ──> encode ──> write file
//! ```
//!
//! ## File Layout
//!
//! The file for a key is named after the MD5 digest of the security key
//! followed by the key. The first six hex digits pick a subdirectory, which
//! keeps directories small:
//!
//! ```text
//! <dir>/3f2a9c/<prefix>e1b0...77.data
//! ```
//!
//! ## Locking
//!
//! The file cache reuses the memory cache's lock. Writers hold it while
//! encoding and writing, so the map never shows an item the disk doesn't
//! have. File I/O errors are returned from writes and also recorded as the
//! driver's last error; read failures are recorded and reported as misses.

use crate::driver::{Cache, DriverContext, DriverOptions};
use crate::error::{CacheError, Result};
use crate::storage::item::{now_millis, Item};
use crate::storage::memory::{Lookup, MemoryCache, MemoryState};
use crate::Value;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::debug;

const DRIVER_NAME: &str = "file";

/// Number of leading hex digits used as the subdirectory name.
const DIR_SPLIT: usize = 6;

/// Extension of cache files.
const FILE_EXT: &str = "data";

/// A cache that survives process restarts.
///
/// # Example
///
/// ```no_run
/// use unicache::{Cache, FileCache};
/// use serde_json::json;
/// use std::time::Duration;
///
/// let cache = FileCache::new("./cache").with_security_key("s3cret");
/// cache.set("name", json!("cache value"), Duration::from_secs(60)).unwrap();
///
/// // A second instance sees the same data
/// let other = FileCache::new("./cache").with_security_key("s3cret");
/// assert_eq!(other.get("name"), Some(json!("cache value")));
/// ```
#[derive(Debug)]
pub struct FileCache {
    memory: MemoryCache,
    dir: PathBuf,
    security_key: String,
    use_memory: bool,
    ctx: DriverContext,
}

impl FileCache {
    /// Creates a file cache rooted at `dir`.
    ///
    /// An empty path falls back to the system temporary directory.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let dir = if dir.as_os_str().is_empty() {
            std::env::temp_dir()
        } else {
            dir.to_path_buf()
        };

        Self {
            memory: MemoryCache::new(),
            dir,
            security_key: String::new(),
            use_memory: true,
            ctx: DriverContext::new(DRIVER_NAME, DriverOptions::default()),
        }
    }

    /// Replaces the driver options (file name prefix, debug logging, codec).
    pub fn with_options(mut self, options: DriverOptions) -> Self {
        self.ctx = DriverContext::new(DRIVER_NAME, options);
        self
    }

    /// Sets the prefix of cache file names.
    pub fn with_prefix(self, prefix: impl Into<String>) -> Self {
        let options = self.ctx.options().clone().with_prefix(prefix);
        self.with_options(options)
    }

    /// Salts file names so they can't be derived from the key alone.
    pub fn with_security_key(mut self, key: impl Into<String>) -> Self {
        self.security_key = key.into();
        self
    }

    /// Bounds the in-memory staging layer to `max_entries` keys.
    pub fn with_memory_capacity(mut self, max_entries: usize) -> Self {
        self.memory = MemoryCache::with_capacity(max_entries);
        self
    }

    /// Reads and writes go straight to disk, without the memory layer.
    pub fn without_memory_cache(mut self) -> Self {
        self.use_memory = false;
        self
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of items held in the memory layer.
    pub fn count(&self) -> usize {
        self.memory.count()
    }

    /// The most recent error recorded by this driver.
    pub fn last_err(&self) -> Option<CacheError> {
        self.ctx.last_err()
    }

    /// Path of the file backing `key`.
    pub fn filename(&self, key: &str) -> PathBuf {
        let digest = md5::compute(format!("{}{}", self.security_key, key));
        let hex = format!("{:x}", digest);
        let (sub_dir, rest) = hex.split_at(DIR_SPLIT);

        self.dir
            .join(sub_dir)
            .join(format!("{}{}.{}", self.ctx.options().prefix, rest, FILE_EXT))
    }

    /// Looks `key` up in memory, then on disk. Caller holds the write lock.
    fn load(&self, state: &mut MemoryState, key: &str) -> Option<Value> {
        let now = now_millis();

        // An expired memory entry is dropped here; the file may hold a newer value
        if self.use_memory {
            if let Lookup::Hit(value) = state.lookup(key, now) {
                return Some(value);
            }
        }

        let item = self.read_live(key, now)?;
        let value = item.value.clone();
        if self.use_memory {
            state.insert(key.to_string(), item, now);
        }
        Some(value)
    }

    /// Reads the file for `key`, deleting it if the item expired.
    /// Caller holds the lock, shared or exclusive.
    fn read_live(&self, key: &str, now: u64) -> Option<Item> {
        let path = self.filename(key);
        let item = self.read_item(&path)?;

        if item.is_expired_at(now) {
            debug!(key, path = %path.display(), "Cache file expired");
            self.remove_file_logged(&path);
            return None;
        }
        Some(item)
    }

    /// Reads and decodes the item at `path`. A missing file is a plain miss.
    fn read_item(&self, path: &Path) -> Option<Item> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                self.ctx.record_err(&CacheError::io("read", path, e));
                return None;
            }
        };

        let decoded = self.ctx.codec().and_then(|codec| codec.decode(&bytes));
        self.ctx.record(decoded).ok()
    }

    /// Stores `value` in memory and on disk. Caller holds the write lock.
    fn store(&self, state: &mut MemoryState, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let now = now_millis();
        let item = Item::created_at(value, ttl, now);
        let bytes = self.ctx.codec()?.encode(&item)?;

        // On failure the memory layer must not keep a value the disk lacks
        write_atomic(&self.filename(key), &bytes).inspect_err(|_| {
            state.remove(key);
        })?;

        if self.use_memory {
            state.insert(key.to_string(), item, now);
        }
        Ok(())
    }

    /// Removes `key` from memory and disk. Caller holds the write lock.
    fn remove(&self, state: &mut MemoryState, key: &str) -> Result<()> {
        state.remove(key);
        remove_file(&self.filename(key))
    }

    fn remove_file_logged(&self, path: &Path) {
        if let Err(err) = remove_file(path) {
            self.ctx.record_err(&err);
        }
    }
}

impl Cache for FileCache {
    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.ctx.trace_op("get", key);

        // Nothing gets inserted, so the shared lock keeps writers out
        if !self.use_memory {
            let _guard = self.memory.state().read();
            return self.read_live(key, now_millis()).map(|item| item.value);
        }

        if !self.memory.tracks_recency() {
            if let Lookup::Hit(value) = self.memory.state().read().peek(key, now_millis()) {
                return Some(value);
            }
        }

        let mut state = self.memory.state().write();
        self.load(&mut state, key)
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        self.ctx.trace_op("set", key);
        let mut state = self.memory.state().write();
        let stored = self.store(&mut state, key, value, ttl);
        self.ctx.record(stored)
    }

    fn del(&self, key: &str) -> Result<()> {
        self.ctx.trace_op("del", key);
        let mut state = self.memory.state().write();
        let removed = self.remove(&mut state, key);
        self.ctx.record(removed)
    }

    fn get_multi(&self, keys: &[&str]) -> HashMap<String, Option<Value>> {
        if !self.use_memory {
            let now = now_millis();
            let _guard = self.memory.state().read();
            return keys
                .iter()
                .map(|key| {
                    self.ctx.trace_op("get", key);
                    (key.to_string(), self.read_live(key, now).map(|item| item.value))
                })
                .collect();
        }

        let mut state = self.memory.state().write();
        keys.iter()
            .map(|key| {
                self.ctx.trace_op("get", key);
                (key.to_string(), self.load(&mut state, key))
            })
            .collect()
    }

    fn set_multi(&self, values: HashMap<String, Value>, ttl: Duration) -> Result<()> {
        let mut state = self.memory.state().write();
        for (key, value) in values {
            self.ctx.trace_op("set", &key);
            let stored = self.store(&mut state, &key, value, ttl);
            self.ctx.record(stored)?;
        }
        Ok(())
    }

    fn del_multi(&self, keys: &[&str]) -> Result<()> {
        let mut state = self.memory.state().write();
        for key in keys {
            self.ctx.trace_op("del", key);
            if let Err(err) = self.remove(&mut state, key) {
                self.ctx.record_err(&err);
            }
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.ctx.trace_op("clear", "*");
        let mut state = self.memory.state().write();
        state.clear();

        let removed = match fs::remove_dir_all(&self.dir) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                Err(CacheError::io("remove directory", &self.dir, e))
            }
            _ => Ok(()),
        };
        self.ctx.record(removed)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Writes `bytes` to `path` through a temporary file in the same directory.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| CacheError::io("create directory", parent, e))?;

    let mut tmp =
        NamedTempFile::new_in(parent).map_err(|e| CacheError::io("create temp file in", parent, e))?;
    tmp.write_all(bytes)
        .map_err(|e| CacheError::io("write", tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| CacheError::io("persist", path, e.error))?;
    Ok(())
}

fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(CacheError::io("remove", path, e)),
        _ => Ok(()),
    }
}
