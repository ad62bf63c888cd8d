//! Cache Errors
//!
//! Every fallible operation in unicache returns [`CacheError`]. Absence of a
//! key is never an error: reads return `None` for missing or expired keys.
//!
//! The error is `Clone` so a driver can hand it back to the caller and keep
//! a copy as its "last error" at the same time.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors produced by cache drivers and the driver manager.
#[derive(Debug, Error, Clone)]
pub enum CacheError {
    /// The driver has to encode or decode an item but has no codec
    #[error("no codec configured for this driver")]
    NoCodec,

    /// A value could not be turned into bytes
    #[error("failed to encode cache value: {0}")]
    Encode(String),

    /// Stored bytes could not be turned back into a value
    #[error("failed to decode cache value: {0}")]
    Decode(String),

    /// A file system operation failed
    #[error("failed to {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    /// No driver is registered under the requested name
    #[error("no cache driver registered as {0:?}")]
    DriverNotFound(String),

    /// No default driver is selected, or it was unregistered
    #[error("no default cache driver selected")]
    NoDefaultDriver,
}

impl CacheError {
    /// Wraps an I/O error with the operation and path that caused it.
    pub fn io(op: &'static str, path: impl AsRef<Path>, source: io::Error) -> Self {
        CacheError::Io {
            op,
            path: path.as_ref().to_path_buf(),
            source: Arc::new(source),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CacheError>;
