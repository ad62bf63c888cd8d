//! Driver Options and Shared Driver State
//!
//! [`DriverOptions`] carries the knobs every driver understands: a key
//! prefix, debug logging and the [`Codec`] used to persist items.
//! [`DriverContext`] is owned by each driver and bundles those options with
//! the driver's "last error" slot.

use crate::error::{CacheError, Result};
use crate::storage::Item;
use parking_lot::Mutex;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Turns items into bytes and back.
pub trait Codec: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Encodes an item for storage.
    fn encode(&self, item: &Item) -> Result<Vec<u8>>;

    /// Decodes bytes produced by [`Codec::encode`].
    fn decode(&self, bytes: &[u8]) -> Result<Item>;
}

/// The default codec: JSON via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec {
    /// Write indented JSON (handy when inspecting cache files by hand)
    pub pretty: bool,
}

impl JsonCodec {
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, item: &Item) -> Result<Vec<u8>> {
        let encoded = if self.pretty {
            serde_json::to_vec_pretty(item)
        } else {
            serde_json::to_vec(item)
        };
        encoded.map_err(|e| CacheError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Item> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::Decode(e.to_string()))
    }
}

/// Per-driver configuration.
#[derive(Clone)]
pub struct DriverOptions {
    /// Prepended to every key before it reaches the store
    pub prefix: String,
    /// Log every operation at debug level
    pub debug: bool,
    /// Codec for drivers that persist items (`None` disables encoding)
    pub codec: Option<Arc<dyn Codec>>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            debug: false,
            codec: Some(Arc::new(JsonCodec::default())),
        }
    }
}

impl fmt::Debug for DriverOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverOptions")
            .field("prefix", &self.prefix)
            .field("debug", &self.debug)
            .field("codec", &self.codec.as_ref().map(|c| c.name()))
            .finish()
    }
}

impl DriverOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_codec(mut self, codec: impl Codec + 'static) -> Self {
        self.codec = Some(Arc::new(codec));
        self
    }

    /// Removes the codec. Persisting drivers will fail with [`CacheError::NoCodec`].
    pub fn without_codec(mut self) -> Self {
        self.codec = None;
        self
    }
}

/// Options plus the mutable bookkeeping a driver needs.
pub struct DriverContext {
    driver: &'static str,
    options: DriverOptions,
    last_err: Mutex<Option<CacheError>>,
}

impl fmt::Debug for DriverContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverContext")
            .field("driver", &self.driver)
            .field("options", &self.options)
            .field("last_err", &*self.last_err.lock())
            .finish()
    }
}

impl DriverContext {
    pub fn new(driver: &'static str, options: DriverOptions) -> Self {
        Self {
            driver,
            options,
            last_err: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    /// Builds the real store key for `key`.
    pub fn key<'a>(&self, key: &'a str) -> Cow<'a, str> {
        if self.options.prefix.is_empty() {
            Cow::Borrowed(key)
        } else {
            Cow::Owned(format!("{}{}", self.options.prefix, key))
        }
    }

    /// Returns the configured codec or [`CacheError::NoCodec`].
    pub fn codec(&self) -> Result<&dyn Codec> {
        self.options.codec.as_deref().ok_or(CacheError::NoCodec)
    }

    /// Saves `err` as the last error and logs it.
    pub fn record_err(&self, err: &CacheError) {
        warn!(driver = self.driver, error = %err, "Cache operation failed");
        *self.last_err.lock() = Some(err.clone());
    }

    /// Records the error of `result`, if any, and passes the result through.
    pub fn record<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.record_err(err);
        }
        result
    }

    /// The most recent error recorded by this driver.
    pub fn last_err(&self) -> Option<CacheError> {
        self.last_err.lock().clone()
    }

    /// Logs an operation when the driver runs in debug mode.
    #[inline]
    pub fn trace_op(&self, op: &'static str, key: &str) {
        if self.options.debug {
            debug!(driver = self.driver, op, key, "Cache operation");
        }
    }
}
