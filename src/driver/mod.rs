//! Cache Driver Contract
//!
//! Every backend in unicache implements [`Cache`]. The trait is object safe
//! so drivers can be stored as `Arc<dyn Cache>` in the
//! [`Manager`](crate::manager::Manager) and swapped at runtime.
//!
//! ## Semantics
//!
//! - A missing or expired key reads as `None`. That is not an error.
//! - A `ttl` of [`Duration::ZERO`] means "never expires".
//! - `del` is idempotent: deleting a missing key succeeds.
//! - Batch writes stop at the first error (earlier entries stay written).
//!   Batch deletes are best effort.
//!
//! ## Typed Access
//!
//! Values are stored as [`Value`](crate::Value). [`CacheExt`] adds
//! `get_as`/`set_as` for any serde type:
//!
//! ```
//! use unicache::{Cache, CacheExt, MemoryCache, FOREVER};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct User {
//!     age: u32,
//!     name: String,
//! }
//!
//! let cache = MemoryCache::new();
//! let user = User { age: 1, name: "inhere".into() };
//!
//! cache.set_as("user", &user, FOREVER).unwrap();
//! assert_eq!(cache.get_as::<User>("user").unwrap(), Some(user));
//! ```

pub mod options;

pub use options::{Codec, DriverContext, DriverOptions, JsonCodec};

use crate::error::{CacheError, Result};
use crate::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// The common interface implemented by every cache driver.
pub trait Cache: Send + Sync {
    /// Returns true if a live (non-expired) value exists for `key`.
    fn has(&self, key: &str) -> bool;

    /// Returns the value for `key`, or `None` if it is missing or expired.
    fn get(&self, key: &str) -> Option<Value>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()>;

    /// Removes `key`. Removing a missing key is not an error.
    fn del(&self, key: &str) -> Result<()>;

    /// Reads several keys. Every requested key appears in the result.
    fn get_multi(&self, keys: &[&str]) -> HashMap<String, Option<Value>>;

    /// Stores several values with the same `ttl`.
    fn set_multi(&self, values: HashMap<String, Value>, ttl: Duration) -> Result<()>;

    /// Removes several keys.
    fn del_multi(&self, keys: &[&str]) -> Result<()>;

    /// Removes every entry held by the driver.
    fn clear(&self) -> Result<()>;

    /// Releases the driver's resources.
    fn close(&self) -> Result<()>;
}

/// Typed helpers available on every [`Cache`].
pub trait CacheExt: Cache {
    /// Reads `key` and deserializes it into `T`.
    fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| CacheError::Decode(e.to_string())),
            None => Ok(None),
        }
    }

    /// Serializes `value` and stores it under `key`.
    fn set_as<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let value = serde_json::to_value(value).map_err(|e| CacheError::Encode(e.to_string()))?;
        self.set(key, value, ttl)
    }
}

impl<C: Cache + ?Sized> CacheExt for C {}
