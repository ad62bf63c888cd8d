//! Process-Wide Default Manager
//!
//! For callers who want package-level `cache::get(...)` style access, this
//! module owns one lazily created [`Manager`] and mirrors its API as free
//! functions. Nothing here is required: a `Manager` built with
//! [`Manager::new`] behaves exactly the same.
//!
//! Tear the default manager down explicitly with [`shutdown`], which closes
//! and unregisters every driver.
//!
//! ```
//! use unicache::manager::global;
//! use unicache::{MemoryCache, ONE_MINUTE};
//! use serde_json::json;
//!
//! global::register("memory", MemoryCache::new());
//! global::set("name", json!("cache value"), ONE_MINUTE).unwrap();
//! assert_eq!(global::get("name").unwrap(), Some(json!("cache value")));
//!
//! global::shutdown().unwrap();
//! ```

use super::{Driver, Manager};
use crate::driver::Cache;
use crate::error::Result;
use crate::Value;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

static DEFAULT_MANAGER: Lazy<Manager> = Lazy::new(Manager::new);

/// The process-wide manager.
pub fn manager() -> &'static Manager {
    &DEFAULT_MANAGER
}

/// Registers `cache` under `name` and makes it the default driver.
pub fn register(name: impl Into<String>, cache: impl Cache + 'static) -> &'static Manager {
    DEFAULT_MANAGER.register_cache(name, cache)
}

/// Registers an already shared driver and makes it the default.
pub fn register_driver(name: impl Into<String>, driver: Driver) -> &'static Manager {
    DEFAULT_MANAGER.register(name, driver)
}

/// Makes `name` the default driver and returns it.
pub fn use_driver(name: &str) -> Result<Driver> {
    DEFAULT_MANAGER.use_driver(name)
}

/// Makes `name` the default driver.
pub fn default_use(name: &str) -> Result<()> {
    DEFAULT_MANAGER.default_use(name)
}

/// Looks a driver up by name.
pub fn driver(name: &str) -> Option<Driver> {
    DEFAULT_MANAGER.driver(name)
}

/// The default driver.
pub fn default_driver() -> Result<Driver> {
    DEFAULT_MANAGER.default_driver()
}

pub fn has(key: &str) -> Result<bool> {
    DEFAULT_MANAGER.has(key)
}

pub fn get(key: &str) -> Result<Option<Value>> {
    DEFAULT_MANAGER.get(key)
}

pub fn set(key: &str, value: Value, ttl: Duration) -> Result<()> {
    DEFAULT_MANAGER.set(key, value, ttl)
}

pub fn del(key: &str) -> Result<()> {
    DEFAULT_MANAGER.del(key)
}

pub fn get_multi(keys: &[&str]) -> Result<HashMap<String, Option<Value>>> {
    DEFAULT_MANAGER.get_multi(keys)
}

pub fn set_multi(values: HashMap<String, Value>, ttl: Duration) -> Result<()> {
    DEFAULT_MANAGER.set_multi(values, ttl)
}

pub fn del_multi(keys: &[&str]) -> Result<()> {
    DEFAULT_MANAGER.del_multi(keys)
}

pub fn clear() -> Result<()> {
    DEFAULT_MANAGER.clear()
}

/// Closes and unregisters every driver of the default manager.
///
/// Returns how many drivers were removed, or the last close error. Drivers
/// are unregistered even when closing one of them fails.
pub fn shutdown() -> Result<usize> {
    let mut last_err = None;
    let removed = DEFAULT_MANAGER.unregister_all_with(|name, driver| {
        if let Err(err) = driver.close() {
            warn!(driver = name, error = %err, "Failed to close cache driver");
            last_err = Some(err);
        }
    });

    last_err.map_or(Ok(removed), Err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use crate::storage::MemoryCache;
    use serde_json::json;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_global_round_trip() {
        shutdown().unwrap();

        register("memory", MemoryCache::new());
        set("name", json!("cache value"), Duration::from_secs(120)).unwrap();
        assert!(has("name").unwrap());
        assert_eq!(get("name").unwrap(), Some(json!("cache value")));

        del("name").unwrap();
        assert_eq!(get("name").unwrap(), None);

        assert_eq!(shutdown().unwrap(), 1);
        assert!(manager().is_empty());
    }

    #[test]
    #[serial]
    fn test_global_default_selection() {
        shutdown().unwrap();

        register("d1", MemoryCache::new());
        register("d2", MemoryCache::new());
        assert_eq!(manager().default_name().as_deref(), Some("d2"));

        set_multi(
            HashMap::from([("a".to_string(), json!(1))]),
            Duration::ZERO,
        )
        .unwrap();

        use_driver("d1").unwrap();
        assert_eq!(get_multi(&["a"]).unwrap()["a"], None);
        assert!(matches!(
            default_use("missing"),
            Err(CacheError::DriverNotFound(_))
        ));

        default_use("d2").unwrap();
        assert_eq!(default_driver().unwrap().get("a"), Some(json!(1)));
        del_multi(&["a"]).unwrap();
        clear().unwrap();
        assert!(driver("d1").is_some());

        assert_eq!(shutdown().unwrap(), 2);
        assert!(matches!(get("a"), Err(CacheError::NoDefaultDriver)));
    }
}
