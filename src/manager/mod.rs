//! Driver Manager
//!
//! A [`Manager`] holds named cache drivers and remembers which one is the
//! default. The convenience methods (`get`, `set`, ...) forward to the
//! default driver.
//!
//! ## Default Selection
//!
//! ```text
//!  register("a") ──> default = a
//!  register("b") ──> default = b        (the newest driver wins)
//!  use_driver("a") ─> default = a
//!  use_driver("x") ─> Err(DriverNotFound), default stays a
//!  unregister("a") ─> default unset,    default_driver() fails
//! ```
//!
//! The manager never falls back to another driver: every convenience call
//! made without a resolvable default fails with
//! [`CacheError::NoDefaultDriver`].
//!
//! ## Example
//!
//! ```
//! use unicache::{Manager, MemoryCache, FOREVER};
//! use serde_json::json;
//!
//! let manager = Manager::new();
//! manager
//!     .register_cache("memory", MemoryCache::new())
//!     .register_cache("sessions", MemoryCache::with_capacity(1024));
//!
//! // "sessions" was registered last, so it is the default
//! manager.set("token", json!("abc"), FOREVER).unwrap();
//! assert_eq!(manager.default_name().as_deref(), Some("sessions"));
//!
//! manager.use_driver("memory").unwrap();
//! assert_eq!(manager.get("token").unwrap(), None);
//! ```

pub mod global;

use crate::driver::Cache;
use crate::error::{CacheError, Result};
use crate::Value;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A shared, type-erased cache driver.
pub type Driver = Arc<dyn Cache>;

#[derive(Default)]
struct Registry {
    drivers: HashMap<String, Driver>,
    default_name: Option<String>,
}

/// Named collection of cache drivers with one default.
#[derive(Default)]
pub struct Manager {
    registry: RwLock<Registry>,
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.read();
        let mut names: Vec<_> = registry.drivers.keys().collect();
        names.sort();
        f.debug_struct("Manager")
            .field("drivers", &names)
            .field("default_name", &registry.default_name)
            .finish()
    }
}

impl Manager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `driver` under `name` and makes it the default.
    ///
    /// A driver already registered under `name` is replaced.
    pub fn register(&self, name: impl Into<String>, driver: Driver) -> &Self {
        let name = name.into();
        let mut registry = self.registry.write();

        if registry.drivers.insert(name.clone(), driver).is_some() {
            warn!(driver = %name, "Replaced cache driver");
        } else {
            info!(driver = %name, "Registered cache driver");
        }
        registry.default_name = Some(name);
        self
    }

    /// Wraps `cache` in an `Arc` and registers it.
    pub fn register_cache(&self, name: impl Into<String>, cache: impl Cache + 'static) -> &Self {
        self.register(name, Arc::new(cache))
    }

    /// Removes the driver registered under `name` and returns it.
    ///
    /// If it was the default, no default is selected afterwards.
    pub fn unregister(&self, name: &str) -> Option<Driver> {
        let mut registry = self.registry.write();
        let removed = registry.drivers.remove(name)?;

        if registry.default_name.as_deref() == Some(name) {
            registry.default_name = None;
        }
        info!(driver = name, "Unregistered cache driver");
        Some(removed)
    }

    /// Removes every driver and returns how many were removed.
    pub fn unregister_all(&self) -> usize {
        self.unregister_all_with(|_, _| {})
    }

    /// Removes every driver, calling `cleanup` on each one first.
    ///
    /// ```
    /// use unicache::{Cache, Manager, MemoryCache};
    ///
    /// let manager = Manager::new();
    /// manager.register_cache("a", MemoryCache::new());
    ///
    /// let removed = manager.unregister_all_with(|_name, driver| {
    ///     let _ = driver.close();
    /// });
    /// assert_eq!(removed, 1);
    /// ```
    pub fn unregister_all_with<F>(&self, mut cleanup: F) -> usize
    where
        F: FnMut(&str, &dyn Cache),
    {
        let drivers = {
            let mut registry = self.registry.write();
            registry.default_name = None;
            std::mem::take(&mut registry.drivers)
        };

        for (name, driver) in &drivers {
            cleanup(name, driver.as_ref());
        }

        if !drivers.is_empty() {
            info!(count = drivers.len(), "Unregistered all cache drivers");
        }
        drivers.len()
    }

    /// Makes `name` the default driver and returns it.
    pub fn use_driver(&self, name: &str) -> Result<Driver> {
        let mut registry = self.registry.write();
        let driver = registry
            .drivers
            .get(name)
            .cloned()
            .ok_or_else(|| CacheError::DriverNotFound(name.to_string()))?;

        registry.default_name = Some(name.to_string());
        Ok(driver)
    }

    /// Makes `name` the default driver.
    pub fn default_use(&self, name: &str) -> Result<()> {
        self.use_driver(name).map(|_| ())
    }

    /// Looks a driver up without touching the default.
    pub fn driver(&self, name: &str) -> Option<Driver> {
        self.registry.read().drivers.get(name).cloned()
    }

    /// The default driver.
    pub fn default_driver(&self) -> Result<Driver> {
        let registry = self.registry.read();
        registry
            .default_name
            .as_deref()
            .and_then(|name| registry.drivers.get(name))
            .cloned()
            .ok_or(CacheError::NoDefaultDriver)
    }

    /// Name of the default driver, if one is selected.
    pub fn default_name(&self) -> Option<String> {
        self.registry.read().default_name.clone()
    }

    /// Names of all registered drivers, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.registry.read().drivers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.registry.read().drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Closes every registered driver.
    ///
    /// All drivers are closed even if some fail; the last failure is returned.
    pub fn close(&self) -> Result<()> {
        let drivers: Vec<(String, Driver)> = self
            .registry
            .read()
            .drivers
            .iter()
            .map(|(name, driver)| (name.clone(), Arc::clone(driver)))
            .collect();

        let mut last_err = None;
        for (name, driver) in drivers {
            if let Err(err) = driver.close() {
                warn!(driver = %name, error = %err, "Failed to close cache driver");
                last_err = Some(err);
            }
        }

        last_err.map_or(Ok(()), Err)
    }

    // ========================================================================
    // DEFAULT DRIVER SHORTCUTS
    // ========================================================================

    pub fn has(&self, key: &str) -> Result<bool> {
        Ok(self.default_driver()?.has(key))
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.default_driver()?.get(key))
    }

    pub fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        self.default_driver()?.set(key, value, ttl)
    }

    pub fn del(&self, key: &str) -> Result<()> {
        self.default_driver()?.del(key)
    }

    pub fn get_multi(&self, keys: &[&str]) -> Result<HashMap<String, Option<Value>>> {
        Ok(self.default_driver()?.get_multi(keys))
    }

    pub fn set_multi(&self, values: HashMap<String, Value>, ttl: Duration) -> Result<()> {
        self.default_driver()?.set_multi(values, ttl)
    }

    pub fn del_multi(&self, keys: &[&str]) -> Result<()> {
        self.default_driver()?.del_multi(keys)
    }

    pub fn clear(&self) -> Result<()> {
        self.default_driver()?.clear()
    }
}
