//! # unicache - A Uniform Caching Facade
//!
//! unicache puts one interface in front of different cache backends and lets
//! an application switch between them by name.
//!
//! ## Features
//!
//! - **One Contract**: every driver implements [`Cache`] (has/get/set/del,
//!   batch variants, clear, close)
//! - **Memory Driver**: concurrent `HashMap` with per-key TTL, lazy expiry
//!   and optional LRU capacity
//! - **File Driver**: one content-addressed file per key, fronted by a
//!   memory cache, survives restarts
//! - **Driver Manager**: named drivers, one default, convenience dispatch
//! - **Background Sweeper**: optional Tokio task reclaiming expired entries
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                              unicache                               │
//! │                                                                     │
//! │   ┌─────────────────────┐         ┌────────────────────────────┐    │
//! │   │  manager::global    │ ──────> │          Manager           │    │
//! │   │  (optional static)  │         │  name ──> Arc<dyn Cache>   │    │
//! │   └─────────────────────┘         │  default name              │    │
//! │                                   └─────────────┬──────────────┘    │
//! │                                                 │                   │
//! │                       ┌─────────────────────────┴──────────┐        │
//! │                       ▼                                    ▼        │
//! │            ┌────────────────────┐             ┌────────────────────┐│
//! │            │    MemoryCache     │ <────────── │     FileCache      ││
//! │            │ RwLock<HashMap>    │  staging    │ <dir>/<md5>.data   ││
//! │            └─────────▲──────────┘             └────────────────────┘│
//! │                      │                                              │
//! │            ┌─────────┴──────────┐                                   │
//! │            │   ExpirySweeper    │                                   │
//! │            └────────────────────┘                                   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use unicache::{Cache, Manager, MemoryCache, FileCache, TWO_MINUTES};
//! use serde_json::json;
//!
//! let dir = tempfile::tempdir().unwrap();
//!
//! let manager = Manager::new();
//! manager
//!     .register_cache("file", FileCache::new(dir.path()))
//!     .register_cache("memory", MemoryCache::new());
//!
//! // Goes to the default driver: "memory", the last one registered
//! manager.set("name", json!("cache value"), TWO_MINUTES).unwrap();
//! assert_eq!(manager.get("name").unwrap(), Some(json!("cache value")));
//!
//! // Drivers can also be used directly
//! let file = manager.driver("file").unwrap();
//! assert!(!file.has("name"));
//! ```
//!
//! ## Expiry
//!
//! A TTL of [`FOREVER`] (zero) never expires. Otherwise a value is readable
//! until `set time + ttl` and gone from that instant on. Expired values are
//! removed when they are next read, or by an [`ExpirySweeper`].
//!
//! ## Module Overview
//!
//! - [`driver`]: the [`Cache`] trait, typed helpers, options and codecs
//! - [`storage`]: memory and file drivers, items, the expiry sweeper
//! - [`manager`]: the driver registry and the optional global instance
//! - [`error`]: the crate error type

pub mod driver;
pub mod error;
pub mod manager;
pub mod storage;

// Re-export commonly used types for convenience
pub use driver::{Cache, CacheExt, Codec, DriverOptions, JsonCodec};
pub use error::{CacheError, Result};
pub use manager::{Driver, Manager};
pub use storage::{
    start_expiry_sweeper, CacheStats, ExpiryConfig, ExpirySweeper, FileCache, Item, MemoryCache,
};

use std::time::Duration;

/// The value type stored by every driver.
pub type Value = serde_json::Value;

/// Name conventionally used for a registered file driver
pub const DRIVER_FILE: &str = "file";

/// Name conventionally used for a registered memory driver
pub const DRIVER_MEMORY: &str = "memory";

/// Version of unicache
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// TTL PRESETS
// ============================================================================

/// Never expire
pub const FOREVER: Duration = Duration::ZERO;
pub const ONE_SECOND: Duration = Duration::from_secs(1);
pub const TWO_SECONDS: Duration = Duration::from_secs(2);
pub const THREE_SECONDS: Duration = Duration::from_secs(3);
pub const FIVE_SECONDS: Duration = Duration::from_secs(5);
pub const TEN_SECONDS: Duration = Duration::from_secs(10);
pub const THIRTY_SECONDS: Duration = Duration::from_secs(30);
pub const ONE_MINUTE: Duration = Duration::from_secs(60);
pub const TWO_MINUTES: Duration = Duration::from_secs(120);
pub const FIVE_MINUTES: Duration = Duration::from_secs(300);
pub const TEN_MINUTES: Duration = Duration::from_secs(600);
pub const HALF_HOUR: Duration = Duration::from_secs(1800);
pub const ONE_HOUR: Duration = Duration::from_secs(3600);
pub const HALF_DAY: Duration = Duration::from_secs(43_200);
pub const ONE_DAY: Duration = Duration::from_secs(86_400);
pub const ONE_WEEK: Duration = Duration::from_secs(604_800);
