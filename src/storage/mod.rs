//! Cache Stores
//!
//! The two drivers that unicache implements itself, plus what they share:
//!
//! ```text
//! ┌───────────────────────────────┐
//! │          FileCache            │   one file per key
//! │  ┌─────────────────────────┐  │
//! │  │       MemoryCache       │  │   HashMap<String, Item> behind a RwLock
//! │  └─────────────────────────┘  │
//! └───────────────────────────────┘
//!                 ▲
//!                 │ purge_expired()
//!       ┌─────────┴──────────┐
//!       │   ExpirySweeper    │   optional Tokio task
//!       └────────────────────┘
//! ```
//!
//! - [`Item`]: value plus absolute expiry, shared by both stores
//! - [`MemoryCache`]: lazy expiry, optional LRU capacity, statistics
//! - [`FileCache`]: memory staging layer in front of content-addressed files
//! - [`ExpirySweeper`]: background reclamation of expired memory entries

pub mod expiry;
pub mod file;
pub mod item;
pub mod memory;

pub use expiry::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper};
pub use file::FileCache;
pub use item::{now_millis, Item};
pub use memory::{CacheStats, MemoryCache};
