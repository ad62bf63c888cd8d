//! Cache Items
//!
//! An [`Item`] is what every store keeps per key: the value plus an absolute
//! expiry timestamp. The same struct is held in memory and written to disk,
//! so both layers agree on when a key expires.

use crate::Value;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current wall-clock time as Unix milliseconds.
#[inline]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// A stored value with its expiry time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// The cached value
    pub value: Value,
    /// Unix timestamp in milliseconds after which the item is gone (0 = never)
    #[serde(default)]
    pub expires_at: u64,
}

impl Item {
    /// Creates an item that expires `ttl` from now.
    ///
    /// A zero `ttl` means the item never expires. Sub-millisecond TTLs are
    /// rounded up so a positive TTL never produces an already-expired item.
    pub fn new(value: Value, ttl: Duration) -> Self {
        Self::created_at(value, ttl, now_millis())
    }

    /// Creates an item as if it had been set at `now` (Unix milliseconds).
    pub fn created_at(value: Value, ttl: Duration, now: u64) -> Self {
        let expires_at = if ttl.is_zero() {
            0
        } else {
            let ttl_ms = ttl.as_nanos().div_ceil(1_000_000);
            now.saturating_add(u64::try_from(ttl_ms).unwrap_or(u64::MAX))
        };

        Self { value, expires_at }
    }

    /// Creates an item that never expires.
    pub fn forever(value: Value) -> Self {
        Self {
            value,
            expires_at: 0,
        }
    }

    /// Checks if this item has expired.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }

    /// Checks if this item is expired at the given Unix millisecond time.
    #[inline]
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expires_at != 0 && now >= self.expires_at
    }

    /// Remaining time to live, or `None` if the item never expires.
    pub fn remaining(&self) -> Option<Duration> {
        self.remaining_at(now_millis())
    }

    /// Remaining time to live at the given Unix millisecond time.
    pub fn remaining_at(&self, now: u64) -> Option<Duration> {
        if self.expires_at == 0 {
            return None;
        }
        Some(Duration::from_millis(self.expires_at.saturating_sub(now)))
    }
}
