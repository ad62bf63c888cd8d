//! Background Expiry Sweeper
//!
//! Memory caches expire keys lazily: an expired item stays in the map until
//! somebody reads it. For caches with many write-once keys that is a leak,
//! so [`ExpirySweeper`] can be started next to a [`MemoryCache`] to purge
//! expired entries periodically.
//!
//! The sweeper is opt-in and runs as a Tokio task. Its interval adapts to
//! the expiry rate: it halves when a large share of entries expired since
//! the last pass and doubles (up to a cap) when nothing expired.

use crate::storage::MemoryCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Interval between the first sweeps (default: 100ms)
    pub base_interval: Duration,

    /// Fastest the sweeper will run (default: 10ms)
    pub min_interval: Duration,

    /// Slowest the sweeper will run (default: 1s)
    pub max_interval: Duration,

    /// Speed up when more than this fraction of entries expired
    pub speedup_threshold: f64,

    /// Slow down when less than this fraction of entries expired
    pub slowdown_threshold: f64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(100),
            min_interval: Duration::from_millis(10),
            max_interval: Duration::from_secs(1),
            speedup_threshold: 0.25,
            slowdown_threshold: 0.01,
        }
    }
}

impl ExpiryConfig {
    /// Computes the interval to use after a pass that removed `expired` of
    /// `tracked` entries.
    fn next_interval(&self, current: Duration, tracked: usize, expired: usize) -> Duration {
        if tracked == 0 {
            return current;
        }

        let rate = expired as f64 / tracked as f64;
        if rate > self.speedup_threshold {
            (current / 2).max(self.min_interval)
        } else if rate < self.slowdown_threshold && expired == 0 {
            (current * 2).min(self.max_interval)
        } else {
            current
        }
    }
}

/// Handle to a running sweeper. Dropping it stops the task.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Spawns the sweeper on the current Tokio runtime.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use unicache::storage::{ExpiryConfig, ExpirySweeper, MemoryCache};
    /// use std::sync::Arc;
    ///
    /// let cache = Arc::new(MemoryCache::new());
    /// let sweeper = ExpirySweeper::start(Arc::clone(&cache), ExpiryConfig::default());
    ///
    /// // ... use the cache ...
    ///
    /// drop(sweeper);
    /// ```
    pub fn start(cache: Arc<MemoryCache>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sweeper_loop(cache, config, shutdown_rx));
        info!("Expiry sweeper started");

        Self { shutdown_tx }
    }

    /// Signals the task to stop. Also called on drop.
    pub fn stop(&self) {
        if self.shutdown_tx.send(true).is_ok() {
            info!("Expiry sweeper stopped");
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweeper_loop(
    cache: Arc<MemoryCache>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = config.base_interval;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let tracked = cache.count();
        let expired = cache.purge_expired();
        let next = config.next_interval(interval, tracked, expired);

        if next < interval {
            debug!(
                expired,
                tracked,
                interval_ms = next.as_millis() as u64,
                "High expiry rate, speeding up sweeper"
            );
        } else if next > interval {
            trace!(
                interval_ms = next.as_millis() as u64,
                "No expired entries, slowing down sweeper"
            );
        }
        interval = next;

        if expired > 0 {
            debug!(expired, remaining = cache.count(), "Purged expired entries");
        }
    }
}

/// Starts a sweeper with the default configuration.
pub fn start_expiry_sweeper(cache: Arc<MemoryCache>) -> ExpirySweeper {
    ExpirySweeper::start(cache, ExpiryConfig::default())
}
