//! Background Expiry Sweeper
//!
//! The store forgets a key lazily, when somebody touches it after its passive
//! deadline. A paste that nobody asks for again would never be touched, so
//! this module runs a background Tokio task that periodically calls
//! [`MemoryStore::cleanup_expired`].
//!
//! This is storage reclamation only. The paste engine enforces its logical
//! TTL on every read and never waits for the sweeper.
//!
//! ## Adaptive Frequency
//!
//! ```text
//!   expired / scanned > speedup_threshold   -> interval / 2 (>= min_interval)
//!   nothing expired, rate < slowdown        -> interval * 2 (<= max_interval)
//!   otherwise                               -> unchanged
//! ```

use crate::storage::MemoryStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Starting interval between sweeps (default: 100ms)
    pub base_interval: Duration,

    /// Shortest interval the sweeper may speed up to (default: 10ms)
    pub min_interval: Duration,

    /// Longest interval the sweeper may back off to (default: 1s)
    pub max_interval: Duration,

    /// Expired fraction above which the sweeper speeds up
    pub speedup_threshold: f64,

    /// Expired fraction below which an idle sweeper slows down
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
    /// Computes the next sleep interval from the outcome of one sweep.
    fn next_interval(&self, current: Duration, scanned: u64, expired: u64) -> Duration {
        if scanned == 0 {
            return current;
        }

        let rate = expired as f64 / scanned as f64;
        if rate > self.speedup_threshold {
            (current / 2).max(self.min_interval)
        } else if expired == 0 && rate < self.slowdown_threshold {
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
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn start(store: Arc<MemoryStore>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sweep_loop(store, config, shutdown_rx));
        info!("Passive expiry sweeper started");

        Self { shutdown_tx }
    }

    /// Signals the sweeper task to exit.
    pub fn stop(&self) {
        if self.shutdown_tx.send(true).is_ok() {
            info!("Passive expiry sweeper stopped");
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweep_loop(
    store: Arc<MemoryStore>,
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

        let scanned = store.len();
        let expired = match store.cleanup_expired() {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Expiry sweep failed");
                continue;
            }
        };

        let next = config.next_interval(interval, scanned, expired);
        if next != interval {
            trace!(
                expired = expired,
                scanned = scanned,
                from_ms = interval.as_millis() as u64,
                to_ms = next.as_millis() as u64,
                "Adjusted sweep interval"
            );
            interval = next;
        }

        if expired > 0 {
            debug!(
                expired = expired,
                keys_remaining = store.len(),
                "Reclaimed passively expired keys"
            );
        }
    }
}

/// Starts the sweeper with [`ExpiryConfig::default`].
pub fn start_expiry_sweeper(store: Arc<MemoryStore>) -> ExpirySweeper {
    ExpirySweeper::start(store, ExpiryConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::KeyValueStore;
    use bytes::Bytes;

    fn fast_config() -> ExpiryConfig {
        ExpiryConfig {
            base_interval: Duration::from_millis(10),
            ..Default::default()
        }
    }

    #[test]
    fn test_next_interval_speeds_up() {
        let config = ExpiryConfig::default();
        let next = config.next_interval(Duration::from_millis(100), 10, 5);
        assert_eq!(next, Duration::from_millis(50));

        let floor = config.next_interval(Duration::from_millis(12), 10, 10);
        assert_eq!(floor, config.min_interval);
    }

    #[test]
    fn test_next_interval_backs_off() {
        let config = ExpiryConfig::default();
        let next = config.next_interval(Duration::from_millis(100), 1000, 0);
        assert_eq!(next, Duration::from_millis(200));

        let ceiling = config.next_interval(Duration::from_millis(900), 1000, 0);
        assert_eq!(ceiling, config.max_interval);
    }

    #[test]
    fn test_next_interval_empty_store_unchanged() {
        let config = ExpiryConfig::default();
        let current = Duration::from_millis(100);
        assert_eq!(config.next_interval(current, 0, 0), current);
    }

    #[tokio::test]
    async fn test_sweeper_reclaims_untouched_keys() {
        let store = Arc::new(MemoryStore::new());

        for i in 0..10 {
            let key = format!("paste:{}", i);
            store.set(&key, Bytes::from("record")).unwrap();
            store.expire(&key, Duration::from_millis(50)).unwrap();
        }
        store.set("paste:keep", Bytes::from("record")).unwrap();
        assert_eq!(store.len(), 11);

        let _sweeper = ExpirySweeper::start(Arc::clone(&store), fast_config());
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Reclaimed without anyone reading the keys
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().get_ops, 0);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_drop() {
        let store = Arc::new(MemoryStore::new());

        {
            let _sweeper = ExpirySweeper::start(Arc::clone(&store), fast_config());
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        store.set("paste:late", Bytes::from("record")).unwrap();
        store.expire("paste:late", Duration::from_millis(10)).unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;

        // Still physically present: only a read would clear it now
        assert_eq!(store.len(), 1);
        assert!(store.get("paste:late").unwrap().is_none());
        assert_eq!(store.len(), 0);
    }
}
