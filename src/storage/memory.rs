//! Sharded In-Memory Store with Passive Expiry
//!
//! This module implements [`MemoryStore`], the in-process collaborator behind
//! the paste engine. It behaves like a small Redis: string keys, opaque byte
//! values, and an optional per-key deadline after which the key silently
//! disappears.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Keys are spread over 64 shards, each with its own
//!    `RwLock`, so unrelated pastes never contend.
//! 2. **Lazy Expiry**: A key past its deadline is removed the moment someone
//!    touches it. The background sweeper in [`super::expiry`] handles keys
//!    nobody touches again.
//! 3. **KEEPTTL Overwrites**: `set` and `compare_and_swap` keep the deadline
//!    already attached to a key. Updating a view counter must not turn a
//!    record into an immortal one.
//! 4. **No Panics on Poison**: a poisoned shard surfaces as
//!    [`StorageError::Poisoned`] instead of taking the server down.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       MemoryStore                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Compare-and-swap holds the shard's write lock for the whole
//! compare-then-replace step, which is what makes it atomic per key.

use crate::storage::kv::{CasOutcome, KeyValueStore, StorageError};
use bytes::Bytes;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::trace;

/// Number of shards for the store.
const NUM_SHARDS: usize = 64;

/// Rough per-entry bookkeeping overhead used by [`MemoryStore::memory_info`].
const ENTRY_OVERHEAD: usize = 64;

/// A stored value with its optional passive deadline.
#[derive(Debug, Clone)]
pub struct Entry {
    /// The opaque value
    pub value: Bytes,
    /// When the store drops this entry on its own (None = never)
    pub expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Bytes) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    /// Checks if the passive deadline has passed.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| Instant::now() >= exp)
            .unwrap_or(false)
    }

    /// Remaining time before passive expiry, or None if the entry has no deadline.
    pub fn ttl(&self) -> Option<Duration> {
        self.expires_at
            .map(|exp| exp.saturating_duration_since(Instant::now()))
    }
}

type ShardMap = HashMap<String, Entry>;

#[derive(Debug, Default)]
struct Shard {
    data: RwLock<ShardMap>,
}

impl Shard {
    fn read(&self) -> Result<RwLockReadGuard<'_, ShardMap>, StorageError> {
        self.data.read().map_err(|_| StorageError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, ShardMap>, StorageError> {
        self.data.write().map_err(|_| StorageError::Poisoned)
    }
}

/// Operation counters reported by `INFO`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StorageStats {
    /// Number of keys currently stored (approximate)
    pub keys: u64,
    /// Total reads
    pub get_ops: u64,
    /// Total writes (set, set_if_absent, successful swaps)
    pub set_ops: u64,
    /// Total explicit deletes that removed a key
    pub del_ops: u64,
    /// Keys removed by passive expiry (lazy or swept)
    pub expired: u64,
    /// Compare-and-swap calls that lost to a concurrent writer
    pub cas_conflicts: u64,
}

/// Memory usage information.
#[derive(Debug, Clone, Copy)]
pub struct MemoryInfo {
    /// Number of live keys
    pub keys: usize,
    /// Approximate memory used in bytes
    pub used_memory: usize,
}

/// Thread-safe, sharded key-value store with passive expiry.
///
/// Wrap it in an `Arc` and share it between the engine and the
/// [`ExpirySweeper`](super::ExpirySweeper).
///
/// # Example
///
/// ```
/// use flashpaste::storage::{KeyValueStore, MemoryStore};
/// use bytes::Bytes;
/// use std::time::Duration;
///
/// let store = MemoryStore::new();
/// store.set("paste:abc", Bytes::from("{}")).unwrap();
/// assert!(store.expire("paste:abc", Duration::from_secs(60)).unwrap());
/// assert_eq!(store.get("paste:abc").unwrap(), Some(Bytes::from("{}")));
/// ```
pub struct MemoryStore {
    shards: Vec<Shard>,
    key_count: AtomicU64,
    get_count: AtomicU64,
    set_count: AtomicU64,
    del_count: AtomicU64,
    expired_count: AtomicU64,
    cas_conflicts: AtomicU64,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("shards", &self.shards.len())
            .field("key_count", &self.key_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            shards: (0..NUM_SHARDS).map(|_| Shard::default()).collect(),
            key_count: AtomicU64::new(0),
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
            cas_conflicts: AtomicU64::new(0),
        }
    }

    #[inline]
    fn shard(&self, key: &str) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % NUM_SHARDS]
    }

    /// Drops `key` from a write-locked shard if its deadline has passed.
    ///
    /// Returns `true` if the key was removed.
    fn evict_if_expired(&self, data: &mut ShardMap, key: &str) -> bool {
        if data.get(key).is_some_and(Entry::is_expired) {
            data.remove(key);
            self.key_count.fetch_sub(1, Ordering::Relaxed);
            self.expired_count.fetch_add(1, Ordering::Relaxed);
            trace!(key = key, "Lazily expired key");
            return true;
        }
        false
    }

    /// Remaining passive TTL of a key, in milliseconds.
    ///
    /// - `Some(ms)` if the key exists and has a deadline
    /// - `Some(-1)` if the key exists without a deadline
    /// - `None` if the key doesn't exist
    pub fn pttl(&self, key: &str) -> Result<Option<i64>, StorageError> {
        let data = self.shard(key).read()?;
        Ok(data.get(key).filter(|e| !e.is_expired()).map(|entry| {
            entry
                .ttl()
                .map(|d| d.as_millis() as i64)
                .unwrap_or(-1)
        }))
    }

    /// Returns the approximate number of keys.
    pub fn len(&self) -> u64 {
        self.key_count.load(Ordering::Relaxed)
    }

    /// Returns true if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of the operation counters.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.key_count.load(Ordering::Relaxed),
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
            cas_conflicts: self.cas_conflicts.load(Ordering::Relaxed),
        }
    }

    /// Walks every shard and sums live keys and their approximate size.
    pub fn memory_info(&self) -> Result<MemoryInfo, StorageError> {
        let mut keys = 0usize;
        let mut used_memory = 0usize;

        for shard in &self.shards {
            let data = shard.read()?;
            for (key, entry) in data.iter().filter(|(_, e)| !e.is_expired()) {
                keys += 1;
                used_memory += key.len() + entry.value.len() + ENTRY_OVERHEAD;
            }
        }

        Ok(MemoryInfo { keys, used_memory })
    }

    /// Removes every key whose passive deadline has passed.
    ///
    /// Called by the background sweeper. Returns the number of keys removed.
    pub fn cleanup_expired(&self) -> Result<u64, StorageError> {
        let mut cleaned = 0u64;

        for shard in &self.shards {
            let mut data = shard.write()?;
            let before = data.len();
            data.retain(|_, entry| !entry.is_expired());
            cleaned += (before - data.len()) as u64;
        }

        if cleaned > 0 {
            self.key_count.fetch_sub(cleaned, Ordering::Relaxed);
            self.expired_count.fetch_add(cleaned, Ordering::Relaxed);
        }

        Ok(cleaned)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Bytes>, StorageError> {
        self.get_count.fetch_add(1, Ordering::Relaxed);
        let shard = self.shard(key);

        // Fast path under the read lock
        {
            let data = shard.read()?;
            match data.get(key) {
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        let mut data = shard.write()?;
        if self.evict_if_expired(&mut data, key) {
            return Ok(None);
        }
        // Another writer may have replaced the key in between
        Ok(data.get(key).map(|entry| entry.value.clone()))
    }

    fn set(&self, key: &str, value: Bytes) -> Result<(), StorageError> {
        self.set_count.fetch_add(1, Ordering::Relaxed);
        let mut data = self.shard(key).write()?;
        self.evict_if_expired(&mut data, key);

        match data.get_mut(key) {
            Some(entry) => entry.value = value,
            None => {
                data.insert(key.to_string(), Entry::new(value));
                self.key_count.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    fn set_if_absent(&self, key: &str, value: Bytes) -> Result<bool, StorageError> {
        let mut data = self.shard(key).write()?;
        self.evict_if_expired(&mut data, key);

        if data.contains_key(key) {
            return Ok(false);
        }

        self.set_count.fetch_add(1, Ordering::Relaxed);
        data.insert(key.to_string(), Entry::new(value));
        self.key_count.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    fn set_if_present(&self, key: &str, value: Bytes) -> Result<bool, StorageError> {
        let mut data = self.shard(key).write()?;
        self.evict_if_expired(&mut data, key);

        let Some(entry) = data.get_mut(key) else {
            return Ok(false);
        };

        self.set_count.fetch_add(1, Ordering::Relaxed);
        entry.value = value;
        Ok(true)
    }

    fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let mut data = self.shard(key).write()?;
        if self.evict_if_expired(&mut data, key) {
            return Ok(false);
        }

        if data.remove(key).is_some() {
            self.key_count.fetch_sub(1, Ordering::Relaxed);
            self.del_count.fetch_add(1, Ordering::Relaxed);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StorageError> {
        let mut data = self.shard(key).write()?;
        self.evict_if_expired(&mut data, key);

        match data.get_mut(key) {
            Some(entry) => {
                // A deadline too far out to represent means "never"
                entry.expires_at = Instant::now().checked_add(ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: &[u8],
        new: Bytes,
    ) -> Result<CasOutcome, StorageError> {
        let mut data = self.shard(key).write()?;
        self.evict_if_expired(&mut data, key);

        let Some(entry) = data.get_mut(key) else {
            return Ok(CasOutcome::Missing);
        };

        if entry.value.as_ref() != expected {
            self.cas_conflicts.fetch_add(1, Ordering::Relaxed);
            return Ok(CasOutcome::Mismatch);
        }

        self.set_count.fetch_add(1, Ordering::Relaxed);
        entry.value = new;
        Ok(CasOutcome::Swapped)
    }
}
