//! Record Lifecycle Engine
//!
//! [`PasteEngine`] owns the two operations callers can perform:
//!
//! - **create**: validate, generate an id, store the record, attach a passive
//!   expiry hint so abandoned records are eventually reclaimed by the store.
//! - **read**: fetch, decide liveness, evict dead records, count the view.
//!
//! ## Read Algorithm
//!
//! ```text
//!  fetch ──absent──────────────────────────────> NotFound
//!    │
//!    ├─ ttl set and now >= created_at + ttl ───> delete, Expired
//!    │
//!    ├─ max_views set and views >= max_views ──> delete, ViewLimitExceeded
//!    │
//!    └─ view_count + 1, write back ────────────> PublicView
//! ```
//!
//! TTL is checked before the view limit, so a record that breaks both limits
//! always reports `Expired`.
//!
//! ## Concurrent Readers
//!
//! With [`ViewCounting::Atomic`] the write back is a compare-and-swap against
//! the exact bytes that were checked. A reader that loses the race re-reads
//! and re-evaluates, so the view limit and the counter are linearizable per
//! paste. [`ViewCounting::BestEffort`] overwrites the record if it is still
//! present, so concurrent readers may undercount but a deleted record never
//! comes back.

use crate::clock::{Clock, SystemClock};
use crate::paste::api::{CreatePaste, CreatedPaste, PublicView};
use crate::paste::config::{EngineConfig, ViewCounting};
use crate::paste::error::PasteError;
use crate::paste::id::{generate_id, is_valid_id};
use crate::paste::record::{record_key, Liveness, PasteRecord};
use crate::storage::{CasOutcome, KeyValueStore, StorageError};
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Attempts at finding a free id before giving up.
const MAX_ID_ATTEMPTS: usize = 4;

/// Compare-and-swap attempts per read before reporting contention.
const MAX_CAS_ATTEMPTS: usize = 16;

/// Counters reported by `INFO`.
#[derive(Debug, Default)]
struct Counters {
    created: AtomicU64,
    served: AtomicU64,
    expired: AtomicU64,
    view_limited: AtomicU64,
    not_found: AtomicU64,
    storage_errors: AtomicU64,
}

/// Snapshot of the engine's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub created: u64,
    pub served: u64,
    pub expired: u64,
    pub view_limited: u64,
    pub not_found: u64,
    pub storage_errors: u64,
}

/// Creates and serves expiring pastes on top of a [`KeyValueStore`].
///
/// # Example
///
/// ```
/// use flashpaste::paste::{CreatePaste, EngineConfig, PasteEngine};
/// use flashpaste::storage::MemoryStore;
///
/// let engine = PasteEngine::new(MemoryStore::new(), EngineConfig::default());
///
/// let created = engine.create(CreatePaste::new("hello").with_max_views(1), None).unwrap();
/// assert_eq!(created.canonical_url_path, format!("/p/{}", created.id));
///
/// let view = engine.read(&created.id, None).unwrap();
/// assert_eq!(view.content, "hello");
/// assert_eq!(view.remaining_views, Some(0));
///
/// assert!(engine.read(&created.id, None).is_err());
/// ```
pub struct PasteEngine<S> {
    store: S,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    counters: Counters,
}

impl<S> std::fmt::Debug for PasteEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasteEngine")
            .field("config", &self.config)
            .field("created", &self.counters.created.load(Ordering::Relaxed))
            .finish()
    }
}

impl<S: KeyValueStore> PasteEngine<S> {
    /// Creates an engine reading time from the system clock.
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Creates an engine with an explicit time source.
    pub fn with_clock(store: S, config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            config,
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn stats(&self) -> EngineStats {
        let c = &self.counters;
        EngineStats {
            created: c.created.load(Ordering::Relaxed),
            served: c.served.load(Ordering::Relaxed),
            expired: c.expired.load(Ordering::Relaxed),
            view_limited: c.view_limited.load(Ordering::Relaxed),
            not_found: c.not_found.load(Ordering::Relaxed),
            storage_errors: c.storage_errors.load(Ordering::Relaxed),
        }
    }

    /// Resolves the time a call runs at.
    ///
    /// A caller-supplied override only counts in test mode.
    fn now(&self, override_ms: Option<i64>) -> i64 {
        match override_ms {
            Some(ms) if self.config.test_mode => ms,
            Some(ms) => {
                debug!(requested_ms = ms, "Ignoring time override outside test mode");
                self.clock.now_ms()
            }
            None => self.clock.now_ms(),
        }
    }

    /// Stores a new paste and returns its share links.
    pub fn create(
        &self,
        request: CreatePaste,
        now_override: Option<i64>,
    ) -> Result<CreatedPaste, PasteError> {
        let now_ms = self.now(now_override);
        let (id, _) = self.create_at(request, now_ms)?;
        Ok(CreatedPaste::new(id, &self.config.base_url))
    }

    /// Stores a new paste created at `now_ms`.
    pub fn create_at(
        &self,
        request: CreatePaste,
        now_ms: i64,
    ) -> Result<(String, PasteRecord), PasteError> {
        let limits = request.validate()?;
        let record = PasteRecord::new(
            request.content,
            now_ms,
            limits.ttl_seconds,
            limits.max_views,
        );

        for attempt in 1..=MAX_ID_ATTEMPTS {
            let id = generate_id();
            let key = record_key(&id);

            let inserted = self
                .store
                .set_if_absent(&key, record.encode(&key)?)
                .inspect_err(|e| self.storage_failed(&key, e))?;
            if !inserted {
                warn!(id = %id, attempt = attempt, "Paste id collision, regenerating");
                continue;
            }

            // Reclamation hint only; the logical TTL never depends on it
            let passive_ttl = self.config.passive_ttl(limits.ttl_seconds);
            if let Err(e) = self.store.expire(&key, passive_ttl) {
                warn!(id = %id, error = %e, "Store rejected passive expiry hint");
            }

            self.counters.created.fetch_add(1, Ordering::Relaxed);
            info!(
                id = %id,
                ttl_seconds = ?limits.ttl_seconds,
                max_views = ?limits.max_views,
                passive_ttl_secs = passive_ttl.as_secs(),
                "Paste created"
            );
            return Ok((id, record));
        }

        let err = StorageError::Unavailable("could not allocate a unique paste id".to_string());
        self.counters.storage_errors.fetch_add(1, Ordering::Relaxed);
        Err(err.into())
    }

    /// Serves a paste, counting the view.
    pub fn read(&self, id: &str, now_override: Option<i64>) -> Result<PublicView, PasteError> {
        self.read_at(id, self.now(now_override))
    }

    /// Serves a paste as of `now_ms`, counting the view.
    pub fn read_at(&self, id: &str, now_ms: i64) -> Result<PublicView, PasteError> {
        let result = if is_valid_id(id) {
            let key = record_key(id);
            match self.config.view_counting {
                ViewCounting::Atomic => self.read_atomic(&key, now_ms),
                ViewCounting::BestEffort => self.read_best_effort(&key, now_ms),
            }
        } else {
            Err(PasteError::NotFound)
        };

        let counter = match &result {
            Ok(_) => &self.counters.served,
            Err(PasteError::NotFound) => &self.counters.not_found,
            Err(PasteError::Expired) => &self.counters.expired,
            Err(PasteError::ViewLimitExceeded) => &self.counters.view_limited,
            Err(_) => &self.counters.storage_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        result
    }

    fn read_atomic(&self, key: &str, now_ms: i64) -> Result<PublicView, PasteError> {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let Some((raw, record)) = self.fetch(key)? else {
                return Err(PasteError::NotFound);
            };
            self.evict_if_dead(key, &record, now_ms)?;

            let viewed = record.viewed();
            let outcome = self
                .store
                .compare_and_swap(key, &raw, viewed.encode(key)?)
                .inspect_err(|e| self.storage_failed(key, e))?;

            match outcome {
                CasOutcome::Swapped => return Ok(PublicView::of(&viewed)),
                // Evicted or passively expired by someone else
                CasOutcome::Missing => return Err(PasteError::NotFound),
                CasOutcome::Mismatch => {
                    trace!(key = key, attempt = attempt, "Lost view-count race, retrying");
                }
            }
        }

        warn!(key = key, attempts = MAX_CAS_ATTEMPTS, "Giving up on contended paste");
        Err(StorageError::Contention {
            key: key.to_string(),
            attempts: MAX_CAS_ATTEMPTS,
        }
        .into())
    }

    fn read_best_effort(&self, key: &str, now_ms: i64) -> Result<PublicView, PasteError> {
        let Some((_, record)) = self.fetch(key)? else {
            return Err(PasteError::NotFound);
        };
        self.evict_if_dead(key, &record, now_ms)?;

        let viewed = record.viewed();
        let written = self
            .store
            .set_if_present(key, viewed.encode(key)?)
            .inspect_err(|e| self.storage_failed(key, e))?;

        // Evicted or passively expired since the fetch; never bring it back
        if !written {
            return Err(PasteError::NotFound);
        }
        Ok(PublicView::of(&viewed))
    }

    /// Fetches and decodes a record, keeping the raw bytes for compare-and-swap.
    fn fetch(&self, key: &str) -> Result<Option<(Bytes, PasteRecord)>, PasteError> {
        let Some(raw) = self
            .store
            .get(key)
            .inspect_err(|e| self.storage_failed(key, e))?
        else {
            return Ok(None);
        };

        let record = PasteRecord::decode(key, &raw).inspect_err(|e| self.storage_failed(key, e))?;
        Ok(Some((raw, record)))
    }

    /// Deletes `record` if it is dead at `now_ms` and reports why.
    ///
    /// If the delete fails the caller gets the storage error and the record
    /// is left exactly as it was.
    fn evict_if_dead(
        &self,
        key: &str,
        record: &PasteRecord,
        now_ms: i64,
    ) -> Result<(), PasteError> {
        let reason = match record.liveness(now_ms) {
            Liveness::Alive => return Ok(()),
            Liveness::Expired => PasteError::Expired,
            Liveness::ViewLimitReached => PasteError::ViewLimitExceeded,
        };

        let removed = self
            .store
            .delete(key)
            .inspect_err(|e| self.storage_failed(key, e))?;

        info!(
            key = key,
            reason = %reason,
            view_count = record.view_count,
            removed = removed,
            "Evicted dead paste"
        );
        Err(reason)
    }

    fn storage_failed(&self, key: &str, error: &StorageError) {
        warn!(key = key, error = %error, "Storage operation failed");
    }
}
