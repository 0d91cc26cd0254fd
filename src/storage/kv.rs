//! Key-Value Collaborator Contract
//!
//! The paste engine never talks to a concrete store. It goes through the
//! [`KeyValueStore`] trait defined here, which captures the handful of
//! operations a Redis-like store offers:
//!
//! ```text
//! get(key)                          -> Option<value>
//! set(key, value)                   -> full overwrite
//! set_if_absent(key, value)         -> insert only if the key is free
//! delete(key)                       -> bool
//! expire(key, ttl)                  -> passive TTL hint
//! compare_and_swap(key, old, new)   -> conditional overwrite
//! ```
//!
//! Values are opaque bytes. Interpreting them is the engine's job.

use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a key-value collaborator.
///
/// Every variant is transient from the caller's point of view: the logical
/// state of a paste is unknown, so the operation may be retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// A shard lock was poisoned by a panicking writer
    #[error("storage lock poisoned")]
    Poisoned,

    /// A stored value did not decode into a valid record
    #[error("corrupt record under key '{key}': {reason}")]
    CorruptRecord { key: String, reason: String },

    /// Conditional updates kept losing to concurrent writers
    #[error("too much contention on key '{key}' after {attempts} attempts")]
    Contention { key: String, attempts: usize },

    /// The store could not be reached or refused the operation
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Result of a [`KeyValueStore::compare_and_swap`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The stored value matched and was replaced
    Swapped,
    /// The key exists but holds a different value
    Mismatch,
    /// The key does not exist (deleted or passively expired)
    Missing,
}

/// The storage collaborator used by the paste engine.
///
/// Implementations must be safe to share across threads. Passive expiry is
/// best-effort: a store that ignores [`expire`](KeyValueStore::expire) is
/// still correct, it just never reclaims abandoned records on its own.
pub trait KeyValueStore: Send + Sync {
    /// Fetches the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Bytes>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// A passive expiry already attached to the key is kept.
    fn set(&self, key: &str, value: Bytes) -> Result<(), StorageError>;

    /// Stores `value` only if `key` is not present.
    ///
    /// Returns `true` if the value was inserted.
    fn set_if_absent(&self, key: &str, value: Bytes) -> Result<bool, StorageError>;

    /// Overwrites `key` only if it is present, like Redis `SET XX`.
    ///
    /// Returns `false` without writing if the key is absent. A passive expiry
    /// already attached to the key is kept.
    fn set_if_present(&self, key: &str, value: Bytes) -> Result<bool, StorageError>;

    /// Removes `key`. Returns `true` if something was removed.
    fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// Asks the store to drop `key` on its own after `ttl`.
    ///
    /// Returns `false` if the key does not exist.
    fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StorageError>;

    /// Replaces the value under `key` with `new` only if it currently equals
    /// `expected`. The passive expiry of the key is kept.
    fn compare_and_swap(
        &self,
        key: &str,
        expected: &[u8],
        new: Bytes,
    ) -> Result<CasOutcome, StorageError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Result<Option<Bytes>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Bytes) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn set_if_absent(&self, key: &str, value: Bytes) -> Result<bool, StorageError> {
        (**self).set_if_absent(key, value)
    }

    fn set_if_present(&self, key: &str, value: Bytes) -> Result<bool, StorageError> {
        (**self).set_if_present(key, value)
    }

    fn delete(&self, key: &str) -> Result<bool, StorageError> {
        (**self).delete(key)
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StorageError> {
        (**self).expire(key, ttl)
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: &[u8],
        new: Bytes,
    ) -> Result<CasOutcome, StorageError> {
        (**self).compare_and_swap(key, expected, new)
    }
}
