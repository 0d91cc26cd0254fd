//! The stored paste record and its liveness rules.

use crate::storage::StorageError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Prefix of every paste key in the collaborator's namespace.
pub const KEY_PREFIX: &str = "paste:";

/// Builds the store key for a paste id.
pub fn record_key(id: &str) -> String {
    format!("{}{}", KEY_PREFIX, id)
}

/// A paste as it lives in the store.
///
/// The wire shape is a JSON object with exactly these fields. Anything else
/// found under a paste key is treated as corruption, not trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PasteRecord {
    pub content: String,
    /// Milliseconds since the Unix epoch
    pub created_at: i64,
    pub ttl_seconds: Option<u64>,
    pub max_views: Option<u64>,
    pub view_count: u64,
}

/// Result of evaluating a record against the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    /// `now >= created_at + ttl_seconds * 1000`
    Expired,
    /// `view_count >= max_views`
    ViewLimitReached,
}

impl PasteRecord {
    /// Creates a fresh, never-viewed record.
    pub fn new(
        content: String,
        created_at: i64,
        ttl_seconds: Option<u64>,
        max_views: Option<u64>,
    ) -> Self {
        Self {
            content,
            created_at,
            ttl_seconds,
            max_views,
            view_count: 0,
        }
    }

    /// Absolute logical expiry in epoch milliseconds, if the record has a TTL.
    pub fn expires_at_ms(&self) -> Option<i64> {
        self.ttl_seconds.map(|ttl| {
            let ttl_ms = i64::try_from(ttl).unwrap_or(i64::MAX).saturating_mul(1000);
            self.created_at.saturating_add(ttl_ms)
        })
    }

    /// Decides whether the record may still be served at `now_ms`.
    ///
    /// TTL is checked first: a record that is both past its TTL and out of
    /// views reports [`Liveness::Expired`].
    pub fn liveness(&self, now_ms: i64) -> Liveness {
        if self.expires_at_ms().is_some_and(|exp| now_ms >= exp) {
            return Liveness::Expired;
        }
        if self.max_views.is_some_and(|max| self.view_count >= max) {
            return Liveness::ViewLimitReached;
        }
        Liveness::Alive
    }

    /// Views left after the reads recorded so far, if the record is view-limited.
    pub fn remaining_views(&self) -> Option<u64> {
        self.max_views
            .map(|max| max.saturating_sub(self.view_count))
    }

    /// Returns a copy with one more recorded view.
    pub fn viewed(&self) -> Self {
        Self {
            view_count: self.view_count.saturating_add(1),
            ..self.clone()
        }
    }

    /// Serializes the record for storage under `key`.
    pub fn encode(&self, key: &str) -> Result<Bytes, StorageError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|e| StorageError::CorruptRecord {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    /// Parses and shape-checks a stored record.
    pub fn decode(key: &str, raw: &[u8]) -> Result<Self, StorageError> {
        let corrupt = |reason: String| StorageError::CorruptRecord {
            key: key.to_string(),
            reason,
        };

        let record: PasteRecord =
            serde_json::from_slice(raw).map_err(|e| corrupt(e.to_string()))?;

        if record.ttl_seconds == Some(0) {
            return Err(corrupt("ttl_seconds must be >= 1".to_string()));
        }
        if record.max_views == Some(0) {
            return Err(corrupt("max_views must be >= 1".to_string()));
        }

        Ok(record)
    }
}
