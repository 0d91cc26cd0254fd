//! Caller-facing request and response shapes.

use crate::paste::error::ValidationError;
use crate::paste::record::PasteRecord;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Input of a create call.
///
/// Limits are signed so that zero and negative values coming from a caller
/// reach validation instead of being silently rejected by a parser.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatePaste {
    pub content: String,
    #[serde(default)]
    pub ttl_seconds: Option<i64>,
    #[serde(default)]
    pub max_views: Option<i64>,
}

/// Limits that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub ttl_seconds: Option<u64>,
    pub max_views: Option<u64>,
}

impl CreatePaste {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ttl_seconds: None,
            max_views: None,
        }
    }

    pub fn with_ttl_seconds(mut self, ttl_seconds: i64) -> Self {
        self.ttl_seconds = Some(ttl_seconds);
        self
    }

    pub fn with_max_views(mut self, max_views: i64) -> Self {
        self.max_views = Some(max_views);
        self
    }

    /// Checks content, then TTL, then max views.
    pub fn validate(&self) -> Result<Limits, ValidationError> {
        if self.content.trim().is_empty() {
            return Err(ValidationError::EmptyContent);
        }

        let ttl_seconds = positive(self.ttl_seconds).ok_or(ValidationError::InvalidTtl)?;
        let max_views = positive(self.max_views).ok_or(ValidationError::InvalidMaxViews)?;

        Ok(Limits {
            ttl_seconds,
            max_views,
        })
    }
}

/// `None` stays `None`; a present value must be >= 1.
fn positive(value: Option<i64>) -> Option<Option<u64>> {
    match value {
        None => Some(None),
        Some(n) if n >= 1 => Some(Some(n as u64)),
        Some(_) => None,
    }
}

/// Output of a create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedPaste {
    pub id: String,
    /// Always `/p/{id}`
    pub canonical_url_path: String,
    /// `canonical_url_path` joined onto the configured base URL
    pub url: String,
}

impl CreatedPaste {
    pub(crate) fn new(id: String, base_url: &str) -> Self {
        let canonical_url_path = format!("/p/{}", id);
        let url = format!("{}{}", base_url.trim_end_matches('/'), canonical_url_path);
        Self {
            id,
            canonical_url_path,
            url,
        }
    }
}

/// What a successful read returns to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicView {
    pub content: String,
    pub remaining_views: Option<u64>,
    #[serde(serialize_with = "iso_millis")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl PublicView {
    /// Builds the view of a record that has just been counted.
    pub fn of(record: &PasteRecord) -> Self {
        Self {
            content: record.content.clone(),
            remaining_views: record.remaining_views(),
            expires_at: record
                .expires_at_ms()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        }
    }
}

/// Renders like JavaScript's `Date.toISOString`: `2024-01-01T00:01:00.000Z`.
fn iso_millis<S: Serializer>(value: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(at) => s.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        None => s.serialize_none(),
    }
}
