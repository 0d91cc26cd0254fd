//! Paste engine errors.

use crate::storage::StorageError;
use thiserror::Error;

/// Bad create input. Raised before anything touches the store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("content is required and must be a non-empty string")]
    EmptyContent,

    #[error("ttl_seconds must be an integer >= 1")]
    InvalidTtl,

    #[error("max_views must be an integer >= 1")]
    InvalidMaxViews,
}

/// Errors returned by [`PasteEngine`](super::PasteEngine).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasteError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("paste not found")]
    NotFound,

    #[error("paste has expired")]
    Expired,

    #[error("view limit exceeded")]
    ViewLimitExceeded,

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// How a caller-facing adapter should treat a [`PasteError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request itself is wrong; nothing was written
    Invalid,
    /// The paste is missing, expired or used up. Terminal for this id.
    Unavailable,
    /// The store failed; the same request may succeed later
    Transient,
}

impl PasteError {
    /// Collapses the error into the outcome a caller is allowed to see.
    ///
    /// Expired and used-up pastes are indistinguishable from missing ones.
    pub fn class(&self) -> ErrorClass {
        match self {
            PasteError::Validation(_) => ErrorClass::Invalid,
            PasteError::NotFound | PasteError::Expired | PasteError::ViewLimitExceeded => {
                ErrorClass::Unavailable
            }
            PasteError::Storage(_) => ErrorClass::Transient,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}
