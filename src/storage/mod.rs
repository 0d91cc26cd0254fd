//! Storage Module
//!
//! The paste engine stores its records in a key-value collaborator. This
//! module defines that contract and ships an in-process implementation.
//!
//! ## Architecture
//!
//! ```text
//!              ┌───────────────────────────┐
//!              │       PasteEngine         │
//!              └─────────────┬─────────────┘
//!                            │ KeyValueStore
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       MemoryStore                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...64    │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │
//!              ┌─────────────┴─────────────┐
//!              │     ExpirySweeper         │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! - [`kv`]: the [`KeyValueStore`] trait and [`StorageError`]
//! - [`memory`]: [`MemoryStore`], sharded with passive per-key expiry
//! - [`expiry`]: the background sweeper reclaiming abandoned keys

pub mod expiry;
pub mod kv;
pub mod memory;

pub use expiry::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper};
pub use kv::{CasOutcome, KeyValueStore, StorageError};
pub use memory::{Entry, MemoryInfo, MemoryStore, StorageStats};
