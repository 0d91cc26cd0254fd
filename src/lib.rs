//! # flashpaste - Self-Expiring Paste Store
//!
//! flashpaste stores text pastes that disappear on their own: after a
//! time-to-live, after a maximum number of views, or both. Pastes are created
//! and read over the RESP protocol, so any Redis client can talk to it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                              flashpaste                              │
//! │                                                                      │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐               │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │               │
//! │  │ (main.rs)   │    │  Handler    │    │  Handler    │               │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘               │
//! │                                               │                      │
//! │                                               ▼                      │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────┐     │
//! │  │   Clock     │───>│ PasteEngine                              │     │
//! │  └─────────────┘    │  validate · id · TTL / view-limit checks │     │
//! │                     └──────────────────┬───────────────────────┘     │
//! │                                        │ KeyValueStore               │
//! │                                        ▼                             │
//! │                     ┌──────────────────────────────────────────┐     │
//! │                     │ MemoryStore (64 RwLock shards)           │     │
//! │                     └──────────────────────────────────────────┘     │
//! │                                        ▲                             │
//! │                     ┌──────────────────┴───────────────────────┐     │
//! │                     │ ExpirySweeper (background Tokio task)    │     │
//! │                     └──────────────────────────────────────────┘     │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use flashpaste::paste::{CreatePaste, EngineConfig, PasteEngine};
//! use flashpaste::storage::MemoryStore;
//! use std::sync::Arc;
//!
//! let engine = PasteEngine::new(Arc::new(MemoryStore::new()), EngineConfig::default());
//!
//! let created = engine
//!     .create(CreatePaste::new("hello").with_max_views(1), None)
//!     .unwrap();
//! assert_eq!(created.canonical_url_path, format!("/p/{}", created.id));
//!
//! let view = engine.read(&created.id, None).unwrap();
//! assert_eq!(view.content, "hello");
//! assert_eq!(view.remaining_views, Some(0));
//!
//! // The single allowed view is spent
//! assert!(engine.read(&created.id, None).is_err());
//! ```
//!
//! ## Module Overview
//!
//! - [`paste`]: records, validation, id generation and the lifecycle engine
//! - [`storage`]: the key-value contract and its sharded in-memory store
//! - [`clock`]: wall-clock abstraction used for expiry decisions
//! - [`protocol`]: RESP request parsing and reply encoding
//! - [`commands`]: RESP command dispatch
//! - [`connection`]: client connection management
//!
//! ## Expiry
//!
//! A paste is dead once `now >= created_at + ttl_seconds * 1000` or once
//! `view_count >= max_views`. Reads check both and delete dead records.
//! Every record also carries a passive deadline in the store (TTL plus a
//! grace period) so that pastes nobody reads again are still reclaimed by the
//! sweeper.

pub mod clock;
pub mod commands;
pub mod connection;
pub mod paste;
pub mod protocol;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use commands::CommandHandler;
pub use connection::{handle_connection, ConnectionStats};
pub use paste::{CreatePaste, CreatedPaste, EngineConfig, PasteEngine, PasteError, PublicView};
pub use storage::{start_expiry_sweeper, KeyValueStore, MemoryStore, StorageError};

/// The default port flashpaste listens on
pub const DEFAULT_PORT: u16 = 6380;

/// The default host flashpaste binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of flashpaste
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
