//! Paste Lifecycle Module
//!
//! Everything that gives a paste its meaning lives here: the record shape,
//! its liveness rules, id generation, and the engine that applies them on
//! every create and read.
//!
//! ## Record Lifecycle
//!
//! ```text
//!            create
//!              │
//!              ▼
//!         ┌─────────┐  read (view_count + 1)
//!         │  Alive  │◄──────────────┐
//!         └────┬────┘───────────────┘
//!              │
//!   ┌──────────┼──────────────┬──────────────────┐
//!   ▼          ▼              ▼                  │
//! Dead(TTL)  Dead(ViewLimit)  Dead(PassiveExpiry)│
//!                                                │
//!        (dead is absorbing: nothing returns to Alive)
//! ```
//!
//! ## Modules
//!
//! - `api`: caller-facing request and response types
//! - `config`: [`EngineConfig`] and [`ViewCounting`]
//! - `engine`: [`PasteEngine`]
//! - `error`: [`PasteError`], [`ValidationError`], [`ErrorClass`]
//! - `id`: id generation
//! - `record`: [`PasteRecord`] and liveness evaluation

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod id;
pub mod record;

pub use api::{CreatePaste, CreatedPaste, Limits, PublicView};
pub use config::{EngineConfig, ViewCounting, DEFAULT_BASE_URL};
pub use engine::{EngineStats, PasteEngine};
pub use error::{ErrorClass, PasteError, ValidationError};
pub use id::{generate_id, is_valid_id, ID_LEN};
pub use record::{record_key, Liveness, PasteRecord};
