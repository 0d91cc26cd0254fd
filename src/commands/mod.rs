//! Command Dispatch
//!
//! Sits between the wire protocol and the paste engine:
//!
//! ```text
//! RequestParser ──args──> CommandHandler ──> PasteEngine ──> KeyValueStore
//!                              │
//!                              └──RespValue──> client
//! ```
//!
//! The handler owns no state beyond a shared engine handle, so one instance
//! is cloned into every connection task.

pub mod handler;

pub use handler::{command_name, CommandHandler, SharedEngine};
