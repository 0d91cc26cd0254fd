//! Client Connections
//!
//! Every accepted TCP connection runs in its own Tokio task:
//!
//! ```text
//! TcpListener (main.rs)
//!       │ accept()
//!       ▼
//! tokio::spawn(handle_connection)
//!       │
//!       ▼
//! ┌──────────────────────────────────────────────────┐
//! │ ConnectionHandler                                │
//! │   read ─> RequestParser ─> CommandHandler ─> write│
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! Pipelined requests are answered in order, and a malformed request gets an
//! `-ERR` reply before the connection is closed.

pub mod handler;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
