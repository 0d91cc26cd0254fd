//! RESP Protocol Implementation
//!
//! flashpaste speaks the Redis Serialization Protocol so that any Redis
//! client (or `redis-cli`) can create and read pastes.
//!
//! ## Modules
//!
//! - `types`: the [`RespValue`] replies and their wire encoding
//! - `parser`: [`RequestParser`] for incoming commands
//!
//! ## Example
//!
//! ```
//! use flashpaste::protocol::{RequestParser, RespValue};
//!
//! let (args, consumed) = RequestParser::new()
//!     .parse(b"*1\r\n$4\r\nPING\r\n")
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(args.len(), 1);
//! assert_eq!(consumed, 14);
//!
//! assert_eq!(RespValue::pong().to_bytes(), &b"+PONG\r\n"[..]);
//! ```

pub mod parser;
pub mod types;

pub use parser::{ParseError, ParseResult, RequestParser, MAX_BULK_SIZE};
pub use types::RespValue;
