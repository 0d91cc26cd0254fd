//! RESP Reply Types
//!
//! Replies the server writes back to clients. Every reply starts with a type
//! prefix byte and ends with CRLF:
//!
//! ```text
//! +OK\r\n                       simple string
//! -NOTFOUND paste not found\r\n error
//! $5\r\nhello\r\n               bulk string
//! *2\r\n...                     array
//! ```

use bytes::{BufMut, Bytes, BytesMut};

/// The CRLF terminator used in RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// RESP protocol type prefixes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// A reply sent to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// `+<string>\r\n`; must not contain CR or LF
    SimpleString(String),
    /// `-<CODE> <message>\r\n`
    Error(String),
    /// `$<length>\r\n<data>\r\n`
    BulkString(Bytes),
    /// `*<count>\r\n<elements...>`
    Array(Vec<RespValue>),
}

impl RespValue {
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    /// Creates an error reply. The first word is the error code by convention.
    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(data.into())
    }

    pub fn array(values: Vec<RespValue>) -> Self {
        RespValue::Array(values)
    }

    pub fn ok() -> Self {
        RespValue::simple_string("OK")
    }

    pub fn pong() -> Self {
        RespValue::simple_string("PONG")
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// Appends the wire form of this reply to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            RespValue::SimpleString(s) => put_line(dst, prefix::SIMPLE_STRING, s.as_bytes()),
            RespValue::Error(s) => put_line(dst, prefix::ERROR, s.as_bytes()),
            RespValue::BulkString(data) => {
                put_line(dst, prefix::BULK_STRING, data.len().to_string().as_bytes());
                dst.put_slice(data);
                dst.put_slice(CRLF);
            }
            RespValue::Array(values) => {
                put_line(dst, prefix::ARRAY, values.len().to_string().as_bytes());
                for value in values {
                    value.encode(dst);
                }
            }
        }
    }

    /// Returns the wire form of this reply.
    pub fn to_bytes(&self) -> Bytes {
        let mut dst = BytesMut::new();
        self.encode(&mut dst);
        dst.freeze()
    }
}

fn put_line(dst: &mut BytesMut, prefix: u8, body: &[u8]) {
    dst.reserve(body.len() + 3);
    dst.put_u8(prefix);
    dst.put_slice(body);
    dst.put_slice(CRLF);
}
