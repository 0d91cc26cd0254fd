//! RESP Request Parser
//!
//! Clients send commands either as an array of bulk strings (what every Redis
//! client library emits) or as a single inline line (what a human types into
//! `telnet` or `nc`):
//!
//! ```text
//! *2\r\n$9\r\nPASTE.GET\r\n$10\r\nV1StGXR8_Z\r\n
//! PASTE.GET V1StGXR8_Z\r\n
//! ```
//!
//! The parser works on a borrowed buffer and returns:
//! - `Ok(Some((args, consumed)))` - a complete command, `consumed` bytes used
//! - `Ok(None)` - the command is incomplete, read more data
//! - `Err(ParseError)` - the client is not speaking RESP; drop the connection
//!
//! Bulk arguments are copied once into `Bytes` so they can outlive the
//! connection buffer.

use crate::protocol::types::{prefix, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur while parsing a request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid length prefix: {0}")]
    InvalidLength(String),

    #[error("expected bulk string, got byte {0:#04x}")]
    ExpectedBulkString(u8),

    #[error("too many arguments: {count} (max: {max})")]
    TooManyArguments { count: usize, max: usize },

    #[error("argument too large: {size} bytes (max: {max})")]
    ArgumentTooLarge { size: usize, max: usize },

    #[error("invalid UTF-8 in inline command")]
    InvalidUtf8,

    #[error("protocol error: {0}")]
    ProtocolError(String),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Largest accepted bulk argument. Bounds the size of a single paste.
pub const MAX_BULK_SIZE: usize = 1024 * 1024;

/// Most arguments a command may carry.
pub const MAX_ARGS: usize = 64;

/// Parser for client requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestParser;

impl RequestParser {
    pub fn new() -> Self {
        Self
    }

    /// Attempts to parse one command from the start of `buf`.
    pub fn parse(&self, buf: &[u8]) -> ParseResult<Option<(Vec<Bytes>, usize)>> {
        match buf.first() {
            None => Ok(None),
            Some(&prefix::ARRAY) => parse_multibulk(buf),
            Some(_) => parse_inline(buf),
        }
    }
}

/// `*<count>\r\n` followed by `count` bulk strings.
fn parse_multibulk(buf: &[u8]) -> ParseResult<Option<(Vec<Bytes>, usize)>> {
    let Some((count, mut pos)) = read_length(buf, 1)? else {
        return Ok(None);
    };

    let count = usize::try_from(count).map_err(|_| ParseError::InvalidLength(count.to_string()))?;
    if count > MAX_ARGS {
        return Err(ParseError::TooManyArguments {
            count,
            max: MAX_ARGS,
        });
    }

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        match buf.get(pos) {
            None => return Ok(None),
            Some(&prefix::BULK_STRING) => {}
            Some(&other) => return Err(ParseError::ExpectedBulkString(other)),
        }

        let Some((len, data_start)) = read_length(buf, pos + 1)? else {
            return Ok(None);
        };
        let len = usize::try_from(len).map_err(|_| ParseError::InvalidLength(len.to_string()))?;
        if len > MAX_BULK_SIZE {
            return Err(ParseError::ArgumentTooLarge {
                size: len,
                max: MAX_BULK_SIZE,
            });
        }

        let data_end = data_start + len;
        if buf.len() < data_end + CRLF.len() {
            return Ok(None);
        }
        if &buf[data_end..data_end + CRLF.len()] != CRLF {
            return Err(ParseError::ProtocolError(
                "bulk string missing trailing CRLF".to_string(),
            ));
        }

        args.push(Bytes::copy_from_slice(&buf[data_start..data_end]));
        pos = data_end + CRLF.len();
    }

    Ok(Some((args, pos)))
}

/// A whitespace-separated line terminated by CRLF.
fn parse_inline(buf: &[u8]) -> ParseResult<Option<(Vec<Bytes>, usize)>> {
    let Some(end) = find_crlf(buf, 0) else {
        if buf.len() > MAX_BULK_SIZE {
            return Err(ParseError::ArgumentTooLarge {
                size: buf.len(),
                max: MAX_BULK_SIZE,
            });
        }
        return Ok(None);
    };

    let line = std::str::from_utf8(&buf[..end]).map_err(|_| ParseError::InvalidUtf8)?;
    let args: Vec<Bytes> = line
        .split_whitespace()
        .map(|word| Bytes::copy_from_slice(word.as_bytes()))
        .collect();

    if args.is_empty() {
        return Err(ParseError::ProtocolError("empty inline command".to_string()));
    }
    if args.len() > MAX_ARGS {
        return Err(ParseError::TooManyArguments {
            count: args.len(),
            max: MAX_ARGS,
        });
    }

    Ok(Some((args, end + CRLF.len())))
}

/// Reads the decimal number between `start` and the next CRLF.
///
/// Returns the number and the position just past the CRLF.
fn read_length(buf: &[u8], start: usize) -> ParseResult<Option<(i64, usize)>> {
    let Some(end) = find_crlf(buf, start) else {
        return Ok(None);
    };

    let digits = &buf[start..end];
    let n = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| ParseError::InvalidLength(String::from_utf8_lossy(digits).into_owned()))?;

    Ok(Some((n, end + CRLF.len())))
}

/// Position of the next `\r\n` at or after `from`.
#[inline]
fn find_crlf(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(2)
        .position(|w| w == CRLF)
        .map(|i| from + i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &[u8]) -> ParseResult<Option<(Vec<Bytes>, usize)>> {
        RequestParser::new().parse(input)
    }

    fn args(list: &[&str]) -> Vec<Bytes> {
        list.iter().map(|s| Bytes::copy_from_slice(s.as_bytes())).collect()
    }

    #[test]
    fn test_parse_multibulk() {
        let input = b"*2\r\n$9\r\nPASTE.GET\r\n$10\r\nV1StGXR8_Z\r\n";
        let (parsed, consumed) = parse(input).unwrap().unwrap();
        assert_eq!(parsed, args(&["PASTE.GET", "V1StGXR8_Z"]));
        assert_eq!(consumed, input.len());
    }

    #[test]
    fn test_parse_multibulk_keeps_newlines_in_content() {
        let input = b"*2\r\n$12\r\nPASTE.CREATE\r\n$7\r\nl1\r\nl2 \r\n";
        let (parsed, _) = parse(input).unwrap().unwrap();
        assert_eq!(parsed[1], Bytes::from_static(b"l1\r\nl2 "));
    }

    #[test]
    fn test_parse_incomplete() {
        let full = b"*2\r\n$9\r\nPASTE.GET\r\n$10\r\nV1StGXR8_Z\r\n";
        for cut in 0..full.len() {
            assert_eq!(parse(&full[..cut]).unwrap(), None, "cut at {}", cut);
        }
    }

    #[test]
    fn test_parse_pipelined_consumes_one_command() {
        let input = b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPING\r\n";
        let (_, consumed) = parse(input).unwrap().unwrap();
        assert_eq!(consumed, input.len() / 2);
    }

    #[test]
    fn test_parse_inline() {
        let (parsed, consumed) = parse(b"PASTE.GET  abc\r\n").unwrap().unwrap();
        assert_eq!(parsed, args(&["PASTE.GET", "abc"]));
        assert_eq!(consumed, 16);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            parse(b"*1\r\n:1\r\n"),
            Err(ParseError::ExpectedBulkString(b':'))
        );
        assert!(matches!(parse(b"*x\r\n"), Err(ParseError::InvalidLength(_))));
        assert!(matches!(parse(b"*-1\r\n"), Err(ParseError::InvalidLength(_))));
        assert!(matches!(
            parse(b"*1\r\n$3\r\nabcd\r\n"),
            Err(ParseError::ProtocolError(_))
        ));
        assert!(matches!(parse(b"   \r\n"), Err(ParseError::ProtocolError(_))));
    }

    #[test]
    fn test_parse_limits() {
        let too_many = format!("*{}\r\n", MAX_ARGS + 1);
        assert!(matches!(
            parse(too_many.as_bytes()),
            Err(ParseError::TooManyArguments { .. })
        ));

        let too_big = format!("*1\r\n${}\r\n", MAX_BULK_SIZE + 1);
        assert!(matches!(
            parse(too_big.as_bytes()),
            Err(ParseError::ArgumentTooLarge { .. })
        ));
    }
}
