//! Incremental RESP parser.
//!
//! The parser works on whatever bytes the connection has buffered so far and
//! returns one of:
//!
//! - `Ok(Some((value, consumed)))`: one complete unit occupying the first
//!   `consumed` bytes of the buffer
//! - `Ok(None)`: the buffer holds only a prefix of a unit, read more and retry
//! - `Err(ParseError)`: the bytes can never form a valid unit
//!
//! Nothing is consumed on `Ok(None)` or `Err`, so a partial read costs only a
//! re-scan of the buffered prefix once more data arrives.

use crate::protocol::types::{prefix, RespValue, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur during RESP parsing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Marker byte is not one of `+ - : $ *`
    #[error("unknown data type marker: {0:#04x}")]
    UnknownPrefix(u8),

    /// A length, count or integer line is not a base-10 number
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Invalid UTF-8 in a status or error line
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Bulk string length is negative (but not -1 for null)
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// Array count is negative (but not -1 for null)
    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    /// Framing violation (missing CRLF, too deep, ...)
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// The declared bulk length exceeds [`MAX_BULK_SIZE`]
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum array nesting depth (prevent stack overflow)
pub const MAX_NESTING_DEPTH: usize = 32;

/// An incremental RESP parser.
///
/// # Example
///
/// ```
/// use quillkv::protocol::{RespParser, RespValue};
/// use bytes::Bytes;
///
/// let mut parser = RespParser::new();
/// let buf = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
///
/// let (value, consumed) = parser.parse(buf).unwrap().unwrap();
/// assert_eq!(consumed, buf.len());
/// assert_eq!(
///     value,
///     RespValue::Array(vec![
///         RespValue::BulkString(Bytes::from("GET")),
///         RespValue::BulkString(Bytes::from("name")),
///     ])
/// );
/// ```
#[derive(Debug, Default)]
pub struct RespParser {
    depth: usize,
}

impl RespParser {
    pub fn new() -> Self {
        Self { depth: 0 }
    }

    /// Attempts to parse one RESP value from the front of `buf`.
    pub fn parse(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        self.depth = 0;
        self.parse_value(buf)
    }

    fn parse_value(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        let Some(&marker) = buf.first() else {
            return Ok(None);
        };

        if self.depth > MAX_NESTING_DEPTH {
            return Err(ParseError::ProtocolError(format!(
                "maximum nesting depth exceeded: {}",
                MAX_NESTING_DEPTH
            )));
        }

        match marker {
            prefix::SIMPLE_STRING => Ok(parse_text_line(buf)?
                .map(|(s, consumed)| (RespValue::SimpleString(s), consumed))),
            prefix::ERROR => {
                Ok(parse_text_line(buf)?.map(|(s, consumed)| (RespValue::Error(s), consumed)))
            }
            prefix::INTEGER => {
                Ok(parse_number_line(buf)?.map(|(n, consumed)| (RespValue::Integer(n), consumed)))
            }
            prefix::BULK_STRING => self.parse_bulk_string(buf),
            prefix::ARRAY => self.parse_array(buf),
            other => Err(ParseError::UnknownPrefix(other)),
        }
    }

    /// `$<length>\r\n<data>\r\n`
    fn parse_bulk_string(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        let Some((length, header_len)) = parse_number_line(buf)? else {
            return Ok(None);
        };

        if length == -1 {
            return Ok(Some((RespValue::Null, header_len)));
        }
        if length < 0 {
            return Err(ParseError::InvalidBulkLength(length));
        }

        let length = length as usize;
        if length > MAX_BULK_SIZE {
            return Err(ParseError::MessageTooLarge {
                size: length,
                max: MAX_BULK_SIZE,
            });
        }

        let total_needed = header_len + length + CRLF.len();
        if buf.len() < total_needed {
            return Ok(None);
        }

        if &buf[header_len + length..total_needed] != CRLF {
            return Err(ParseError::ProtocolError(
                "bulk string missing trailing CRLF".to_string(),
            ));
        }

        let data = Bytes::copy_from_slice(&buf[header_len..header_len + length]);
        Ok(Some((RespValue::BulkString(data), total_needed)))
    }

    /// `*<count>\r\n<elements...>`
    fn parse_array(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        let Some((count, header_len)) = parse_number_line(buf)? else {
            return Ok(None);
        };

        if count == -1 {
            return Ok(Some((RespValue::Null, header_len)));
        }
        if count < 0 {
            return Err(ParseError::InvalidArrayLength(count));
        }

        let count = count as usize;
        // A hostile count must not pre-allocate more than the buffer could hold.
        let mut elements = Vec::with_capacity(count.min(buf.len()));
        let mut consumed = header_len;

        self.depth += 1;
        for _ in 0..count {
            match self.parse_value(&buf[consumed..])? {
                Some((value, element_len)) => {
                    elements.push(value);
                    consumed += element_len;
                }
                None => {
                    self.depth -= 1;
                    return Ok(None);
                }
            }
        }
        self.depth -= 1;

        Ok(Some((RespValue::Array(elements), consumed)))
    }
}

/// Reads the line after the marker byte as UTF-8 text.
fn parse_text_line(buf: &[u8]) -> ParseResult<Option<(String, usize)>> {
    let Some(pos) = find_crlf(&buf[1..]) else {
        return Ok(None);
    };
    let s = std::str::from_utf8(&buf[1..1 + pos])
        .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
    Ok(Some((s.to_string(), 1 + pos + CRLF.len())))
}

/// Reads the line after the marker byte as a signed decimal.
fn parse_number_line(buf: &[u8]) -> ParseResult<Option<(i64, usize)>> {
    let Some(pos) = find_crlf(&buf[1..]) else {
        return Ok(None);
    };
    let raw = &buf[1..1 + pos];
    let n = std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| ParseError::InvalidInteger(String::from_utf8_lossy(raw).into_owned()))?;
    Ok(Some((n, 1 + pos + CRLF.len())))
}

/// Position of the first `\r\n` in `buf`, if any.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

/// Parses a single RESP message from `buf` with a fresh parser.
pub fn parse_message(buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
    RespParser::new().parse(buf)
}
