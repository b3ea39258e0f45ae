//! RESP value type and its wire encoding.
//!
//! Every unit on the wire starts with a one-byte marker and ends with CRLF:
//!
//! | Marker | Kind          | Example                        |
//! |--------|---------------|--------------------------------|
//! | `+`    | Status        | `+OK\r\n`                      |
//! | `-`    | Error         | `-ERR unknown command\r\n`     |
//! | `:`    | Integer       | `:1000\r\n`                    |
//! | `$`    | Bulk string   | `$5\r\nhello\r\n`              |
//! | `$-1`  | Null          | `$-1\r\n`                      |
//! | `*`    | Array         | `*1\r\n$4\r\nPING\r\n`         |
//!
//! An empty bulk string (`$0\r\n\r\n`) is a value in its own right and is
//! never collapsed into `Null`.

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator used in RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// RESP marker bytes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// One decoded or to-be-encoded protocol unit.
///
/// Requests from clients are always `Array`s of `BulkString`s; replies may
/// be any variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// Short status line such as `OK` or `PONG`. Cannot contain CRLF.
    SimpleString(String),

    /// Error line, conventionally prefixed with an error code like `ERR`.
    Error(String),

    /// Signed 64-bit integer.
    Integer(i64),

    /// Binary-safe string with an explicit length. May be empty.
    BulkString(Bytes),

    /// The absent value, encoded as the null bulk string `$-1\r\n`.
    Null,

    /// Ordered sequence of values.
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Creates a status reply.
    ///
    /// # Example
    /// ```
    /// use quillkv::protocol::types::RespValue;
    /// assert_eq!(RespValue::simple_string("OK").serialize(), b"+OK\r\n");
    /// ```
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    /// Creates an error reply.
    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    pub fn integer(n: i64) -> Self {
        RespValue::Integer(n)
    }

    /// Creates a bulk string reply.
    ///
    /// # Example
    /// ```
    /// use quillkv::protocol::types::RespValue;
    /// use bytes::Bytes;
    /// let bulk = RespValue::bulk_string(Bytes::from("hello"));
    /// assert_eq!(bulk.serialize(), b"$5\r\nhello\r\n");
    /// ```
    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(data.into())
    }

    pub fn null() -> Self {
        RespValue::Null
    }

    pub fn array(values: Vec<RespValue>) -> Self {
        RespValue::Array(values)
    }

    /// Maps a possibly-absent stored value to a bulk string or `Null`.
    ///
    /// `Some(b"")` stays an empty bulk string.
    pub fn from_optional(value: Option<Bytes>) -> Self {
        match value {
            Some(data) => RespValue::BulkString(data),
            None => RespValue::Null,
        }
    }

    /// `+OK`
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    /// `+PONG`
    pub fn pong() -> Self {
        RespValue::SimpleString("PONG".to_string())
    }

    /// The standard arity error for `command`.
    pub fn wrong_arity(command: &str) -> Self {
        RespValue::Error(format!(
            "ERR wrong number of arguments for '{}' command",
            command.to_lowercase()
        ))
    }

    /// Encodes the value into a fresh buffer.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Encodes the value onto the end of `buf`.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            RespValue::SimpleString(s) => write_text_line(buf, prefix::SIMPLE_STRING, s),
            RespValue::Error(s) => write_text_line(buf, prefix::ERROR, s),
            RespValue::Integer(n) => write_line(buf, prefix::INTEGER, n.to_string().as_bytes()),
            RespValue::BulkString(data) => {
                write_line(buf, prefix::BULK_STRING, data.len().to_string().as_bytes());
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            RespValue::Null => write_line(buf, prefix::BULK_STRING, b"-1"),
            RespValue::Array(values) => {
                write_line(buf, prefix::ARRAY, values.len().to_string().as_bytes());
                for value in values {
                    value.serialize_into(buf);
                }
            }
        }
    }

    /// Attempts to extract the inner bytes from BulkString.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RespValue::BulkString(b) => Some(b),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }
}

/// Status and error lines cannot carry CR or LF; they become spaces.
fn write_text_line(buf: &mut Vec<u8>, marker: u8, text: &str) {
    if text.contains(['\r', '\n']) {
        write_line(buf, marker, text.replace(['\r', '\n'], " ").as_bytes());
    } else {
        write_line(buf, marker, text.as_bytes());
    }
}

#[inline]
fn write_line(buf: &mut Vec<u8>, marker: u8, body: &[u8]) {
    buf.push(marker);
    buf.extend_from_slice(body);
    buf.extend_from_slice(CRLF);
}

impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(s) => write!(f, "{}", s),
            RespValue::Error(s) => write!(f, "(error) {}", s),
            RespValue::Integer(n) => write!(f, "(integer) {}", n),
            RespValue::BulkString(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "\"{}\"", s),
                Err(_) => write!(f, "(binary, {} bytes)", data.len()),
            },
            RespValue::Null => write!(f, "(nil)"),
            RespValue::Array(values) if values.is_empty() => write!(f, "(empty array)"),
            RespValue::Array(values) => {
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {}", i + 1, v)?;
                }
                Ok(())
            }
        }
    }
}
