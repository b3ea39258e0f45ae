//! RESP Protocol Implementation
//!
//! Turns a byte stream into [`RespValue`]s and replies back into bytes. This
//! module knows nothing about commands or storage.
//!
//! ## Modules
//!
//! - `types`: the `RespValue` enum and its serialization
//! - `parser`: incremental parser for buffered input
//!
//! ## Example
//!
//! ```
//! use quillkv::protocol::{parse_message, RespValue};
//! use bytes::Bytes;
//!
//! let data = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
//! let (request, consumed) = parse_message(data).unwrap().unwrap();
//! assert_eq!(consumed, data.len());
//! assert!(matches!(request, RespValue::Array(_)));
//!
//! let reply = RespValue::bulk_string(Bytes::from("quill"));
//! assert_eq!(reply.serialize(), b"$5\r\nquill\r\n");
//! ```

pub mod parser;
pub mod types;

pub use parser::{parse_message, ParseError, ParseResult, RespParser};
pub use types::RespValue;
