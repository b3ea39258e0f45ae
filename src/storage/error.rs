//! Storage-layer error types.

use std::io;
use thiserror::Error;

/// Failures of value-level operations on a keyspace.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum KeyspaceError {
    /// The stored value is not a base-10 signed 64-bit integer
    #[error("value is not an integer or out of range")]
    NotAnInteger,

    /// The result does not fit in a signed 64-bit integer
    #[error("increment or decrement would overflow")]
    Overflow,
}

/// Failures while writing or reading a snapshot file.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("snapshot encoding failed: {0}")]
    Encoding(#[from] bincode::Error),

    /// A user-supplied name that is not a single plain file name
    #[error("invalid snapshot file name")]
    InvalidFileName,

    #[error("unsupported snapshot version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
}
