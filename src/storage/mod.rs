//! Storage Module
//!
//! Sixteen independent keyspaces with per-key expiry, a background sweeper
//! for the selected one, and on-disk snapshots.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Databases                            │
//! │   selected index ──┐                                        │
//! │  ┌──────┐ ┌──────┐ ▼──────┐ ┌──────┐         ┌──────┐       │
//! │  │ db 0 │ │ db 1 │ │ db 2 │ │ db 3 │   ...   │ db15 │       │
//! │  │RwLock│ │RwLock│ │RwLock│ │RwLock│         │RwLock│       │
//! │  └──────┘ └──────┘ └──────┘ └──────┘         └──────┘       │
//! └─────────────────────────────────────────────────────────────┘
//!                          ▲
//!                          │
//!              ┌───────────┴───────────┐
//!              │     ExpirySweeper     │
//!              │ (Background Tokio Task)│
//!              └───────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use quillkv::storage::{Databases, DatabasesConfig, Ttl};
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! let dbs = Databases::new(DatabasesConfig::default());
//! let db = dbs.selected();
//!
//! db.set(Bytes::from("name"), Bytes::from("quill"));
//! assert_eq!(db.get(b"name"), Some(Bytes::from("quill")));
//!
//! db.expire(b"name", Duration::from_secs(3600));
//! assert!(matches!(db.ttl(b"name"), Ttl::Remaining(_)));
//! ```

pub mod databases;
pub mod error;
pub mod expiry;
pub mod keyspace;
pub mod pattern;
pub mod snapshot;

pub use databases::{Databases, DatabasesConfig, DATABASE_COUNT};
pub use error::{KeyspaceError, PersistError};
pub use expiry::{ExpiryConfig, ExpirySweeper};
pub use keyspace::{Keyspace, Ttl, MAX_TTL};
pub use pattern::GlobPattern;
