//! # QuillKV - An In-Memory Key-Value Server
//!
//! QuillKV stores binary-safe string values in sixteen independent
//! databases and speaks the Redis serialization protocol (RESP), so any
//! Redis client can talk to it.
//!
//! ## Features
//!
//! - **RESP**: incremental parser with pipelining support
//! - **Sixteen databases**: selected server-wide with `SELECT`
//! - **Expiry**: per-key timeouts, purged lazily on access and actively by
//!   a background sweeper
//! - **Snapshots**: `SAVE` / `LOAD` one database to and from disk
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              QuillKV                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                                               ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐    │
//! │  │   RESP      │    │                 Databases                    │    │
//! │  │   Parser    │    │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │    │
//! │  │             │    │  │ db 0   │ │ db 1   │ │ db 2   │ │ ...15  │ │    │
//! │  └─────────────┘    │  │RwLock  │ │RwLock  │ │RwLock  │ │        │ │    │
//! │                     │  └────────┘ └────────┘ └────────┘ └────────┘ │    │
//! │                     └──────────────────────────────────────────────┘    │
//! │                                               ▲                         │
//! │                     ┌─────────────────────────┴───────────────────────┐ │
//! │                     │   ExpirySweeper (selected database only)        │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use quillkv::commands::CommandHandler;
//! use quillkv::connection::{handle_connection, ConnectionStats};
//! use quillkv::storage::{Databases, DatabasesConfig};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let databases = Arc::new(Databases::new(DatabasesConfig::default()));
//!     databases.start_sweeper();
//!
//!     let handler = CommandHandler::new(Arc::clone(&databases));
//!     let stats = Arc::new(ConnectionStats::new());
//!     let listener = TcpListener::bind("127.0.0.1:6379").await?;
//!
//!     loop {
//!         let (stream, addr) = listener.accept().await?;
//!         tokio::spawn(handle_connection(stream, addr, handler.clone(), Arc::clone(&stats)));
//!     }
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP parser and reply types
//! - [`storage`]: keyspaces, expiry sweeper, snapshots, database registry
//! - [`commands`]: command dispatch and validation
//! - [`connection`]: per-client read/execute/write loop
//! - [`config`]: command-line and environment configuration
//!
//! ## Lazy + Active Expiry
//!
//! A key whose deadline has passed is invisible to every command at once.
//! Writers remove it when they touch it; the sweeper removes the rest of
//! the selected database on a fixed interval.

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod storage;

pub use commands::CommandHandler;
pub use config::Config;
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{ParseError, RespParser, RespValue};
pub use storage::{Databases, DatabasesConfig, ExpiryConfig, ExpirySweeper, Keyspace};

/// The default port QuillKV listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host QuillKV binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of QuillKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
