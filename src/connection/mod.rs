//! Connection Handler Module
//!
//! Each client connection is handled by its own async task.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (main.rs)                                │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept()
//!                        ▼
//!           ┌────────────────────────┐
//!           │   For each client...   │
//!           └────────────┬───────────┘
//!                        │
//!                        │ spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read bytes  │───>│ Parse RESP  │───>│ Execute cmd │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      ┌─────────────┐        │
//! │                                      │ Send resp   │        │
//! │                                      └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Pipelining**: every complete request in a read is executed and the
//!   replies go out with one flush
//! - **Framing errors close the connection** after a `-ERR Protocol error`
//!   reply; command errors do not
//! - **Statistics**: connection and command counters
//!
//! ## Example
//!
//! ```no_run
//! use quillkv::commands::CommandHandler;
//! use quillkv::connection::{handle_connection, ConnectionStats};
//! use quillkv::storage::{Databases, DatabasesConfig};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! # async fn serve() -> std::io::Result<()> {
//! let databases = Arc::new(Databases::new(DatabasesConfig::default()));
//! let stats = Arc::new(ConnectionStats::new());
//! let handler = CommandHandler::new(databases);
//!
//! let listener = TcpListener::bind("127.0.0.1:6379").await?;
//! loop {
//!     let (stream, addr) = listener.accept().await?;
//!     tokio::spawn(handle_connection(stream, addr, handler.clone(), Arc::clone(&stats)));
//! }
//! # }
//! ```

pub mod handler;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
