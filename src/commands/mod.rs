//! Command Handler Module
//!
//! Receives parsed requests, executes them against the selected database
//! and returns the reply.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  RESP Parser    │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Dispatch     │
//! │  - Validate     │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   Databases     │  (storage module)
//! └─────────────────┘
//! ```

pub mod handler;

pub use handler::{is_quit, CommandHandler};
