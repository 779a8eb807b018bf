//! Pogo Common Library
//!
//! Shared types and utilities for the Pogo honeypot forwarder.
//!
//! # Overview
//!
//! - **Error Handling**: The [`PogoError`] type and [`Result`] alias
//! - **Logging**: `tracing` subscriber setup driven by the `[logging]` settings
//! - **Time**: Normalization of honeypot timestamps to UTC
//!
//! # Example
//!
//! ```no_run
//! use chrono::Local;
//! use pogo_common::time::UtcTimestamp;
//!
//! fn main() -> pogo_common::Result<()> {
//!     let ts = UtcTimestamp::from_local_str("2015-01-13 20:22:00", &Local)?;
//!     println!("stored as {}", ts);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;
pub mod time;

// Re-export commonly used types
pub use error::{PogoError, Result};
pub use time::UtcTimestamp;
