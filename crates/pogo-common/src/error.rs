//! Error types shared by the Pogo crates

use thiserror::Error;

/// Result type alias for shared Pogo operations
pub type Result<T> = std::result::Result<T, PogoError>;

/// Errors raised by the shared utilities
#[derive(Error, Debug)]
pub enum PogoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("Invalid log setting: {0}")]
    InvalidLogSetting(String),
}

impl PogoError {
    /// Create an invalid timestamp error
    pub fn invalid_timestamp(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTimestamp {
            value: value.into(),
            reason: reason.into(),
        }
    }
}
