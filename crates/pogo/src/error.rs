//! Error types for Pogo
//!
//! Errors are grouped by how the pipeline reacts to them: parse errors only
//! fail one file, everything else aborts the current run and relies on the
//! next scheduled run to pick up where this one stopped.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Pogo operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for every Pogo operation
#[derive(Error, Debug)]
pub enum Error {
    /// A setting is missing or has an unusable value
    #[error("Configuration error: {0}. Check pogo.cfg or the POGO_* environment variables.")]
    Config(String),

    /// The configuration files could not be read or merged
    #[error("Failed to load configuration: {0}")]
    ConfigSource(#[from] config::ConfigError),

    /// A local store transaction failed and was rolled back
    #[error("Local store error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// The index server could not be reached or answered with an error status
    #[error("Index request failed: {0}. Check the [elasticsearch] settings and that the server is up.")]
    Http(#[from] reqwest::Error),

    /// The index server answered, but not with what was expected
    #[error("Index error: {0}")]
    Index(String),

    /// An artifact file could not be turned into records
    #[error("Failed to parse '{path}': {reason}")]
    Parse { path: PathBuf, reason: String },

    /// A configured source directory does not exist
    #[error("Source directory '{0}' is not a directory")]
    NotADirectory(PathBuf),

    /// Durable state disagrees with what was just written
    #[error("Inconsistent state: {0}")]
    Inconsistent(String),

    /// Building an archive of scraped files failed
    #[error("Archive error: {0}")]
    Archive(String),

    /// GeoIP database could not be opened
    #[error("GeoIP database error: {0}")]
    Geo(#[from] maxminddb::MaxMindDBError),

    /// File system operation failed
    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed
    #[error("Failed to handle JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Error raised by the shared utilities
    #[error(transparent)]
    Common(#[from] pogo_common::PogoError),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an index protocol error
    pub fn index(msg: impl Into<String>) -> Self {
        Self::Index(msg.into())
    }

    /// Create a parse error for one file
    pub fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an inconsistent state error
    pub fn inconsistent(msg: impl Into<String>) -> Self {
        Self::Inconsistent(msg.into())
    }

    /// Create an archive error
    pub fn archive(msg: impl Into<String>) -> Self {
        Self::Archive(msg.into())
    }

    /// Whether the error only affects the file being parsed
    pub fn is_file_level(&self) -> bool {
        matches!(self, Error::Parse { .. })
    }
}
