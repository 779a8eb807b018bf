//! Records: one decoded unit of honeypot data
//!
//! A record is built once by the parser (or rebuilt from a local store row)
//! and never changes afterwards. Every record carries a UTC timestamp, so a
//! record without a timestamp cannot exist.

use crate::error::{Error, Result};
use crate::kind::ArtifactKind;
use pogo_common::UtcTimestamp;
use serde::Serialize;
use serde_json::{json, Value};

/// One login attempt against the honeypot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub timestamp: UtcTimestamp,
    pub origin_host: String,
    pub source_ip: String,
    pub user: String,
    pub password: String,
    /// Literal flag from the attempt log, `"0"` when the log left it blank
    pub success: String,
    pub country_code: String,
    pub country_name: String,
}

impl AttemptRecord {
    pub fn succeeded(&self) -> bool {
        let flag = self.success.trim();
        !(flag.is_empty() || flag == "0")
    }
}

/// One line of the honeypot's own log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    pub timestamp: UtcTimestamp,
    pub origin_host: String,
    pub server_info: String,
    pub message: String,
}

/// One line of a per-session log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionLogRecord {
    pub timestamp: UtcTimestamp,
    pub origin_host: String,
    pub source_ip: String,
    pub country_code: String,
    pub country_name: String,
    pub channel: String,
    pub message: String,
}

/// A whole session file (recording or download) carried as base64
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionFileRecord {
    pub timestamp: UtcTimestamp,
    pub origin_host: String,
    pub source_ip: String,
    pub country_code: String,
    pub country_name: String,
    pub filename: String,
    pub contents: String,
}

/// A record of any artifact kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Attempt(AttemptRecord),
    LogEntry(LogRecord),
    SessionLogEntry(SessionLogRecord),
    SessionRecording(SessionFileRecord),
    SessionDownloadFile(SessionFileRecord),
}

impl Record {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Record::Attempt(_) => ArtifactKind::Attempt,
            Record::LogEntry(_) => ArtifactKind::Log,
            Record::SessionLogEntry(_) => ArtifactKind::SessionLog,
            Record::SessionRecording(_) => ArtifactKind::SessionRecording,
            Record::SessionDownloadFile(_) => ArtifactKind::SessionDownload,
        }
    }

    pub fn timestamp(&self) -> UtcTimestamp {
        match self {
            Record::Attempt(r) => r.timestamp,
            Record::LogEntry(r) => r.timestamp,
            Record::SessionLogEntry(r) => r.timestamp,
            Record::SessionRecording(r) | Record::SessionDownloadFile(r) => r.timestamp,
        }
    }

    /// Column values in the order of [`ArtifactKind::insert_fields`]
    pub fn insert_values(&self) -> Vec<String> {
        match self {
            Record::Attempt(r) => vec![
                r.timestamp.to_string(),
                r.origin_host.clone(),
                r.source_ip.clone(),
                r.user.clone(),
                r.password.clone(),
                r.success.clone(),
                r.country_code.clone(),
                r.country_name.clone(),
            ],
            Record::LogEntry(r) => vec![
                r.timestamp.to_string(),
                r.origin_host.clone(),
                r.server_info.clone(),
                r.message.clone(),
            ],
            Record::SessionLogEntry(r) => vec![
                r.timestamp.to_string(),
                r.origin_host.clone(),
                r.source_ip.clone(),
                r.country_code.clone(),
                r.country_name.clone(),
                r.channel.clone(),
                r.message.clone(),
            ],
            Record::SessionRecording(r) | Record::SessionDownloadFile(r) => vec![
                r.timestamp.to_string(),
                r.origin_host.clone(),
                r.source_ip.clone(),
                r.country_code.clone(),
                r.country_name.clone(),
                r.filename.clone(),
                r.contents.clone(),
            ],
        }
    }

    /// Rebuild a record from column values read back from the local store
    pub fn from_values(kind: ArtifactKind, values: Vec<String>) -> Result<Record> {
        let expected = kind.insert_fields().len();
        if values.len() != expected {
            return Err(Error::inconsistent(format!(
                "{} row has {} columns, expected {}",
                kind,
                values.len(),
                expected
            )));
        }

        let mut columns = values.into_iter();
        let mut next = || columns.next().unwrap_or_default();
        let timestamp = UtcTimestamp::from_utc_str(&next())?;
        let origin_host = next();

        let record = match kind {
            ArtifactKind::Attempt => Record::Attempt(AttemptRecord {
                timestamp,
                origin_host,
                source_ip: next(),
                user: next(),
                password: next(),
                success: next(),
                country_code: next(),
                country_name: next(),
            }),
            ArtifactKind::Log => Record::LogEntry(LogRecord {
                timestamp,
                origin_host,
                server_info: next(),
                message: next(),
            }),
            ArtifactKind::SessionLog => Record::SessionLogEntry(SessionLogRecord {
                timestamp,
                origin_host,
                source_ip: next(),
                country_code: next(),
                country_name: next(),
                channel: next(),
                message: next(),
            }),
            ArtifactKind::SessionRecording | ArtifactKind::SessionDownload => {
                let file = SessionFileRecord {
                    timestamp,
                    origin_host,
                    source_ip: next(),
                    country_code: next(),
                    country_name: next(),
                    filename: next(),
                    contents: next(),
                };
                if kind == ArtifactKind::SessionRecording {
                    Record::SessionRecording(file)
                } else {
                    Record::SessionDownloadFile(file)
                }
            },
        };
        Ok(record)
    }

    /// The document sent to the search index
    pub fn to_document(&self) -> Value {
        match self {
            Record::Attempt(r) => json!({
                "timestamp": r.timestamp,
                "origin_host": r.origin_host,
                "source_ip": r.source_ip,
                "user": r.user,
                "password": r.password,
                "success": r.succeeded(),
                "country_code": r.country_code,
                "country_name": r.country_name,
            }),
            Record::LogEntry(r) => json!(r),
            Record::SessionLogEntry(r) => json!(r),
            Record::SessionRecording(r) | Record::SessionDownloadFile(r) => json!(r),
        }
    }
}
