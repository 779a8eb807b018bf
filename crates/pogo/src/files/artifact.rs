//! Parsing one artifact file into records
//!
//! Text artifacts (attempt logs, the honeypot log, session logs) yield one
//! record per line. Binary artifacts (recordings, downloads) yield a single
//! record holding the whole file as base64, timestamped from the file name.
//!
//! Timestamps in artifacts are naive wall-clock values of the host running
//! the honeypot and are converted with the local time zone rules.

use crate::error::{Error, Result};
use crate::geo::{GeoInfo, GeoLookup};
use crate::kind::ArtifactKind;
use crate::record::{AttemptRecord, LogRecord, Record, SessionFileRecord, SessionLogRecord};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Local;
use pogo_common::UtcTimestamp;
use std::fs;
use std::path::{Path, PathBuf};

/// Fields in an attempt line: `timestamp,source_ip,user,password,success`.
const ATTEMPT_FIELDS: usize = 5;

/// Session log lines this short carry no entry.
const MIN_SESSION_LOG_LINE: usize = 30;

/// Length of the `YYYY-MM-DD HH:MM:SS` prefix of a session log line.
const SESSION_LOG_TIMESTAMP_LEN: usize = 19;

/// Separator placed before a continuation line appended to a log message.
const CONTINUATION_SEPARATOR: &str = " -- ";

/// Shared inputs for parsing
pub struct ParseContext<'a> {
    /// Host name stamped on every record
    pub origin_host: &'a str,
    pub geo: &'a dyn GeoLookup,
}

/// One artifact file and the records parsed from it
#[derive(Debug, Clone)]
pub struct ArtifactFile {
    kind: ArtifactKind,
    path: PathBuf,
    records: Vec<Record>,
}

impl ArtifactFile {
    pub fn new(kind: ArtifactKind, path: PathBuf) -> Self {
        Self {
            kind,
            path,
            records: Vec::new(),
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Read the file and replace the held records with its contents
    ///
    /// On any failure no records are kept and a parse error naming the file
    /// is returned.
    pub fn load(&mut self, ctx: &ParseContext<'_>) -> Result<usize> {
        self.records.clear();

        if !self.path.is_file() {
            return Err(Error::parse(&self.path, "file does not exist"));
        }
        let bytes = fs::read(&self.path).map_err(|e| Error::parse(&self.path, e.to_string()))?;

        let parsed = match self.kind {
            ArtifactKind::Attempt => parse_attempts(&bytes, ctx),
            ArtifactKind::Log => parse_log(&bytes, ctx),
            ArtifactKind::SessionLog => parse_session_log(&self.path, &bytes, ctx),
            ArtifactKind::SessionRecording | ArtifactKind::SessionDownload => {
                parse_session_file(self.kind, &self.path, &bytes, ctx).map(|r| vec![r])
            },
        };

        match parsed {
            Ok(records) => {
                self.records = records;
                Ok(self.records.len())
            },
            Err(e @ Error::Parse { .. }) => Err(e),
            Err(e) => Err(Error::parse(&self.path, e.to_string())),
        }
    }
}

fn local_timestamp(value: &str) -> Result<UtcTimestamp> {
    Ok(UtcTimestamp::from_local_str(value, &Local)?)
}

fn parse_attempts(bytes: &[u8], ctx: &ParseContext<'_>) -> Result<Vec<Record>> {
    let text = String::from_utf8_lossy(bytes);
    let mut records = Vec::new();

    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            continue;
        }
        let mut fields: Vec<&str> = line.split(',').collect();
        fields.resize(ATTEMPT_FIELDS, "");

        let source_ip = fields[1].trim();
        let GeoInfo {
            country_code,
            country_name,
        } = ctx.geo.lookup(source_ip);
        let success = match fields[4].trim() {
            "" => "0",
            flag => flag,
        };

        records.push(Record::Attempt(AttemptRecord {
            timestamp: local_timestamp(fields[0])?,
            origin_host: ctx.origin_host.to_string(),
            source_ip: source_ip.to_string(),
            user: fields[2].to_string(),
            password: fields[3].to_string(),
            success: success.to_string(),
            country_code,
            country_name,
        }));
    }
    Ok(records)
}

fn parse_log(bytes: &[u8], ctx: &ParseContext<'_>) -> Result<Vec<Record>> {
    let text = String::from_utf8_lossy(bytes);
    let mut records: Vec<Record> = Vec::new();

    for line in text.lines() {
        if line.starts_with('\t') {
            // Continuation of the previous entry
            if let Some(Record::LogEntry(previous)) = records.last_mut() {
                previous.message.push_str(CONTINUATION_SEPARATOR);
                previous.message.push_str(line.trim());
            }
            continue;
        }
        let line = line.trim_end();
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = line.splitn(4, ' ');
        let date = fields.next().unwrap_or_default();
        let time = fields.next().unwrap_or_default();
        let timestamp =
            UtcTimestamp::from_zoned_or_local_str(&format!("{} {}", date, time), &Local)?;

        records.push(Record::LogEntry(LogRecord {
            timestamp,
            origin_host: ctx.origin_host.to_string(),
            server_info: fields.next().unwrap_or_default().to_string(),
            message: fields.next().unwrap_or_default().to_string(),
        }));
    }
    Ok(records)
}

fn parse_session_log(path: &Path, bytes: &[u8], ctx: &ParseContext<'_>) -> Result<Vec<Record>> {
    let text = String::from_utf8_lossy(bytes);
    let source_ip = ancestor_name(path, 1);
    let geo = ctx.geo.lookup(&source_ip);
    let mut records = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.chars().count() <= MIN_SESSION_LOG_LINE {
            continue;
        }

        let stamp: String = line.chars().take(SESSION_LOG_TIMESTAMP_LEN).collect();
        let (channel, message) = split_channel(line)
            .ok_or_else(|| Error::parse(path, format!("no [channel] in line '{}'", line)))?;

        records.push(Record::SessionLogEntry(SessionLogRecord {
            timestamp: local_timestamp(&stamp)?,
            origin_host: ctx.origin_host.to_string(),
            source_ip: source_ip.clone(),
            country_code: geo.country_code.clone(),
            country_name: geo.country_name.clone(),
            channel: channel.to_string(),
            message: message.to_string(),
        }));
    }
    Ok(records)
}

/// `... [channel] message` into trimmed `(channel, message)`
fn split_channel(line: &str) -> Option<(&str, &str)> {
    let open = line.find('[')?;
    let close = open + line[open..].find(']')?;
    Some((line[open + 1..close].trim(), line[close + 1..].trim()))
}

fn parse_session_file(
    kind: ArtifactKind,
    path: &Path,
    bytes: &[u8],
    ctx: &ParseContext<'_>,
) -> Result<Record> {
    // Downloads live one level deeper, in `<ip>/downloads/`
    let depth = if kind == ArtifactKind::SessionDownload { 2 } else { 1 };
    let source_ip = ancestor_name(path, depth);
    let GeoInfo {
        country_code,
        country_name,
    } = ctx.geo.lookup(&source_ip);

    let file = SessionFileRecord {
        timestamp: file_name_timestamp(path)?,
        origin_host: ctx.origin_host.to_string(),
        source_ip,
        country_code,
        country_name,
        filename: path.to_string_lossy().into_owned(),
        contents: STANDARD.encode(bytes),
    };
    Ok(match kind {
        ArtifactKind::SessionDownload => Record::SessionDownloadFile(file),
        _ => Record::SessionRecording(file),
    })
}

/// Name of the directory `depth` levels above the file
fn ancestor_name(path: &Path, depth: usize) -> String {
    path.ancestors()
        .nth(depth)
        .and_then(|dir| dir.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `YYYYMMDD?HHMMSS...` at the start of the file name as a local timestamp
fn file_name_timestamp(path: &Path) -> Result<UtcTimestamp> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let part = |range: std::ops::Range<usize>| {
        name.get(range)
            .ok_or_else(|| Error::parse(path, "file name does not start with a timestamp"))
    };
    let stamp = format!(
        "{}-{}-{} {}:{}:{}",
        part(0..4)?,
        part(4..6)?,
        part(6..8)?,
        part(9..11)?,
        part(11..13)?,
        part(13..15)?
    );
    local_timestamp(&stamp)
}
