//! The closed set of artifact kinds handled by Pogo
//!
//! Every kind-specific decision (where its files live, which names belong to
//! it, which table and index it uses) is answered here, so the rest of the
//! pipeline can stay generic.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static ATTEMPT_FILE_PATTERN: LazyLock<Regex> = LazyLock::new(|| compiled(r"^\d{8}$"));
static LOG_FILE_PATTERN: LazyLock<Regex> = LazyLock::new(|| compiled(r"^honssh\.log"));
static SESSION_LOG_FILE_PATTERN: LazyLock<Regex> = LazyLock::new(|| compiled(r"^.*\.log"));
static RECORDING_FILE_PATTERN: LazyLock<Regex> = LazyLock::new(|| compiled(r"^.*\.tty"));

#[allow(clippy::expect_used)]
fn compiled(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static file name pattern is valid")
}

/// One kind of honeypot artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    /// Login attempt logs, one file per day (`YYYYMMDD`)
    Attempt,
    /// The honeypot's own log (`honssh.log*`)
    Log,
    /// Per-session command logs under `<session_dir>/<ip>/`
    SessionLog,
    /// Per-session terminal recordings (`*.tty`)
    SessionRecording,
    /// Files fetched by the attacker, under `<session_dir>/<ip>/downloads/`
    SessionDownload,
}

/// Which configured directory a kind reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLocation {
    AttemptDir,
    LogDir,
    SessionDir,
}

/// How a kind walks its source directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    /// The source directory and every directory below it
    Recursive,
    /// Each immediate subdirectory (one per source IP)
    IpSubdirs,
    /// The `downloads` directory inside each immediate subdirectory
    IpDownloads,
}

impl ArtifactKind {
    /// All kinds in the order the driver processes them
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::Attempt,
        ArtifactKind::Log,
        ArtifactKind::SessionDownload,
        ArtifactKind::SessionLog,
        ArtifactKind::SessionRecording,
    ];

    /// Stable short name, also accepted on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Attempt => "attempt",
            ArtifactKind::Log => "log",
            ArtifactKind::SessionLog => "session-log",
            ArtifactKind::SessionRecording => "session-recording",
            ArtifactKind::SessionDownload => "session-download",
        }
    }

    pub fn source_location(&self) -> SourceLocation {
        match self {
            ArtifactKind::Attempt => SourceLocation::AttemptDir,
            ArtifactKind::Log => SourceLocation::LogDir,
            ArtifactKind::SessionLog
            | ArtifactKind::SessionRecording
            | ArtifactKind::SessionDownload => SourceLocation::SessionDir,
        }
    }

    pub fn traversal(&self) -> Traversal {
        match self {
            ArtifactKind::Attempt | ArtifactKind::Log => Traversal::Recursive,
            ArtifactKind::SessionLog | ArtifactKind::SessionRecording => Traversal::IpSubdirs,
            ArtifactKind::SessionDownload => Traversal::IpDownloads,
        }
    }

    /// Whether a bare file name (no directory) belongs to this kind
    pub fn matches_file_name(&self, name: &str) -> bool {
        match self {
            ArtifactKind::Attempt => ATTEMPT_FILE_PATTERN.is_match(name),
            ArtifactKind::Log => LOG_FILE_PATTERN.is_match(name),
            ArtifactKind::SessionLog => SESSION_LOG_FILE_PATTERN.is_match(name),
            ArtifactKind::SessionRecording => RECORDING_FILE_PATTERN.is_match(name),
            // Downloads keep whatever name the attacker gave them
            ArtifactKind::SessionDownload => true,
        }
    }

    /// Local store table holding this kind's rows
    pub fn table_name(&self) -> &'static str {
        match self {
            ArtifactKind::Attempt => "attempts",
            ArtifactKind::Log => "log_msg",
            ArtifactKind::SessionLog => "session_log_records",
            ArtifactKind::SessionRecording => "session_recordings",
            ArtifactKind::SessionDownload => "session_downloads",
        }
    }

    /// Payload columns written on insert, in statement parameter order
    pub fn insert_fields(&self) -> &'static [&'static str] {
        match self {
            ArtifactKind::Attempt => &[
                "timestamp",
                "origin_host",
                "source_ip",
                "user",
                "password",
                "success",
                "country_code",
                "country_name",
            ],
            ArtifactKind::Log => &["timestamp", "origin_host", "server_info", "message"],
            ArtifactKind::SessionLog => &[
                "timestamp",
                "origin_host",
                "source_ip",
                "country_code",
                "country_name",
                "channel",
                "message",
            ],
            ArtifactKind::SessionRecording | ArtifactKind::SessionDownload => &[
                "timestamp",
                "origin_host",
                "source_ip",
                "country_code",
                "country_name",
                "filename",
                "contents",
            ],
        }
    }

    /// Suffix appended to the configured index prefix
    pub fn index_suffix(&self) -> &'static str {
        match self {
            ArtifactKind::Attempt => "attempt",
            ArtifactKind::Log => "log_entry",
            ArtifactKind::SessionLog => "session_log_entry",
            ArtifactKind::SessionRecording => "session_recording",
            ArtifactKind::SessionDownload => "session_download",
        }
    }

    /// Prefix of the archive bundles written after a scrape
    pub fn archive_prefix(&self) -> &'static str {
        match self {
            ArtifactKind::Attempt => "HonSSH_Attempts",
            ArtifactKind::Log => "HonSSH_Logs",
            ArtifactKind::SessionLog => "HonSSH_Session_Logs",
            ArtifactKind::SessionRecording => "HonSSH_Session_Recordings",
            ArtifactKind::SessionDownload => "HonSSH_Session_Downloads",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "attempt" | "attempts" => Ok(ArtifactKind::Attempt),
            "log" | "logs" => Ok(ArtifactKind::Log),
            "session-log" | "session-logs" => Ok(ArtifactKind::SessionLog),
            "session-recording" | "session-recordings" => Ok(ArtifactKind::SessionRecording),
            "session-download" | "session-downloads" => Ok(ArtifactKind::SessionDownload),
            _ => Err(format!(
                "unknown artifact kind '{}' (expected one of: attempt, log, session-log, session-recording, session-download)",
                s
            )),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_names() {
        assert!(ArtifactKind::Attempt.matches_file_name("20150113"));
        assert!(!ArtifactKind::Attempt.matches_file_name("20150113.DONE"));
        assert!(!ArtifactKind::Attempt.matches_file_name("2015011"));
        assert!(!ArtifactKind::Attempt.matches_file_name("honssh.log"));
    }

    #[test]
    fn test_log_names() {
        assert!(ArtifactKind::Log.matches_file_name("honssh.log"));
        assert!(ArtifactKind::Log.matches_file_name("honssh.log.2015_01_13"));
        assert!(!ArtifactKind::Log.matches_file_name("old-honssh.log"));
    }

    #[test]
    fn test_session_names() {
        assert!(ArtifactKind::SessionLog.matches_file_name("20150113_202200_1.log"));
        assert!(ArtifactKind::SessionRecording.matches_file_name("20150113_202200_1.tty"));
        assert!(!ArtifactKind::SessionRecording.matches_file_name("20150113_202200_1.log"));
        assert!(ArtifactKind::SessionDownload.matches_file_name("anything at all"));
    }

    #[test]
    fn test_every_table_has_common_columns() {
        for kind in ArtifactKind::ALL {
            let fields = kind.insert_fields();
            assert_eq!(fields[0], "timestamp");
            assert_eq!(fields[1], "origin_host");
        }
    }

    #[test]
    fn test_kind_parse_round_trip() {
        for kind in ArtifactKind::ALL {
            assert_eq!(kind.as_str().parse::<ArtifactKind>().unwrap(), kind);
        }
        assert_eq!("session_logs".parse::<ArtifactKind>().unwrap(), ArtifactKind::SessionLog);
        assert!("sessions".parse::<ArtifactKind>().is_err());
    }
}
