//! Logging Configuration and Initialization
//!
//! Pogo runs as a short-lived batch job, usually from cron, so logging is
//! either sent to the console or appended to a single file that an external
//! tool such as logrotate takes care of.
//!
//! - Console or file target (the `[logging] filename` setting, `CONSOLE` means stdout)
//! - Text or JSON format
//! - Level names in either `tracing` style (`warn`) or the classic style (`WARNING`)
//! - Optional extra filter directives (e.g. `reqwest=warn,pogo=debug`)
//!
//! The value returned by [`init_logging`] owns the background writer. Keep it
//! alive until the run ends, otherwise buffered lines are lost.
//!
//! # Example
//!
//! ```no_run
//! use pogo_common::logging::{init_logging, LogConfig, LogLevel};
//! use tracing::info;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::builder().level(LogLevel::Info).build().merge_env()?;
//!     let _guard = init_logging(&config)?;
//!
//!     info!("run started");
//!     Ok(())
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Value of the `[logging] filename` setting that selects the console
pub const CONSOLE_TARGET: &str = "CONSOLE";

/// Log level for filtering messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Very detailed trace-level logging
    Trace,
    /// Debug-level logging for development
    Debug,
    /// Informational messages
    Info,
    /// Warning messages
    #[default]
    Warn,
    /// Error messages
    Error,
}

impl LogLevel {
    /// Convert to tracing Level
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            // An empty level or NOTSET lets everything through
            "" | "notset" | "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" | "critical" | "fatal" => Ok(LogLevel::Error),
            _ => Err(anyhow::anyhow!("Invalid log level: {}", s)),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Where log lines go
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// Standard output
    #[default]
    Console,
    /// Append to the given file
    File(PathBuf),
}

impl LogTarget {
    /// Interpret a `[logging] filename` value
    pub fn from_setting(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case(CONSOLE_TARGET) {
            LogTarget::Console
        } else {
            LogTarget::File(PathBuf::from(value))
        }
    }
}

impl std::fmt::Display for LogTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogTarget::Console => write!(f, "{}", CONSOLE_TARGET),
            LogTarget::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Log format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("json") {
            Ok(LogFormat::Json)
        } else if s.eq_ignore_ascii_case("text") {
            Ok(LogFormat::Text)
        } else {
            anyhow::bail!("unknown log format '{}' (expected text or json)", s)
        }
    }
}

/// Environment variable selecting the output format.
pub const FORMAT_ENV: &str = "POGO_LOG_FORMAT";

/// Environment variable holding extra filter directives.
pub const FILTER_ENV: &str = "POGO_LOG_FILTER";

/// Logging setup for one run
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub target: LogTarget,
    pub format: LogFormat,
    /// Comma separated directives such as `reqwest=warn,pogo::index=debug`
    pub filter_directives: Option<String>,
}

impl LogConfig {
    pub fn builder() -> LogConfigBuilder {
        LogConfigBuilder::default()
    }

    /// Apply `POGO_LOG_FORMAT` and `POGO_LOG_FILTER` when set
    pub fn merge_env(self) -> Result<Self> {
        self.merge_vars(|name| std::env::var(name).ok())
    }

    fn merge_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(format) = var(FORMAT_ENV) {
            self.format = format.parse().with_context(|| format!("in {}", FORMAT_ENV))?;
        }
        if let Some(filter) = var(FILTER_ENV).filter(|f| !f.trim().is_empty()) {
            self.filter_directives = Some(filter);
        }
        Ok(self)
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        let mut filter = EnvFilter::builder()
            .with_default_directive(self.level.to_tracing_level().into())
            .from_env_lossy();
        for directive in self
            .filter_directives
            .iter()
            .flat_map(|d| d.split(','))
            .map(str::trim)
            .filter(|d| !d.is_empty())
        {
            filter = filter.add_directive(
                directive
                    .parse()
                    .with_context(|| format!("bad log filter directive '{}'", directive))?,
            );
        }
        Ok(filter)
    }
}

#[derive(Default)]
pub struct LogConfigBuilder {
    config: LogConfig,
}

impl LogConfigBuilder {
    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    pub fn target(mut self, target: LogTarget) -> Self {
        self.config.target = target;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn filter_directives(mut self, filter: impl Into<String>) -> Self {
        self.config.filter_directives = Some(filter.into());
        self
    }

    pub fn build(self) -> LogConfig {
        self.config
    }
}

/// Keeps the background log writer running until dropped
#[must_use = "dropping the guard stops the log writer"]
pub struct LoggingGuard {
    _worker: WorkerGuard,
}

/// Install the global subscriber; call once per process
///
/// A file target is opened in append mode and never rotated.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuard> {
    let filter = config.env_filter()?;

    let (writer, worker) = match &config.target {
        LogTarget::Console => tracing_appender::non_blocking(std::io::stdout()),
        LogTarget::File(path) => {
            let (dir, file_name) = split_log_path(path)?;
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory '{}'", dir.display()))?;
            tracing_appender::non_blocking(tracing_appender::rolling::never(&dir, file_name))
        },
    };

    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_ansi(config.target == LogTarget::Console);
    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Text => registry.with(layer).try_init()?,
        LogFormat::Json => registry.with(layer.json()).try_init()?,
    }

    Ok(LoggingGuard { _worker: worker })
}

/// `(directory, file name)` of a log file path; a bare name lives in `.`
fn split_log_path(path: &Path) -> Result<(PathBuf, String)> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("Log file path has no file name: {}", path.display()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, file_name))
}
