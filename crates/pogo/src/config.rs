//! Configuration management for Pogo
//!
//! Settings are read from INI files on a fixed search path, then an explicit
//! `--config` file, then `POGO_*` environment variables. Later sources win.

use crate::error::{Error, Result};
use crate::kind::{ArtifactKind, SourceLocation};
use config::{Config, Environment, File, FileFormat};
use pogo_common::logging::{LogConfig, LogLevel, LogTarget};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Configuration Defaults
// ============================================================================

/// Base name of every configuration file on the search path.
pub const CONFIG_FILE_NAME: &str = "pogo.cfg";

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "POGO";

/// Separator between section and key in environment variable names.
pub const ENV_SEPARATOR: &str = "__";

/// Default install location of the honeypot.
pub const DEFAULT_TOP_DIR: &str = "/opt/honssh";

/// Default local store location.
pub const DEFAULT_DB_NAME: &str = "/usr/local/share/pogo/db/pogo.db";

/// The only supported local store engine.
pub const SUPPORTED_DB_TYPE: &str = "sqlite";

pub const DEFAULT_ES_HOST: &str = "localhost";
pub const DEFAULT_ES_PORT: u16 = 9200;
pub const DEFAULT_ES_INDEX: &str = "hon_ssh";
pub const DEFAULT_ES_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_LOG_LEVEL: &str = "WARNING";

/// Configuration files probed on every start, lowest priority first
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("/etc").join(CONFIG_FILE_NAME),
        PathBuf::from("/etc/default").join(CONFIG_FILE_NAME),
        PathBuf::from("/etc/pogo").join(CONFIG_FILE_NAME),
    ];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("pogo").join(CONFIG_FILE_NAME));
    }
    paths.push(PathBuf::from(CONFIG_FILE_NAME));
    paths
}

/// Effective configuration for one run
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub main: MainSettings,
    pub locations: Locations,
    pub elasticsearch: IndexSettings,
    pub db_connection: DbSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize)]
pub struct MainSettings {
    pub debug: bool,
    /// Host name stamped on every record
    pub origin_host: String,
}

/// Where artifacts are read from and archived to
#[derive(Debug, Clone, Serialize)]
pub struct Locations {
    pub top_dir: PathBuf,
    pub log_dir: PathBuf,
    pub attempt_dir: PathBuf,
    pub session_dir: PathBuf,
    pub arc_dir: PathBuf,
    pub geoip_db: Option<PathBuf>,
}

impl Locations {
    pub fn source_dir(&self, kind: ArtifactKind) -> &Path {
        match kind.source_location() {
            SourceLocation::AttemptDir => &self.attempt_dir,
            SourceLocation::LogDir => &self.log_dir,
            SourceLocation::SessionDir => &self.session_dir,
        }
    }
}

/// Search index connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    pub es_host: String,
    pub es_port: u16,
    /// Prefix of every index name
    pub es_index: String,
    /// Request timeout in seconds
    pub es_timeout: u64,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            es_host: DEFAULT_ES_HOST.to_string(),
            es_port: DEFAULT_ES_PORT,
            es_index: DEFAULT_ES_INDEX.to_string(),
            es_timeout: DEFAULT_ES_TIMEOUT_SECS,
        }
    }
}

impl IndexSettings {
    /// `http://host:port`, or the host itself when it already names a scheme
    pub fn base_url(&self) -> String {
        let host = self.es_host.trim().trim_end_matches('/');
        if host.contains("://") {
            host.to_string()
        } else {
            format!("http://{}:{}", host, self.es_port)
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.es_timeout)
    }

    /// Name of the index holding one kind's documents
    pub fn index_name(&self, kind: ArtifactKind) -> String {
        format!("{}-{}", self.es_index, kind.index_suffix())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbSettings {
    #[serde(rename = "type")]
    pub db_type: String,
    /// Path of the SQLite database file
    pub name: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `CONSOLE` or a file path
    pub filename: String,
    pub level: String,
}

impl LoggingSettings {
    /// Logging setup for the run; `verbose` forces debug output
    pub fn log_config(&self, verbose: bool) -> Result<LogConfig> {
        let level = if verbose {
            LogLevel::Debug
        } else {
            parse_level(&self.level)?
        };
        Ok(LogConfig::builder()
            .level(level)
            .target(LogTarget::from_setting(&self.filename))
            .build())
    }
}

fn parse_level(value: &str) -> Result<LogLevel> {
    value
        .parse()
        .map_err(|_| Error::config(format!("unknown log level '{}'", value)))
}

// Shape of the merged sources before defaults that depend on other keys
#[derive(Debug, Deserialize)]
struct RawSettings {
    main: RawMain,
    locations: RawLocations,
    elasticsearch: IndexSettings,
    db_connection: DbSettings,
    logging: LoggingSettings,
}

#[derive(Debug, Deserialize)]
struct RawMain {
    debug: bool,
    #[serde(default)]
    origin_host: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLocations {
    top_dir: PathBuf,
    #[serde(default)]
    log_dir: Option<String>,
    #[serde(default)]
    attempt_dir: Option<String>,
    #[serde(default)]
    session_dir: Option<String>,
    #[serde(default)]
    arc_dir: Option<String>,
    #[serde(default)]
    geoip_db: Option<String>,
}

/// Treat a blank INI value the same as a missing one
fn non_blank(value: Option<String>) -> Option<PathBuf> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

impl Settings {
    /// Load settings from the search path, `explicit`, and the environment
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_from(
            &search_paths(),
            explicit,
            Environment::with_prefix(ENV_PREFIX),
        )
    }

    /// Load settings from the given files and environment source
    pub fn load_from(files: &[PathBuf], explicit: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("main.debug", false)?
            .set_default("locations.top_dir", DEFAULT_TOP_DIR)?
            .set_default("elasticsearch.es_host", DEFAULT_ES_HOST)?
            .set_default("elasticsearch.es_port", i64::from(DEFAULT_ES_PORT))?
            .set_default("elasticsearch.es_index", DEFAULT_ES_INDEX)?
            .set_default("elasticsearch.es_timeout", DEFAULT_ES_TIMEOUT_SECS as i64)?
            .set_default("db_connection.type", SUPPORTED_DB_TYPE)?
            .set_default("db_connection.name", DEFAULT_DB_NAME)?
            .set_default("logging.filename", pogo_common::logging::CONSOLE_TARGET)?
            .set_default("logging.level", DEFAULT_LOG_LEVEL)?;

        for path in files {
            builder = builder.add_source(
                File::from(path.as_path())
                    .format(FileFormat::Ini)
                    .required(false),
            );
        }

        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(Error::config(format!(
                    "configuration file '{}' does not exist",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path).format(FileFormat::Ini).required(true));
        }

        let raw: RawSettings = builder
            .add_source(
                env.prefix_separator("_")
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        let settings = Self::resolve(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    fn resolve(raw: RawSettings) -> Result<Self> {
        let origin_host = match raw.main.origin_host.filter(|h| !h.trim().is_empty()) {
            Some(host) => host.trim().to_string(),
            None => hostname::get()?.to_string_lossy().into_owned(),
        };

        let top = raw.locations.top_dir;
        let locations = Locations {
            log_dir: non_blank(raw.locations.log_dir).unwrap_or_else(|| top.join("logs")),
            attempt_dir: non_blank(raw.locations.attempt_dir).unwrap_or_else(|| top.join("logs")),
            session_dir: non_blank(raw.locations.session_dir)
                .unwrap_or_else(|| top.join("sessions")),
            arc_dir: non_blank(raw.locations.arc_dir).unwrap_or_else(|| top.join("archives")),
            geoip_db: non_blank(raw.locations.geoip_db),
            top_dir: top,
        };

        Ok(Self {
            main: MainSettings {
                debug: raw.main.debug,
                origin_host,
            },
            locations,
            elasticsearch: raw.elasticsearch,
            db_connection: raw.db_connection,
            logging: raw.logging,
        })
    }

    /// Reject settings that cannot work
    pub fn validate(&self) -> Result<()> {
        if !self
            .db_connection
            .db_type
            .trim()
            .eq_ignore_ascii_case(SUPPORTED_DB_TYPE)
        {
            return Err(Error::config(format!(
                "unsupported db_connection type '{}' (only '{}' is supported)",
                self.db_connection.db_type, SUPPORTED_DB_TYPE
            )));
        }
        if self.elasticsearch.es_port == 0 {
            return Err(Error::config("es_port must not be 0"));
        }
        if self.elasticsearch.es_timeout == 0 {
            return Err(Error::config("es_timeout must not be 0"));
        }
        if self.elasticsearch.es_index.trim().is_empty() {
            return Err(Error::config("es_index must not be empty"));
        }
        parse_level(&self.logging.level)?;
        Ok(())
    }

    /// Logging setup for the run; `[main] debug` or `verbose` force debug
    pub fn log_config(&self, verbose: bool) -> Result<LogConfig> {
        self.logging.log_config(verbose || self.main.debug)
    }
}
