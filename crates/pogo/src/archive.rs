//! Compressed bundles of scraped artifact files
//!
//! After a scrape, the files it consumed are copied into a single
//! `<Prefix>-<UTC timestamp>.tar.gz` so they survive the later prune.

use crate::error::{Error, Result};
use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Timestamp layout used in archive names.
const ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Archive file name for `prefix` at the current time
pub fn archive_name(prefix: &str) -> String {
    format!("{}-{}.tar.gz", prefix, Utc::now().format(ARCHIVE_TIMESTAMP_FORMAT))
}

/// Member name of `path`: the absolute path without its leading `/`
fn member_name(path: &Path) -> &Path {
    path.strip_prefix("/").unwrap_or(path)
}

/// Bundle `files` into a new archive in `dir`, returning its path
///
/// A partially written archive is removed on failure.
pub fn archive_files(dir: &Path, prefix: &str, files: &[PathBuf]) -> Result<PathBuf> {
    let target = dir.join(archive_name(prefix));

    match write_archive(&target, files) {
        Ok(()) => {
            info!(archive = %target.display(), files = files.len(), "Archived scraped files");
            Ok(target)
        },
        Err(e) => {
            if let Err(cleanup) = fs::remove_file(&target) {
                warn!(archive = %target.display(), error = %cleanup, "Could not remove partial archive");
            }
            Err(e)
        },
    }
}

fn write_archive(target: &Path, files: &[PathBuf]) -> Result<()> {
    let encoder = GzEncoder::new(File::create(target)?, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for file in files {
        builder
            .append_path_with_name(file, member_name(file))
            .map_err(|e| Error::archive(format!("adding '{}': {}", file.display(), e)))?;
    }

    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .map_err(|e| Error::archive(format!("finishing '{}': {}", target.display(), e)))?;
    Ok(())
}
