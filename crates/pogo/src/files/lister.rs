//! Pending and done artifact files of one kind
//!
//! A file is done once a sibling `<path>.DONE` marker exists. Files modified
//! after 23:59:59 yesterday (local time) are left alone, since the honeypot
//! may still be appending to them.

use crate::error::{Error, Result};
use crate::files::artifact::ArtifactFile;
use crate::kind::{ArtifactKind, Traversal};
use chrono::{Duration, Local, NaiveTime};
use pogo_common::UtcTimestamp;
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Suffix of the marker written next to a fully scraped file.
pub const DONE_SUFFIX: &str = ".DONE";

/// Name of the per-IP directory holding downloaded files.
const DOWNLOADS_DIR: &str = "downloads";

/// Marker path for `path`
pub fn done_marker(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(DONE_SUFFIX);
    PathBuf::from(name)
}

fn has_done_suffix(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().ends_with(DONE_SUFFIX))
        .unwrap_or(false)
}

/// A `.DONE` name with no file it could be marking
fn is_orphan_marker(path: &Path) -> bool {
    let name = path.as_os_str().to_string_lossy();
    match name.strip_suffix(DONE_SUFFIX) {
        Some(sibling) => !Path::new(sibling).is_file(),
        None => false,
    }
}

/// 23:59:59 of the previous local day
pub fn yesterday_cutoff() -> Result<SystemTime> {
    let yesterday = Local::now().date_naive() - Duration::days(1);
    let last_second = NaiveTime::from_hms_opt(23, 59, 59)
        .ok_or_else(|| Error::inconsistent("23:59:59 is not a valid time"))?;
    let cutoff = UtcTimestamp::from_local_naive(yesterday.and_time(last_second), &Local)?;
    Ok(SystemTime::from(cutoff.as_datetime()))
}

/// Lists the files of one kind below a source directory
#[derive(Debug)]
pub struct FileLister {
    kind: ArtifactKind,
    source_dir: PathBuf,
    cutoff: SystemTime,
    pending: BTreeSet<PathBuf>,
    done: BTreeSet<PathBuf>,
}

impl FileLister {
    pub fn new(kind: ArtifactKind, source_dir: &Path) -> Result<Self> {
        if !source_dir.is_dir() {
            return Err(Error::NotADirectory(source_dir.to_path_buf()));
        }
        Ok(Self {
            kind,
            source_dir: source_dir.canonicalize()?,
            cutoff: yesterday_cutoff()?,
            pending: BTreeSet::new(),
            done: BTreeSet::new(),
        })
    }

    /// Replace the default modification-time cutoff
    pub fn with_cutoff(mut self, cutoff: SystemTime) -> Self {
        self.cutoff = cutoff;
        self
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn pending(&self) -> &BTreeSet<PathBuf> {
        &self.pending
    }

    pub fn done(&self) -> &BTreeSet<PathBuf> {
        &self.done
    }

    /// Rebuild the pending and done sets from what is on disk
    pub fn load_file_name_lists(&mut self) -> Result<()> {
        self.pending.clear();
        self.done.clear();

        for candidate in self.candidates()? {
            let Some(name) = candidate.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            if !self.kind.matches_file_name(&name) {
                continue;
            }
            if name.ends_with(DONE_SUFFIX) {
                if is_orphan_marker(&candidate) {
                    warn!(path = %candidate.display(), "Ignoring .DONE file with no matching data file");
                }
                continue;
            }
            // Follows symlinks
            match fs::metadata(&candidate) {
                Ok(meta) if meta.is_file() => {},
                Ok(_) => continue,
                Err(e) => {
                    debug!(path = %candidate.display(), error = %e, "Skipping unreadable entry");
                    continue;
                },
            }
            let resolved = match candidate.canonicalize() {
                Ok(path) => path,
                Err(e) => {
                    warn!(path = %candidate.display(), error = %e, "Could not resolve file");
                    continue;
                },
            };
            if has_done_suffix(&resolved) {
                continue;
            }

            if done_marker(&resolved).is_file() {
                self.done.insert(resolved);
            } else {
                self.pending.insert(resolved);
            }
        }

        debug!(
            kind = %self.kind,
            pending = self.pending.len(),
            done = self.done.len(),
            "Listed artifact files"
        );
        Ok(())
    }

    fn candidates(&self) -> Result<Vec<PathBuf>> {
        match self.kind.traversal() {
            Traversal::Recursive => Ok(WalkDir::new(&self.source_dir)
                .min_depth(1)
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry.into_path()),
                    Err(e) => {
                        warn!(error = %e, "Skipping unreadable directory entry");
                        None
                    },
                })
                .collect()),
            Traversal::IpSubdirs => {
                let mut found = Vec::new();
                for dir in self.ip_dirs()? {
                    found.extend(entries_of(&dir)?);
                }
                Ok(found)
            },
            Traversal::IpDownloads => {
                let mut found = Vec::new();
                for dir in self.ip_dirs()? {
                    let downloads = dir.join(DOWNLOADS_DIR);
                    if downloads.is_dir() {
                        found.extend(entries_of(&downloads)?);
                    }
                }
                Ok(found)
            },
        }
    }

    fn ip_dirs(&self) -> Result<Vec<PathBuf>> {
        Ok(entries_of(&self.source_dir)?
            .into_iter()
            .filter(|path| path.is_dir())
            .collect())
    }

    /// Pending files last modified before the cutoff, ready to parse
    pub fn load_pending_file_objects(&self) -> Vec<ArtifactFile> {
        self.pending
            .iter()
            .filter(|path| match fs::metadata(path).and_then(|m| m.modified()) {
                Ok(modified) => modified < self.cutoff,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Could not read modification time");
                    false
                },
            })
            .map(|path| ArtifactFile::new(self.kind, path.clone()))
            .collect()
    }

    /// Record `path` as fully scraped; safe to repeat
    pub fn mark_as_done(&mut self, path: &Path) -> Result<()> {
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(done_marker(path))?;
        if self.pending.remove(path) {
            self.done.insert(path.to_path_buf());
        }
        Ok(())
    }

    /// Delete every done file together with its marker
    ///
    /// Returns the number of pairs removed. A failure on one file is logged
    /// and the remaining files are still processed.
    pub fn delete_done_files(&mut self) -> usize {
        let mut removed = Vec::new();
        for path in &self.done {
            let result = fs::remove_file(path).and_then(|_| fs::remove_file(done_marker(path)));
            match result {
                Ok(()) => removed.push(path.clone()),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete done file"),
            }
        }
        for path in &removed {
            self.done.remove(path);
        }
        removed.len()
    }
}

fn entries_of(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        paths.push(entry?.path());
    }
    Ok(paths)
}
