//! The scrape, forward and prune phases
//!
//! Each phase re-derives its work from durable state (done markers on disk,
//! empty or filled `external_id` columns), so a run that stops halfway is
//! finished by the next one without scraping or forwarding anything twice.
//!
//! ```text
//! file on disk ──scrape──▶ staged row + .DONE ──forward──▶ row with index id
//!                                                              │
//!                          file + marker deleted ◀──prune──────┘ row deleted
//! ```

use crate::archive::archive_files;
use crate::config::Locations;
use crate::error::{Error, Result};
use crate::files::{FileLister, ParseContext};
use crate::geo::{GeoLookup, NoGeoLookup};
use crate::index::{DocumentIndex, IndexConnector};
use crate::kind::ArtifactKind;
use crate::store::LocalDb;
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

/// Forwarded rows between two progress messages.
pub const PROGRESS_INTERVAL: usize = 50;

/// Outcome of scraping one kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeReport {
    pub files_scraped: usize,
    /// Files that parsed to nothing and stay pending
    pub files_empty: usize,
    /// Files that failed to parse and stay pending
    pub files_failed: usize,
    pub records_inserted: usize,
    pub archive: Option<PathBuf>,
}

/// Outcome of pruning one kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub files_removed: usize,
    pub rows_removed: usize,
}

/// Outcome of a full run, per kind in processing order
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub scraped: Vec<(ArtifactKind, ScrapeReport)>,
    pub forwarded: Vec<(ArtifactKind, usize)>,
    pub pruned: Vec<(ArtifactKind, PruneReport)>,
}

/// Files and rows of one kind awaiting each phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindStatus {
    pub kind: ArtifactKind,
    /// `None` when the source directory is missing
    pub pending_files: Option<usize>,
    pub done_files: Option<usize>,
    pub unforwarded_rows: i64,
    pub forwarded_rows: i64,
}

/// Drives the phases for every artifact kind
pub struct Pipeline<'a> {
    db: &'a LocalDb,
    locations: Locations,
    archive_dir: Option<PathBuf>,
    geo: Box<dyn GeoLookup>,
    origin_host: String,
    cutoff: Option<SystemTime>,
    span: Span,
}

impl<'a> Pipeline<'a> {
    /// Pipeline archiving into `locations.arc_dir`, without geo lookup
    ///
    /// Every phase runs inside `span`.
    pub fn new(
        db: &'a LocalDb,
        locations: Locations,
        origin_host: impl Into<String>,
        span: Span,
    ) -> Self {
        Self {
            db,
            archive_dir: Some(locations.arc_dir.clone()),
            locations,
            geo: Box::new(NoGeoLookup),
            origin_host: origin_host.into(),
            cutoff: None,
            span,
        }
    }

    pub fn with_geo(mut self, geo: Box<dyn GeoLookup>) -> Self {
        self.geo = geo;
        self
    }

    /// Only scrape files modified before `cutoff` instead of yesterday 23:59:59
    pub fn with_cutoff(mut self, cutoff: SystemTime) -> Self {
        self.cutoff = Some(cutoff);
        self
    }

    /// Skip archiving scraped files
    pub fn without_archive(mut self) -> Self {
        self.archive_dir = None;
        self
    }

    fn lister(&self, kind: ArtifactKind) -> Result<FileLister> {
        let lister = FileLister::new(kind, self.locations.source_dir(kind))?;
        Ok(match self.cutoff {
            Some(cutoff) => lister.with_cutoff(cutoff),
            None => lister,
        })
    }

    /// Stage every pending file of `kind` and mark it done
    ///
    /// Files that fail to parse or hold no records are logged and left
    /// pending. A staged row count that differs from the parsed count aborts.
    pub fn scrape(&self, kind: ArtifactKind) -> Result<ScrapeReport> {
        let span = info_span!(parent: &self.span, "scrape", %kind);
        let _enter = span.enter();

        let mut lister = self.lister(kind)?;
        lister.load_file_name_lists()?;
        let files = lister.load_pending_file_objects();
        debug!(candidates = files.len(), "Loading pending files");

        let store = self.db.records(kind);
        let ctx = ParseContext {
            origin_host: &self.origin_host,
            geo: self.geo.as_ref(),
        };

        let mut report = ScrapeReport::default();
        let mut scraped = Vec::new();

        for mut file in files {
            match file.load(&ctx) {
                Ok(0) => {
                    warn!(path = %file.path().display(), "File holds no records, leaving it pending");
                    report.files_empty += 1;
                    continue;
                },
                Ok(_) => {},
                Err(e) if e.is_file_level() => {
                    warn!(error = %e, "Skipping file");
                    report.files_failed += 1;
                    continue;
                },
                Err(e) => return Err(e),
            }

            let inserted = store.insert_bulk(file.records())?;
            if inserted != file.len() {
                return Err(Error::inconsistent(format!(
                    "'{}' parsed to {} records but {} were stored",
                    file.path().display(),
                    file.len(),
                    inserted
                )));
            }
            lister.mark_as_done(file.path())?;

            report.files_scraped += 1;
            report.records_inserted += inserted;
            scraped.push(file.path().to_path_buf());
        }

        if let Some(dir) = &self.archive_dir {
            if !scraped.is_empty() {
                report.archive = Some(archive_files(dir, kind.archive_prefix(), &scraped)?);
            }
        }

        info!(
            files = report.files_scraped,
            records = report.records_inserted,
            skipped = report.files_empty + report.files_failed,
            "Scrape finished"
        );
        Ok(report)
    }

    /// Send every unforwarded row of `kind` to `index`
    ///
    /// Stops at the first failed insert or store update; rows already
    /// forwarded keep their index id.
    pub async fn forward(&self, kind: ArtifactKind, index: &dyn DocumentIndex) -> Result<usize> {
        let span = info_span!(parent: &self.span, "forward", %kind);
        self.forward_rows(kind, index).instrument(span).await
    }

    async fn forward_rows(&self, kind: ArtifactKind, index: &dyn DocumentIndex) -> Result<usize> {
        let store = self.db.records(kind);
        let rows = store.list_unforwarded()?;
        let total = rows.len();

        for (done, row) in rows.iter().enumerate() {
            let external_id = index.insert(&row.record).await?;
            if let Err(e) = store.mark_forwarded(row.local_id, &external_id) {
                error!(
                    local_id = row.local_id,
                    external_id = %external_id,
                    error = %e,
                    "Could not record index id"
                );
                return Err(e);
            }
            if (done + 1) % PROGRESS_INTERVAL == 0 {
                info!(forwarded = done + 1, total, "Forward progress");
            }
        }

        info!(forwarded = total, "Forward finished");
        Ok(total)
    }

    /// Delete done files and forwarded rows of `kind`
    pub fn prune(&self, kind: ArtifactKind) -> Result<PruneReport> {
        let span = info_span!(parent: &self.span, "prune", %kind);
        let _enter = span.enter();

        let mut lister = self.lister(kind)?;
        lister.load_file_name_lists()?;
        let files_removed = lister.delete_done_files();
        let rows_removed = self.db.records(kind).delete_forwarded()?;

        info!(files = files_removed, rows = rows_removed, "Prune finished");
        Ok(PruneReport {
            files_removed,
            rows_removed,
        })
    }

    /// All scrapes, then all forwards, then all prunes
    ///
    /// The index of a kind is only opened when it has rows to forward.
    pub async fn run(&self, connector: &dyn IndexConnector) -> Result<RunReport> {
        let mut report = RunReport::default();

        for kind in ArtifactKind::ALL {
            report.scraped.push((kind, self.scrape(kind)?));
        }

        for kind in ArtifactKind::ALL {
            let forwarded = if self.db.records(kind).count_unforwarded()? == 0 {
                0
            } else {
                let index = connector
                    .connect(kind)
                    .instrument(self.span.clone())
                    .await?;
                self.forward(kind, index.as_ref()).await?
            };
            report.forwarded.push((kind, forwarded));
        }

        for kind in ArtifactKind::ALL {
            report.pruned.push((kind, self.prune(kind)?));
        }

        Ok(report)
    }

    /// Current backlog of every kind
    pub fn status(&self) -> Result<Vec<KindStatus>> {
        ArtifactKind::ALL
            .into_iter()
            .map(|kind| {
                let (pending_files, done_files) = match self.lister(kind) {
                    Ok(mut lister) => {
                        lister.load_file_name_lists()?;
                        (Some(lister.pending().len()), Some(lister.done().len()))
                    },
                    Err(Error::NotADirectory(_)) => (None, None),
                    Err(e) => return Err(e),
                };
                let store = self.db.records(kind);
                Ok(KindStatus {
                    kind,
                    pending_files,
                    done_files,
                    unforwarded_rows: store.count_unforwarded()?,
                    forwarded_rows: store.count_forwarded()?,
                })
            })
            .collect()
    }
}
