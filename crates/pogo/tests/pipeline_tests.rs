//! End-to-end tests for the scrape, forward and prune phases
//!
//! These tests run the pipeline over a scratch honeypot tree with an
//! in-memory store and an in-process index that records every document.

use async_trait::async_trait;
use filetime::FileTime;
use pogo::config::Locations;
use pogo::error::Error;
use pogo::index::{DocumentIndex, IndexConnector};
use pogo::{ArtifactKind, LocalDb, Pipeline, Record};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tracing::Span;

const ATTEMPT_LINE: &str = "2015-01-13 20:22:00,192.168.0.1,donaldduck,secret,0\n";

/// Records every inserted document and hands out ids `abc123`, `abc124`, ...
#[derive(Default)]
struct Recorder {
    docs: Mutex<Vec<Record>>,
    fail_after: Option<usize>,
}

impl Recorder {
    fn failing_after(n: usize) -> Self {
        Self {
            docs: Mutex::new(Vec::new()),
            fail_after: Some(n),
        }
    }

    fn count(&self) -> usize {
        self.docs.lock().unwrap().len()
    }
}

struct Handle(Arc<Recorder>);

#[async_trait]
impl DocumentIndex for Handle {
    async fn insert(&self, record: &Record) -> pogo::Result<String> {
        let mut docs = self.0.docs.lock().unwrap();
        if self.0.fail_after.is_some_and(|n| docs.len() >= n) {
            return Err(Error::index("index unavailable"));
        }
        let id = format!("abc{}", 123 + docs.len());
        docs.push(record.clone());
        Ok(id)
    }
}

struct Connector {
    recorder: Arc<Recorder>,
    connected: Mutex<Vec<ArtifactKind>>,
}

impl Connector {
    fn new(recorder: Recorder) -> Self {
        Self {
            recorder: Arc::new(recorder),
            connected: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl IndexConnector for Connector {
    async fn connect(&self, kind: ArtifactKind) -> pogo::Result<Box<dyn DocumentIndex>> {
        self.connected.lock().unwrap().push(kind);
        Ok(Box::new(Handle(self.recorder.clone())))
    }
}

/// Scratch honeypot tree
struct Honeypot {
    dir: TempDir,
}

impl Honeypot {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["logs", "sessions", "archives"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        Self { dir }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn locations(&self) -> Locations {
        let top = self.root().to_path_buf();
        Locations {
            log_dir: top.join("logs"),
            attempt_dir: top.join("logs"),
            session_dir: top.join("sessions"),
            arc_dir: top.join("archives"),
            geoip_db: None,
            top_dir: top,
        }
    }

    /// Write a file last modified two days ago
    fn write_old(&self, rel: &str, body: &[u8]) -> PathBuf {
        let path = self.write(rel, body);
        let two_days_ago = SystemTime::now() - Duration::from_secs(2 * 86_400);
        filetime::set_file_mtime(&path, FileTime::from_system_time(two_days_ago)).unwrap();
        path
    }

    fn write(&self, rel: &str, body: &[u8]) -> PathBuf {
        let path = self.root().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, body).unwrap();
        path
    }

    fn populate_all_kinds(&self) {
        self.write_old("logs/20150113", ATTEMPT_LINE.as_bytes());
        self.write_old(
            "logs/honssh.log.2015_01_13",
            b"2015-01-13 20:22:00 [HonsshServerTransport,0,10.1.2.3] Incoming connection\n\
              2015-01-13 20:22:09 [-] Connection lost\n",
        );
        self.write_old(
            "sessions/10.1.2.3/20150113_202200_0.log",
            b"2015-01-13 20:22:00 - [POT ] - Login Successful: root:root\n\
              2015-01-13 20:22:07 - [TERM0] - Entered command: uname -a\n",
        );
        self.write_old("sessions/10.1.2.3/20150113_202200_0.tty", b"\x00\x01recording");
        self.write_old("sessions/10.1.2.3/downloads/20150113-202300-evil.sh", b"#!/bin/sh\n");
    }

    fn archives(&self) -> Vec<PathBuf> {
        fs::read_dir(self.root().join("archives"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }
}

fn pipeline<'a>(db: &'a LocalDb, honeypot: &Honeypot) -> Pipeline<'a> {
    Pipeline::new(db, honeypot.locations(), "phoebe", Span::none())
}

#[tokio::test]
async fn test_attempt_scrape_forward_prune() {
    let honeypot = Honeypot::new();
    let file = honeypot.write_old("logs/20150113", ATTEMPT_LINE.as_bytes());
    let db = LocalDb::open_in_memory().unwrap();
    let pipeline = pipeline(&db, &honeypot);

    let report = pipeline.scrape(ArtifactKind::Attempt).unwrap();
    assert_eq!(report.files_scraped, 1);
    assert_eq!(report.records_inserted, 1);
    assert!(report.archive.as_ref().unwrap().exists());
    assert!(honeypot.root().join("logs/20150113.DONE").exists());

    let (user, success, external_id): (String, String, String) = db
        .connection()
        .query_row("SELECT user, success, external_id FROM attempts", [], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .unwrap();
    assert_eq!(user, "donaldduck");
    assert_eq!(success, "0");
    assert_eq!(external_id, "");

    let recorder = Arc::new(Recorder::default());
    let forwarded = pipeline
        .forward(ArtifactKind::Attempt, &Handle(recorder.clone()))
        .await
        .unwrap();
    assert_eq!(forwarded, 1);
    let external_id: String = db
        .connection()
        .query_row("SELECT external_id FROM attempts", [], |row| row.get(0))
        .unwrap();
    assert_eq!(external_id, "abc123");

    let pruned = pipeline.prune(ArtifactKind::Attempt).unwrap();
    assert_eq!(pruned.files_removed, 1);
    assert_eq!(pruned.rows_removed, 1);
    assert!(!file.exists());
    assert!(!honeypot.root().join("logs/20150113.DONE").exists());
    assert_eq!(db.records(ArtifactKind::Attempt).count_forwarded().unwrap(), 0);
}

#[tokio::test]
async fn test_run_twice_is_idempotent() {
    let honeypot = Honeypot::new();
    honeypot.populate_all_kinds();
    let db = LocalDb::open_in_memory().unwrap();
    let pipeline = pipeline(&db, &honeypot);
    let connector = Connector::new(Recorder::default());

    let first = pipeline.run(&connector).await.unwrap();
    let scraped: usize = first.scraped.iter().map(|(_, r)| r.records_inserted).sum();
    let forwarded: usize = first.forwarded.iter().map(|(_, n)| n).sum();
    let removed: usize = first.pruned.iter().map(|(_, r)| r.rows_removed).sum();
    assert_eq!(scraped, 7);
    assert_eq!(forwarded, 7);
    assert_eq!(removed, 7);
    assert_eq!(connector.recorder.count(), 7);
    assert_eq!(honeypot.archives().len(), 5);

    let kinds: Vec<_> = first.scraped.iter().map(|(k, _)| *k).collect();
    assert_eq!(kinds, ArtifactKind::ALL.to_vec());

    let second = pipeline.run(&connector).await.unwrap();
    assert!(second.scraped.iter().all(|(_, r)| r.files_scraped == 0));
    assert!(second.forwarded.iter().all(|(_, n)| *n == 0));
    assert!(second.pruned.iter().all(|(_, r)| r.rows_removed == 0 && r.files_removed == 0));
    assert_eq!(connector.recorder.count(), 7);
    assert_eq!(honeypot.archives().len(), 5);
}

#[tokio::test]
async fn test_forwarded_documents_carry_record_fields() {
    let honeypot = Honeypot::new();
    honeypot.populate_all_kinds();
    let db = LocalDb::open_in_memory().unwrap();
    let pipeline = pipeline(&db, &honeypot).without_archive();
    let connector = Connector::new(Recorder::default());

    pipeline.run(&connector).await.unwrap();

    let docs = connector.recorder.docs.lock().unwrap();
    let download = docs
        .iter()
        .find_map(|r| match r {
            Record::SessionDownloadFile(file) => Some(file.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(download.source_ip, "10.1.2.3");
    assert_eq!(download.origin_host, "phoebe");
    assert!(download.filename.ends_with("downloads/20150113-202300-evil.sh"));
    assert!(honeypot.archives().is_empty());
}

#[tokio::test]
async fn test_interrupted_run_resumes_without_duplicates() {
    let honeypot = Honeypot::new();
    honeypot.populate_all_kinds();
    let db = LocalDb::open_in_memory().unwrap();
    let pipeline = pipeline(&db, &honeypot);

    // Stop after the scrape phase of one kind
    pipeline.scrape(ArtifactKind::Log).unwrap();
    assert_eq!(db.records(ArtifactKind::Log).count_unforwarded().unwrap(), 2);

    let connector = Connector::new(Recorder::default());
    let report = pipeline.run(&connector).await.unwrap();

    let log_scrape = &report.scraped.iter().find(|(k, _)| *k == ArtifactKind::Log).unwrap().1;
    assert_eq!(log_scrape.files_scraped, 0);
    assert_eq!(connector.recorder.count(), 7);
}

#[tokio::test]
async fn test_forward_failure_keeps_remaining_rows_pending() {
    let honeypot = Honeypot::new();
    honeypot.write_old(
        "logs/honssh.log",
        b"2015-01-13 20:22:00 [-] one\n2015-01-13 20:22:01 [-] two\n2015-01-13 20:22:02 [-] three\n",
    );
    let db = LocalDb::open_in_memory().unwrap();
    let pipeline = pipeline(&db, &honeypot);
    pipeline.scrape(ArtifactKind::Log).unwrap();

    let flaky = Arc::new(Recorder::failing_after(1));
    let err = pipeline.forward(ArtifactKind::Log, &Handle(flaky.clone())).await;
    assert!(matches!(err, Err(Error::Index(_))));

    let store = db.records(ArtifactKind::Log);
    assert_eq!(store.count_forwarded().unwrap(), 1);
    assert_eq!(store.count_unforwarded().unwrap(), 2);

    let healthy = Arc::new(Recorder::default());
    let forwarded = pipeline
        .forward(ArtifactKind::Log, &Handle(healthy.clone()))
        .await
        .unwrap();
    assert_eq!(forwarded, 2);
    assert_eq!(store.count_unforwarded().unwrap(), 0);

    let messages: Vec<String> = healthy
        .docs
        .lock()
        .unwrap()
        .iter()
        .map(|r| match r {
            Record::LogEntry(entry) => entry.message.clone(),
            other => panic!("unexpected record {:?}", other),
        })
        .collect();
    assert_eq!(messages, vec!["two", "three"]);
}

#[tokio::test]
async fn test_failed_run_does_not_prune() {
    let honeypot = Honeypot::new();
    let file = honeypot.write_old("logs/20150113", ATTEMPT_LINE.as_bytes());
    let db = LocalDb::open_in_memory().unwrap();
    let pipeline = pipeline(&db, &honeypot);

    let connector = Connector::new(Recorder::failing_after(0));
    assert!(pipeline.run(&connector).await.is_err());

    assert!(file.exists());
    assert_eq!(db.records(ArtifactKind::Attempt).count_unforwarded().unwrap(), 1);
}

#[test]
fn test_empty_file_stays_pending() {
    let honeypot = Honeypot::new();
    honeypot.write_old("logs/20150113", b"");
    let db = LocalDb::open_in_memory().unwrap();
    let pipeline = pipeline(&db, &honeypot);

    for _ in 0..2 {
        let report = pipeline.scrape(ArtifactKind::Attempt).unwrap();
        assert_eq!(report.files_scraped, 0);
        assert_eq!(report.files_empty, 1);
        assert!(report.archive.is_none());
    }
    assert!(!honeypot.root().join("logs/20150113.DONE").exists());
    assert_eq!(db.records(ArtifactKind::Attempt).count_unforwarded().unwrap(), 0);
}

#[test]
fn test_unparseable_file_is_skipped_not_fatal() {
    let honeypot = Honeypot::new();
    honeypot.write_old(
        "sessions/10.1.2.3/20150113_202200_0.log",
        b"2015-01-13 20:22:00 - this long line has no channel at all\n",
    );
    honeypot.write_old(
        "sessions/10.9.9.9/20150113_210000_0.log",
        b"2015-01-13 21:00:00 - [TERM0] - Entered command: id\n",
    );
    let db = LocalDb::open_in_memory().unwrap();
    let pipeline = pipeline(&db, &honeypot);

    let report = pipeline.scrape(ArtifactKind::SessionLog).unwrap();
    assert_eq!(report.files_failed, 1);
    assert_eq!(report.files_scraped, 1);
    assert!(!honeypot
        .root()
        .join("sessions/10.1.2.3/20150113_202200_0.log.DONE")
        .exists());
}

#[test]
fn test_orphan_marker_is_ignored() {
    let honeypot = Honeypot::new();
    let marker = honeypot.write_old("logs/20150113.DONE", b"");
    let db = LocalDb::open_in_memory().unwrap();
    let pipeline = pipeline(&db, &honeypot);

    for kind in [ArtifactKind::Attempt, ArtifactKind::Log] {
        assert_eq!(pipeline.scrape(kind).unwrap().files_scraped, 0);
        assert_eq!(pipeline.prune(kind).unwrap().files_removed, 0);
    }
    assert!(marker.exists());
}

#[test]
fn test_recent_files_wait_for_the_cutoff() {
    let honeypot = Honeypot::new();
    let file = honeypot.write("logs/20150113", ATTEMPT_LINE.as_bytes());
    let db = LocalDb::open_in_memory().unwrap();

    let report = pipeline(&db, &honeypot).scrape(ArtifactKind::Attempt).unwrap();
    assert_eq!(report.files_scraped, 0);
    assert_eq!(report.files_empty + report.files_failed, 0);

    let later = SystemTime::now() + Duration::from_secs(60);
    let report = pipeline(&db, &honeypot)
        .with_cutoff(later)
        .scrape(ArtifactKind::Attempt)
        .unwrap();
    assert_eq!(report.files_scraped, 1);
    assert!(file.exists());
}

#[test]
fn test_missing_source_directory_is_fatal() {
    let honeypot = Honeypot::new();
    fs::remove_dir_all(honeypot.root().join("sessions")).unwrap();
    let db = LocalDb::open_in_memory().unwrap();
    let pipeline = pipeline(&db, &honeypot);

    assert!(matches!(
        pipeline.scrape(ArtifactKind::SessionRecording),
        Err(Error::NotADirectory(_))
    ));

    let status = pipeline.status().unwrap();
    let recordings = status
        .iter()
        .find(|s| s.kind == ArtifactKind::SessionRecording)
        .unwrap();
    assert_eq!(recordings.pending_files, None);
}

#[test]
fn test_status_counts() {
    let honeypot = Honeypot::new();
    honeypot.populate_all_kinds();
    honeypot.write_old("logs/20150114", ATTEMPT_LINE.as_bytes());
    let db = LocalDb::open_in_memory().unwrap();
    let pipeline = pipeline(&db, &honeypot).without_archive();

    pipeline.scrape(ArtifactKind::Attempt).unwrap();
    honeypot.write_old("logs/20150115", ATTEMPT_LINE.as_bytes());

    let status = pipeline.status().unwrap();
    let attempts = status.iter().find(|s| s.kind == ArtifactKind::Attempt).unwrap();
    assert_eq!(attempts.pending_files, Some(1));
    assert_eq!(attempts.done_files, Some(2));
    assert_eq!(attempts.unforwarded_rows, 2);
    assert_eq!(attempts.forwarded_rows, 0);
}
