//! Local staging store
//!
//! One SQLite connection per run, shared by the per-kind DAOs.

pub mod dao;
pub mod schema;

pub use dao::{RecordStore, StoredRow};

use crate::error::Result;
use crate::kind::ArtifactKind;
use rusqlite::Connection;
use std::path::Path;
use tracing::debug;

/// Handle on the staging database
pub struct LocalDb {
    conn: Connection,
}

impl LocalDb {
    /// Open (creating if needed) the database at `path` and apply the schema
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        schema::init_schema(&conn)?;
        debug!(path = %path.display(), "Opened local store");
        Ok(Self { conn })
    }

    /// In-memory database with the schema applied
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// DAO for the table of `kind`
    pub fn records(&self, kind: ArtifactKind) -> RecordStore<'_> {
        RecordStore::new(&self.conn, kind)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::record::tests::sample_attempt;

    #[test]
    fn test_open_creates_parent_dirs_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db/nested/pogo.db");

        {
            let db = LocalDb::open(&path).unwrap();
            db.records(ArtifactKind::Attempt)
                .insert_bulk(&[sample_attempt()])
                .unwrap();
        }

        let db = LocalDb::open(&path).unwrap();
        assert_eq!(db.records(ArtifactKind::Attempt).count_unforwarded().unwrap(), 1);
    }
}
