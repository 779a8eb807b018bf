//! Per-kind access to the staging tables
//!
//! A row is pending forward while `external_id` is empty. The id assigned by
//! the search index is written exactly once, and only forwarded rows are ever
//! deleted. Every write runs in its own transaction; on error the
//! transaction is dropped, which rolls it back.

use crate::error::{Error, Result};
use crate::kind::ArtifactKind;
use crate::record::Record;
use rusqlite::{params, params_from_iter, Connection};

/// Statements for one staging table
#[derive(Debug)]
pub struct KindSql {
    pub insert: &'static str,
    pub select_unforwarded: &'static str,
    pub mark_forwarded: &'static str,
    pub delete_forwarded: &'static str,
    pub count_unforwarded: &'static str,
    pub count_forwarded: &'static str,
}

// ============================================================================
// Statements
// ============================================================================

const ATTEMPT_SQL: KindSql = KindSql {
    insert: "INSERT INTO attempts (timestamp, origin_host, source_ip, user, password, success, country_code, country_name) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    select_unforwarded: "SELECT local_id, external_id, timestamp, origin_host, source_ip, user, password, success, country_code, country_name FROM attempts WHERE external_id = '' ORDER BY local_id",
    mark_forwarded: "UPDATE attempts SET external_id = ?1 WHERE local_id = ?2 AND external_id = ''",
    delete_forwarded: "DELETE FROM attempts WHERE external_id != ''",
    count_unforwarded: "SELECT COUNT(*) FROM attempts WHERE external_id = ''",
    count_forwarded: "SELECT COUNT(*) FROM attempts WHERE external_id != ''",
};

const LOG_SQL: KindSql = KindSql {
    insert: "INSERT INTO log_msg (timestamp, origin_host, server_info, message) VALUES (?1, ?2, ?3, ?4)",
    select_unforwarded: "SELECT local_id, external_id, timestamp, origin_host, server_info, message FROM log_msg WHERE external_id = '' ORDER BY local_id",
    mark_forwarded: "UPDATE log_msg SET external_id = ?1 WHERE local_id = ?2 AND external_id = ''",
    delete_forwarded: "DELETE FROM log_msg WHERE external_id != ''",
    count_unforwarded: "SELECT COUNT(*) FROM log_msg WHERE external_id = ''",
    count_forwarded: "SELECT COUNT(*) FROM log_msg WHERE external_id != ''",
};

const SESSION_LOG_SQL: KindSql = KindSql {
    insert: "INSERT INTO session_log_records (timestamp, origin_host, source_ip, country_code, country_name, channel, message) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    select_unforwarded: "SELECT local_id, external_id, timestamp, origin_host, source_ip, country_code, country_name, channel, message FROM session_log_records WHERE external_id = '' ORDER BY local_id",
    mark_forwarded: "UPDATE session_log_records SET external_id = ?1 WHERE local_id = ?2 AND external_id = ''",
    delete_forwarded: "DELETE FROM session_log_records WHERE external_id != ''",
    count_unforwarded: "SELECT COUNT(*) FROM session_log_records WHERE external_id = ''",
    count_forwarded: "SELECT COUNT(*) FROM session_log_records WHERE external_id != ''",
};

const SESSION_RECORDING_SQL: KindSql = KindSql {
    insert: "INSERT INTO session_recordings (timestamp, origin_host, source_ip, country_code, country_name, filename, contents) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    select_unforwarded: "SELECT local_id, external_id, timestamp, origin_host, source_ip, country_code, country_name, filename, contents FROM session_recordings WHERE external_id = '' ORDER BY local_id",
    mark_forwarded: "UPDATE session_recordings SET external_id = ?1 WHERE local_id = ?2 AND external_id = ''",
    delete_forwarded: "DELETE FROM session_recordings WHERE external_id != ''",
    count_unforwarded: "SELECT COUNT(*) FROM session_recordings WHERE external_id = ''",
    count_forwarded: "SELECT COUNT(*) FROM session_recordings WHERE external_id != ''",
};

const SESSION_DOWNLOAD_SQL: KindSql = KindSql {
    insert: "INSERT INTO session_downloads (timestamp, origin_host, source_ip, country_code, country_name, filename, contents) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    select_unforwarded: "SELECT local_id, external_id, timestamp, origin_host, source_ip, country_code, country_name, filename, contents FROM session_downloads WHERE external_id = '' ORDER BY local_id",
    mark_forwarded: "UPDATE session_downloads SET external_id = ?1 WHERE local_id = ?2 AND external_id = ''",
    delete_forwarded: "DELETE FROM session_downloads WHERE external_id != ''",
    count_unforwarded: "SELECT COUNT(*) FROM session_downloads WHERE external_id = ''",
    count_forwarded: "SELECT COUNT(*) FROM session_downloads WHERE external_id != ''",
};

/// Statements for `kind`
pub fn sql_for(kind: ArtifactKind) -> &'static KindSql {
    match kind {
        ArtifactKind::Attempt => &ATTEMPT_SQL,
        ArtifactKind::Log => &LOG_SQL,
        ArtifactKind::SessionLog => &SESSION_LOG_SQL,
        ArtifactKind::SessionRecording => &SESSION_RECORDING_SQL,
        ArtifactKind::SessionDownload => &SESSION_DOWNLOAD_SQL,
    }
}

/// A staged record and its bookkeeping columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub local_id: i64,
    /// Empty until the row has been forwarded
    pub external_id: String,
    pub record: Record,
}

/// DAO bound to the table of one kind
pub struct RecordStore<'c> {
    conn: &'c Connection,
    kind: ArtifactKind,
    sql: &'static KindSql,
}

impl<'c> RecordStore<'c> {
    pub fn new(conn: &'c Connection, kind: ArtifactKind) -> Self {
        Self {
            conn,
            kind,
            sql: sql_for(kind),
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// Insert all records or none of them
    pub fn insert_bulk(&self, records: &[Record]) -> Result<usize> {
        if let Some(other) = records.iter().find(|r| r.kind() != self.kind) {
            return Err(Error::inconsistent(format!(
                "{} record offered to the {} table",
                other.kind(),
                self.kind.table_name()
            )));
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(self.sql.insert)?;
            for record in records {
                inserted += stmt.execute(params_from_iter(record.insert_values()))?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Rows not yet forwarded, oldest first
    pub fn list_unforwarded(&self) -> Result<Vec<StoredRow>> {
        let width = self.kind.insert_fields().len();
        let mut stmt = self.conn.prepare_cached(self.sql.select_unforwarded)?;
        let raw = stmt
            .query_map([], |row| {
                let local_id: i64 = row.get(0)?;
                let external_id: String = row.get(1)?;
                let values = (0..width)
                    .map(|i| row.get::<_, String>(i + 2))
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok((local_id, external_id, values))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        raw.into_iter()
            .map(|(local_id, external_id, values)| {
                Ok(StoredRow {
                    local_id,
                    external_id,
                    record: Record::from_values(self.kind, values)?,
                })
            })
            .collect()
    }

    /// Record the index id of one pending row
    ///
    /// Fails when the row does not exist or was already forwarded.
    pub fn mark_forwarded(&self, local_id: i64, external_id: &str) -> Result<()> {
        if external_id.trim().is_empty() {
            return Err(Error::inconsistent(format!(
                "empty index id for {} row {}",
                self.kind, local_id
            )));
        }

        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(self.sql.mark_forwarded, params![external_id, local_id])?;
        if changed != 1 {
            return Err(Error::inconsistent(format!(
                "{} row {} is missing or already forwarded",
                self.kind, local_id
            )));
        }
        tx.commit()?;
        Ok(())
    }

    /// Delete every forwarded row
    pub fn delete_forwarded(&self) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let deleted = tx.execute(self.sql.delete_forwarded, [])?;
        tx.commit()?;
        Ok(deleted)
    }

    pub fn count_unforwarded(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row(self.sql.count_unforwarded, [], |row| row.get(0))?)
    }

    pub fn count_forwarded(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row(self.sql.count_forwarded, [], |row| row.get(0))?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::record::tests::{sample_attempt, ts};
    use crate::record::LogRecord;
    use crate::store::schema::init_schema;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn attempt(user: &str) -> Record {
        let Record::Attempt(mut a) = sample_attempt() else {
            unreachable!()
        };
        a.user = user.to_string();
        Record::Attempt(a)
    }

    #[test]
    fn test_statements_follow_insert_fields() {
        for kind in ArtifactKind::ALL {
            let sql = sql_for(kind);
            let columns = kind.insert_fields().join(", ");
            assert!(
                sql.insert
                    .contains(&format!("{} ({})", kind.table_name(), columns)),
                "{}",
                kind
            );
            assert!(sql
                .select_unforwarded
                .contains(&format!("local_id, external_id, {} FROM {}", columns, kind.table_name())));
        }
    }

    #[test]
    fn test_insert_then_list_round_trip() {
        let conn = conn();
        let store = RecordStore::new(&conn, ArtifactKind::Attempt);

        let records = vec![attempt("donaldduck"), attempt("daisy")];
        assert_eq!(store.insert_bulk(&records).unwrap(), 2);

        let rows = store.list_unforwarded().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].local_id < rows[1].local_id);
        assert_eq!(rows[0].external_id, "");
        assert_eq!(rows[0].record, records[0]);
        assert_eq!(rows[1].record, records[1]);
    }

    #[test]
    fn test_insert_bulk_is_atomic() {
        let conn = conn();
        conn.execute_batch(
            "CREATE TRIGGER reject_bad BEFORE INSERT ON attempts
             WHEN NEW.user = 'bad'
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .unwrap();
        let store = RecordStore::new(&conn, ArtifactKind::Attempt);

        let err = store.insert_bulk(&[attempt("good"), attempt("bad"), attempt("also good")]);
        assert!(matches!(err, Err(Error::Storage(_))));
        assert_eq!(store.count_unforwarded().unwrap(), 0);
    }

    #[test]
    fn test_insert_rejects_other_kinds() {
        let conn = conn();
        let store = RecordStore::new(&conn, ArtifactKind::Log);
        assert!(store.insert_bulk(&[sample_attempt()]).is_err());
        assert_eq!(store.count_unforwarded().unwrap(), 0);
    }

    #[test]
    fn test_mark_forwarded_exactly_once() {
        let conn = conn();
        let store = RecordStore::new(&conn, ArtifactKind::Attempt);
        store.insert_bulk(&[attempt("donaldduck")]).unwrap();
        let row = store.list_unforwarded().unwrap().remove(0);

        store.mark_forwarded(row.local_id, "abc123").unwrap();
        assert!(store.list_unforwarded().unwrap().is_empty());
        assert_eq!(store.count_forwarded().unwrap(), 1);

        // Already forwarded
        assert!(store.mark_forwarded(row.local_id, "def456").is_err());
        let id: String = conn
            .query_row(
                "SELECT external_id FROM attempts WHERE local_id = ?1",
                [row.local_id],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(id, "abc123");

        // Unknown row
        assert!(store.mark_forwarded(9999, "x").is_err());
        // Blank id
        assert!(store.mark_forwarded(row.local_id, " ").is_err());
    }

    #[test]
    fn test_delete_only_forwarded_rows() {
        let conn = conn();
        let store = RecordStore::new(&conn, ArtifactKind::Attempt);
        store
            .insert_bulk(&[attempt("a"), attempt("b"), attempt("c")])
            .unwrap();
        let rows = store.list_unforwarded().unwrap();
        store.mark_forwarded(rows[0].local_id, "id-a").unwrap();
        store.mark_forwarded(rows[2].local_id, "id-c").unwrap();

        assert_eq!(store.delete_forwarded().unwrap(), 2);
        assert_eq!(store.delete_forwarded().unwrap(), 0);

        let left = store.list_unforwarded().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].local_id, rows[1].local_id);
    }

    #[test]
    fn test_tables_are_independent() {
        let conn = conn();
        let attempts = RecordStore::new(&conn, ArtifactKind::Attempt);
        let logs = RecordStore::new(&conn, ArtifactKind::Log);

        attempts.insert_bulk(&[attempt("a")]).unwrap();
        logs.insert_bulk(&[Record::LogEntry(LogRecord {
            timestamp: ts("2015-01-13 20:22:00"),
            origin_host: "phoebe".to_string(),
            server_info: "[-]".to_string(),
            message: "hello".to_string(),
        })])
        .unwrap();

        assert_eq!(attempts.count_unforwarded().unwrap(), 1);
        assert_eq!(logs.count_unforwarded().unwrap(), 1);
    }
}
