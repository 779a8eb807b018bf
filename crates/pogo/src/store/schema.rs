//! SQLite schema for the local staging store

use crate::error::Result;
use rusqlite::Connection;

/// Create every staging table and its index when absent
pub fn init_schema(conn: &Connection) -> Result<()> {
    // Login attempts
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS attempts (
            local_id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id TEXT NOT NULL DEFAULT '',
            timestamp TEXT NOT NULL,
            origin_host TEXT NOT NULL,

            source_ip TEXT NOT NULL DEFAULT '',
            user TEXT NOT NULL DEFAULT '',
            password TEXT NOT NULL DEFAULT '',
            success TEXT NOT NULL DEFAULT '0',

            country_code TEXT NOT NULL DEFAULT '',
            country_name TEXT NOT NULL DEFAULT ''
        )
        "#,
        [],
    )?;

    // Honeypot log lines
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS log_msg (
            local_id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id TEXT NOT NULL DEFAULT '',
            timestamp TEXT NOT NULL,
            origin_host TEXT NOT NULL,

            server_info TEXT NOT NULL DEFAULT '',
            message TEXT NOT NULL DEFAULT ''
        )
        "#,
        [],
    )?;

    // Session log lines
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS session_log_records (
            local_id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id TEXT NOT NULL DEFAULT '',
            timestamp TEXT NOT NULL,
            origin_host TEXT NOT NULL,

            source_ip TEXT NOT NULL DEFAULT '',
            country_code TEXT NOT NULL DEFAULT '',
            country_name TEXT NOT NULL DEFAULT '',

            channel TEXT NOT NULL DEFAULT '',
            message TEXT NOT NULL DEFAULT ''
        )
        "#,
        [],
    )?;

    // Session recordings, contents as base64
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS session_recordings (
            local_id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id TEXT NOT NULL DEFAULT '',
            timestamp TEXT NOT NULL,
            origin_host TEXT NOT NULL,

            source_ip TEXT NOT NULL DEFAULT '',
            country_code TEXT NOT NULL DEFAULT '',
            country_name TEXT NOT NULL DEFAULT '',

            filename TEXT NOT NULL DEFAULT '',
            contents TEXT NOT NULL DEFAULT ''
        )
        "#,
        [],
    )?;

    // Downloaded files, contents as base64
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS session_downloads (
            local_id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id TEXT NOT NULL DEFAULT '',
            timestamp TEXT NOT NULL,
            origin_host TEXT NOT NULL,

            source_ip TEXT NOT NULL DEFAULT '',
            country_code TEXT NOT NULL DEFAULT '',
            country_name TEXT NOT NULL DEFAULT '',

            filename TEXT NOT NULL DEFAULT '',
            contents TEXT NOT NULL DEFAULT ''
        )
        "#,
        [],
    )?;

    // Forward and prune both select on external_id
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attempts_external ON attempts(external_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_log_msg_external ON log_msg(external_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_session_log_records_external ON session_log_records(external_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_session_recordings_external ON session_recordings(external_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_session_downloads_external ON session_downloads(external_id)",
        [],
    )?;

    Ok(())
}
