//! Operation history: SQLite log of sends and vault mutations.
//!
//! Stored at `<app_dir>/history.db`.  Every send records its outcome
//! (`ok`, or `failed:<stage>` with the error text); every vault change
//! records which `(service, account)` it touched, never the value.
//!
//! Logging is best-effort: if the database can't be opened or written
//! to, the operation that triggered it carries on.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::config::AppConfig;
use crate::errors::{RmailError, Result};

/// Status recorded for a successful operation.
pub const STATUS_OK: &str = "ok";

/// Status string for a failed operation.
pub fn failure_status(err: &RmailError) -> String {
    format!("failed:{}", err.stage())
}

/// A single history entry.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub target: String,
    pub status: String,
    pub details: Option<String>,
}

/// SQLite-backed history log.
pub struct HistoryLog {
    conn: Connection,
}

impl HistoryLog {
    /// Open (or create) the history database at `path`.
    ///
    /// Returns `None` if it can't be opened; callers treat that as
    /// "history unavailable" and continue.
    pub fn open(path: &Path) -> Option<Self> {
        let conn = match Connection::open(path) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "history unavailable");
                return None;
            }
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(path, perms);
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS history (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                operation TEXT NOT NULL,
                target    TEXT NOT NULL,
                status    TEXT NOT NULL,
                details   TEXT
            );",
        )
        .ok()?;

        Some(Self { conn })
    }

    /// Record an operation.  Errors are logged and dropped.
    pub fn log(&self, operation: &str, target: &str, status: &str, details: Option<&str>) {
        let now = Utc::now().to_rfc3339();
        if let Err(e) = self.conn.execute(
            "INSERT INTO history (timestamp, operation, target, status, details)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![now, operation, target, status, details],
        ) {
            tracing::debug!(error = %e, operation, "failed to write history entry");
        }
    }

    /// Most recent entries first, at most `limit`, optionally only those
    /// at or after `since`.
    pub fn query(&self, limit: usize, since: Option<DateTime<Utc>>) -> Result<Vec<HistoryEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        // An absent bound is the epoch; RFC 3339 UTC strings sort lexically.
        let since = since.map_or_else(|| DateTime::<Utc>::UNIX_EPOCH.to_rfc3339(), |ts| ts.to_rfc3339());

        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, timestamp, operation, target, status, details
                 FROM history
                 WHERE timestamp >= ?1
                 ORDER BY id DESC
                 LIMIT ?2",
            )
            .map_err(|e| RmailError::HistoryError(format!("query prepare: {e}")))?;

        let rows = stmt
            .query_map(rusqlite::params![since, limit], |row| {
                let ts: String = row.get(1)?;
                let timestamp = DateTime::parse_from_rfc3339(&ts)
                    .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

                Ok(HistoryEntry {
                    id: row.get(0)?,
                    timestamp,
                    operation: row.get(2)?,
                    target: row.get(3)?,
                    status: row.get(4)?,
                    details: row.get(5)?,
                })
            })
            .map_err(|e| RmailError::HistoryError(format!("query exec: {e}")))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(|e| RmailError::HistoryError(format!("row parse: {e}")))?);
        }

        Ok(entries)
    }
}

/// Log one event to the configured history database, ignoring failures.
pub fn record(config: &AppConfig, operation: &str, target: &str, status: &str, details: Option<&str>) {
    if !config.app_dir.is_dir() {
        return;
    }
    if let Some(history) = HistoryLog::open(&config.history_path) {
        history.log(operation, target, status, details);
    }
}
