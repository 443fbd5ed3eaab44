// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Audit trail: append-only SQLite log of security events (tamper purges,
// rate-limit denials, rejected uploads).
//
// Schema:
//   security_events(
//     id        INTEGER PRIMARY KEY AUTOINCREMENT,
//     timestamp TEXT    NOT NULL,   -- RFC 3339
//     event     TEXT    NOT NULL,   -- see `SecurityEvent`
//     subject   TEXT    NOT NULL,   -- storage key, limiter key, or file name
//     details   TEXT                -- optional free-form context
//   )
//
// Subjects and details never contain payloads or key material.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{Connection, params};
use safehold_core::error::{Result, SafeholdError};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS security_events (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT    NOT NULL,
    event     TEXT    NOT NULL,
    subject   TEXT    NOT NULL,
    details   TEXT
);";

/// Convert a `rusqlite::Error` into a `SafeholdError::Database`.
fn db_err(e: rusqlite::Error) -> SafeholdError {
    SafeholdError::Database(e.to_string())
}

/// Kinds of events worth keeping a durable record of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEvent {
    /// A stored entry failed decryption or tag verification and was purged.
    TamperPurge,
    /// A rate-limited action was denied.
    RateLimited,
    /// The rate limiter could not reach the store and applied its failure policy.
    RateLimiterDegraded,
    /// An upload was rejected by the content validator.
    UploadRejected,
}

impl SecurityEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TamperPurge => "tamper_purge",
            Self::RateLimited => "rate_limited",
            Self::RateLimiterDegraded => "rate_limiter_degraded",
            Self::UploadRejected => "upload_rejected",
        }
    }
}

/// A single entry in the audit log, used for queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: String,
    pub event: String,
    pub subject: String,
    pub details: Option<String>,
}

/// Append-only audit log backed by a SQLite database.
///
/// The connection sits behind a mutex so a single log can be shared by the
/// store, the rate limiter, and upload handling.
pub struct AuditLog {
    conn: Mutex<Connection>,
}

impl AuditLog {
    /// Open (or create) the audit database at `path`, with WAL enabled.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;

        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;

        debug!("audit log opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory audit database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;

        debug!("in-memory audit log opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SafeholdError::StorageUnavailable("audit log lock poisoned".into()))
    }

    /// Record a new audit entry.
    #[instrument(skip_all, fields(event = event.as_str(), %subject))]
    pub fn record(&self, event: SecurityEvent, subject: &str, details: Option<&str>) -> Result<()> {
        let timestamp = Utc::now().to_rfc3339();

        self.conn()?
            .execute(
                "INSERT INTO security_events (timestamp, event, subject, details)
                 VALUES (?1, ?2, ?3, ?4)",
                params![timestamp, event.as_str(), subject, details],
            )
            .map_err(db_err)?;

        debug!("audit entry recorded");
        Ok(())
    }

    /// Retrieve all entries for a subject, oldest first.
    pub fn entries_for_subject(&self, subject: &str) -> Result<Vec<AuditEntry>> {
        self.query(
            "SELECT id, timestamp, event, subject, details
             FROM security_events
             WHERE subject = ?1
             ORDER BY id ASC",
            params![subject],
        )
    }

    /// Retrieve the most recent `limit` entries, newest first.
    pub fn recent_entries(&self, limit: u32) -> Result<Vec<AuditEntry>> {
        self.query(
            "SELECT id, timestamp, event, subject, details
             FROM security_events
             ORDER BY id DESC
             LIMIT ?1",
            params![limit],
        )
    }

    /// Return the total number of entries in the audit log.
    pub fn count(&self) -> Result<u64> {
        self.conn()?
            .query_row("SELECT COUNT(*) FROM security_events", [], |row| row.get(0))
            .map_err(db_err)
    }

    fn query(&self, sql: &str, args: impl rusqlite::Params) -> Result<Vec<AuditEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).map_err(db_err)?;

        let rows = stmt
            .query_map(args, |row| {
                Ok(AuditEntry {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    event: row.get(2)?,
                    subject: row.get(3)?,
                    details: row.get(4)?,
                })
            })
            .map_err(db_err)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(db_err)?);
        }
        Ok(entries)
    }
}
