// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persistent surface backed by SQLite.
//
// Schema:
//   kv_store(
//     key        TEXT PRIMARY KEY,
//     value      TEXT NOT NULL,
//     updated_at TEXT NOT NULL   -- RFC 3339
//   )

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use safehold_core::error::{Result, SafeholdError};
use tracing::{debug, instrument};

use crate::traits::KeyValueSurface;

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS kv_store (
        key        TEXT PRIMARY KEY,
        value      TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
"#;

/// Convert a `rusqlite::Error` into a `SafeholdError::Database`.
fn db_err(e: rusqlite::Error) -> SafeholdError {
    SafeholdError::Database(e.to_string())
}

/// Key/value surface stored in a single SQLite table.
///
/// `rusqlite::Connection` is `Send` but not `Sync`, so it lives behind a
/// mutex.  All statements are short single-row operations.
pub struct SqliteSurface {
    conn: Mutex<Connection>,
}

impl SqliteSurface {
    /// Open (or create) the surface database at `path`.
    ///
    /// WAL mode is enabled so readers are not blocked by a writer.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(db_err)?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| SafeholdError::Database(format!("WAL pragma: {e}")))?;

        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| SafeholdError::Database(format!("create table: {e}")))?;

        debug!("sqlite surface opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;

        debug!("in-memory sqlite surface opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SafeholdError::StorageUnavailable("sqlite surface lock poisoned".into()))
    }
}

impl KeyValueSurface for SqliteSurface {
    fn surface_name(&self) -> &str {
        "sqlite"
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn()?
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let updated_at = Utc::now().to_rfc3339();
        self.conn()?
            .execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at",
                params![key, value, updated_at],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])
            .map_err(db_err)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let removed = self
            .conn()?
            .execute("DELETE FROM kv_store", [])
            .map_err(db_err)?;
        debug!(removed, "sqlite surface cleared");
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT key FROM kv_store ORDER BY key ASC")
            .map_err(db_err)?;

        let rows = stmt.query_map([], |row| row.get(0)).map_err(db_err)?;

        let mut keys = Vec::new();
        for row in rows {
            keys.push(row.map_err(db_err)?);
        }
        Ok(keys)
    }
}
