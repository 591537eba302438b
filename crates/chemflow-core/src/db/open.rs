//! Connection bootstrap for SQLite.
//!
//! Every connection handed out by this module has `foreign_keys=ON` (cascade
//! deletes depend on it), a busy timeout, and all migrations applied.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{error, info};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens (creating if needed) a SQLite database file and applies pending
/// migrations.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    let started_at = Instant::now();
    info!(path = %path.display(), "Opening database");

    let result = Connection::open(path)
        .map_err(DbError::from)
        .and_then(|mut conn| bootstrap_connection(&mut conn).map(|()| conn));
    log_outcome("file", started_at, &result);
    result
}

/// Opens a database file that must already exist.
///
/// # Errors
///
/// Returns [`DbError::Missing`] instead of silently creating an empty file.
pub fn open_existing_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(DbError::Missing(path.to_path_buf()));
    }
    open_db(path)
}

/// Opens an in-memory database with the full schema.
pub fn open_db_in_memory() -> DbResult<Connection> {
    let started_at = Instant::now();
    let result = Connection::open_in_memory()
        .map_err(DbError::from)
        .and_then(|mut conn| bootstrap_connection(&mut conn).map(|()| conn));
    log_outcome("memory", started_at, &result);
    result
}

fn log_outcome(mode: &str, started_at: Instant, result: &DbResult<Connection>) {
    let duration_ms = started_at.elapsed().as_millis();
    match result {
        Ok(_) => tracing::debug!(mode, duration_ms, "Database ready"),
        Err(err) => error!(mode, duration_ms, error = %err, "Failed to open database"),
    }
}

fn bootstrap_connection(conn: &mut Connection) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_db_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");
        assert!(matches!(open_existing_db(&path), Err(DbError::Missing(p)) if p == path));
        assert!(!path.exists());

        open_db(&path).unwrap();
        assert!(open_existing_db(&path).is_ok());
    }

    #[test]
    fn connections_enforce_foreign_keys() {
        let conn = open_db_in_memory().unwrap();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }
}
