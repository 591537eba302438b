//! # Database Module
//!
//! SQLite persistence for systems, atoms, jobs, calculators, templates and
//! vibrations.
//!
//! - **Bootstrap** ([`open`]) - Connections with foreign keys, busy timeout and migrations applied
//! - **Schema** ([`migrations`]) - Ordered embedded SQL tracked by `PRAGMA user_version`
//! - **Records** ([`models`]) - Plain row types and the vertical property value
//! - **Repositories** ([`repo`]) - Trait-based CRUD per entity with SQLite implementations
//! - **Conversion** ([`convert`]) - `MolecularSystem` to and from stored records
//! - **Export** ([`export`]) - CSV dumps of the known tables

pub mod convert;
pub mod export;
pub mod migrations;
pub mod models;
pub mod open;
pub mod repo;

pub use open::{open_db, open_db_in_memory, open_existing_db};

use rusqlite::Connection;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error(
        "Database schema version {db_version} is newer than the latest supported version {latest_supported}"
    )]
    UnsupportedSchemaVersion { db_version: u32, latest_supported: u32 },
    #[error("Database '{0}' does not exist (run `chemflow db init` first)")]
    Missing(PathBuf),
}

pub type DbResult<T> = Result<T, DbError>;

/// Runs `f` inside a named savepoint, rolling back everything it wrote when it
/// fails.
///
/// Savepoints nest inside an enclosing transaction, so repository methods can
/// group their statements without requiring a `&mut Connection`.
pub(crate) fn with_savepoint<T, E>(
    conn: &Connection,
    name: &str,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E>
where
    E: From<rusqlite::Error>,
{
    conn.execute_batch(&format!("SAVEPOINT {name};"))?;
    match f() {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {name};"))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = conn.execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name};")) {
                tracing::error!(savepoint = name, error = %rollback, "Failed to roll back savepoint");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_savepoint_discards_its_writes() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v INTEGER);").unwrap();

        let result: Result<(), rusqlite::Error> = with_savepoint(&conn, "sp_test", || {
            conn.execute("INSERT INTO t (v) VALUES (1)", [])?;
            conn.execute("INSERT INTO missing_table (v) VALUES (2)", [])?;
            Ok(())
        });
        assert!(result.is_err());

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn successful_savepoint_keeps_its_writes() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v INTEGER);").unwrap();
        with_savepoint(&conn, "sp_test", || -> Result<(), rusqlite::Error> {
            conn.execute("INSERT INTO t (v) VALUES (1)", [])?;
            Ok(())
        })
        .unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
    }
}
