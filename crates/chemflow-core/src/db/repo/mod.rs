//! Repository contracts and their SQLite implementations.
//!
//! Each entity has a `XRepository` trait and a `SqliteXRepository<'conn>`
//! borrowing a connection (or an open transaction, which derefs to one).
//! Multi-statement writes run inside a savepoint so a failure leaves no
//! partial rows behind.

mod properties;

pub mod calculator;
pub mod job;
pub mod system;
pub mod template;
pub mod vibration;

pub use calculator::{CalculatorRepository, SqliteCalculatorRepository};
pub use job::{JobQuery, JobRepository, SqliteJobRepository};
pub use system::{SqliteSystemRepository, SystemQuery, SystemRepository};
pub use template::{SqliteTemplateRepository, TemplateRepository};
pub use vibration::{SqliteVibrationRepository, VibrationRepository};

use crate::db::DbError;
use thiserror::Error;

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    #[error("{count} {entity} records match '{key}', expected exactly one")]
    Ambiguous {
        entity: &'static str,
        key: String,
        count: usize,
    },
    #[error("Invalid persisted data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl RepoError {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}

/// Reduces a name lookup to exactly one record.
pub(crate) fn exactly_one<T>(mut records: Vec<T>, entity: &'static str, key: &str) -> RepoResult<T> {
    match records.len() {
        0 => Err(RepoError::not_found(entity, key)),
        1 => Ok(records.remove(0)),
        count => Err(RepoError::Ambiguous {
            entity,
            key: key.to_string(),
            count,
        }),
    }
}
