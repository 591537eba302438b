//! # Engine Module
//!
//! The database-driven job manager and the readers for the files its jobs
//! produce.

pub mod manager;
pub mod results;

pub use manager::{
    GeometryUpdate, InsertJobs, InsertVibrationJobs, JobManager, NebOptions, NebOutcome, SkippedJob,
    SubmitContext, VibrationUpdate, WriteReport,
};

use crate::core::io::StructureIoError;
use crate::core::io::pwscf::PwscfError;
use crate::core::template::TemplateError;
use crate::db::repo::RepoError;
use crate::scheduler::SchedulerError;
use results::ResultsError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Structure(#[from] StructureIoError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Results(#[from] ResultsError),
    #[error(transparent)]
    Magnetization(#[from] PwscfError),
    #[error("Job '{job}' of system {system_id} has no template")]
    NoTemplate { job: String, system_id: i64 },
    #[error("Directory '{path}' of job '{job}' does not exist (write the job inputs first)", path = path.display())]
    MissingJobDirectory { job: String, path: PathBuf },
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<rusqlite::Error> for EngineError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
