use chemflow::core::template::TemplateError;
use chemflow::db::DbError;
use chemflow::db::export::ExportError;
use chemflow::db::repo::RepoError;
use chemflow::engine::EngineError;
use chemflow::scheduler::SchedulerError;
use chemflow::workflows::WorkflowError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Repository(#[from] RepoError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for CliError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Repository(RepoError::from(err))
    }
}
