//! # Workflows Module
//!
//! End-to-end procedures behind the command line. Each one wires together
//! file I/O, the database layer and the structure models so that callers only
//! deal with paths, connections and option structs.
//!
//! - **Import** ([`import`]) - Store a frame of a structure file as a new system
//! - **Conversion** ([`convert`]) - Convert, extract and export structure files

pub mod convert;
pub mod import;

pub use convert::{convert, extract, to_car};
pub use import::{ImportOptions, import_structure};

use crate::core::io::StructureIoError;
use crate::core::io::car::CarError;
use crate::db::repo::RepoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Structure(#[from] StructureIoError),
    #[error(transparent)]
    Car(#[from] CarError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<rusqlite::Error> for WorkflowError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(err))
    }
}
