//! # Scheduler Module
//!
//! Batch job scripts for PBS and SLURM clusters and their submission.
//!
//! - **Dialects** ([`batch`]) - Directive writers and submit executables per batch system
//! - **Requests** ([`request`]) - Resources and files of one submission
//! - **Site** ([`site`]) - TOML description of the cluster environment and programs
//! - **Scripts** ([`script`]) - Job-script rendering
//! - **Submission** ([`submit`]) - Running `qsub`/`sbatch` and keeping the ledger

pub mod batch;
pub mod request;
pub mod script;
pub mod site;
pub mod submit;

pub use batch::BatchSystem;
pub use request::SubmitRequest;
pub use site::{JobSpec, SiteConfig};
pub use submit::{CommandSubmitter, ExistingScript, SubmitOutcome, Submitter, write_and_submit};

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Support for batch system '{name}' is not implemented, supported batch systems are: {}", .supported.join(", "))]
    UnsupportedBatch { name: String, supported: Vec<String> },
    #[error("No job specification for program '{program}' (known programs: {})", .known.join(", "))]
    UnknownProgram { program: String, known: Vec<String> },
    #[error("Unknown placeholder '{{{key}}}' in command: {command}")]
    UnknownCommandKey { key: String, command: String },
    #[error("Scratch staging was requested but the site configuration defines no scratch directory")]
    NoScratchDir,
    #[error("Failed to parse site configuration '{path}': {source}")]
    SiteConfig {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to run '{executable}': {source}")]
    Spawn {
        executable: String,
        #[source]
        source: io::Error,
    },
    #[error("'{executable}' exited with {status}: {stderr}")]
    SubmitFailed {
        executable: String,
        status: String,
        stderr: String,
    },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
