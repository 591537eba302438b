//! # chemflow Core Library
//!
//! Glue for computational chemistry campaigns: keep computed structures in a
//! relational database, render calculation inputs from templates and drive
//! PBS/SLURM batch jobs for them.
//!
//! ## Layout
//!
//! - **[`core`]: The Foundation.** Stateless data models (`MolecularSystem`,
//!   `Atom`, `Cell`), the element table, geometry helpers, structure file I/O
//!   and the placeholder template engine.
//!
//! - **[`db`]: Persistence.** SQLite bootstrap, schema migrations, record types
//!   and repositories for systems, atoms, jobs, calculators, templates and
//!   vibrations.
//!
//! - **[`scheduler`]: Batch Systems.** PBS/SLURM directive writers, site
//!   configuration, job-script generation and submission.
//!
//! - **[`engine`]: Job Management.** The database-driven `JobManager` that
//!   inserts, renders, submits and harvests calculation jobs.
//!
//! - **[`workflows`]: The Public API.** Small end-to-end procedures used by the
//!   command line, such as importing a structure file into the database.

pub mod core;
pub mod db;
pub mod engine;
pub mod scheduler;
pub mod workflows;
