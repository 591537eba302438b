//! Resolution of submission settings from the command line, the user's
//! configuration file and built-in defaults, in that order of precedence.

pub mod builder;
pub mod defaults;
pub mod file;

pub use builder::{SubmitSettings, build_submit_settings};
pub use defaults::DefaultsConfig;
