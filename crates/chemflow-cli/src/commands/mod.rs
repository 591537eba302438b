pub mod calc;
pub mod convert;
pub mod db;
pub mod jobs;
pub mod submit;
pub mod template;

use crate::error::{CliError, Result};
use crate::utils::parser::ParseError;
use std::path::Path;

/// The login name recorded on new rows.
pub(crate) fn current_user() -> Option<String> {
    std::env::var("USER").ok().filter(|u| !u.is_empty())
}

pub(crate) fn argument_error(err: ParseError) -> CliError {
    CliError::Argument(err.to_string())
}

/// Writes `text` to `output`, or to standard output when no path is given.
pub(crate) fn emit(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text)?;
            println!("Wrote {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}
