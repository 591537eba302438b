use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PwscfError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid magnetization value on line {line}: '{text}'")]
    InvalidValue { line: usize, text: String },
    #[error("Log reports a total magnetization but no absolute magnetization")]
    MissingAbsolute,
}

/// Magnetization of the final SCF step, in Bohr magnetons per cell.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Magnetization {
    pub total: f64,
    pub absolute: f64,
}

fn magnetization_value(line: &str, line_num: usize) -> Result<f64, PwscfError> {
    let after_equals = line.rsplit('=').next().unwrap_or(line);
    let number = after_equals.split("Bohr").next().unwrap_or(after_equals).trim();
    number.parse().map_err(|_| PwscfError::InvalidValue {
        line: line_num,
        text: line.trim().to_string(),
    })
}

/// Scans a PWscf log and returns the last reported magnetization.
///
/// A log without any magnetization lines (a non-spin-polarized run) yields
/// zero for both values.
pub fn parse_magnetization(reader: impl BufRead) -> Result<Magnetization, PwscfError> {
    let mut total = None;
    let mut absolute = None;

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.contains("total magnetization") {
            total = Some(magnetization_value(&line, i + 1)?);
        } else if line.contains("absolute magnetization") {
            absolute = Some(magnetization_value(&line, i + 1)?);
        }
    }

    match (total, absolute) {
        (None, _) => Ok(Magnetization::default()),
        (Some(_), None) => Err(PwscfError::MissingAbsolute),
        (Some(total), Some(absolute)) => Ok(Magnetization { total, absolute }),
    }
}

pub fn read_magnetization(path: impl AsRef<Path>) -> Result<Magnetization, PwscfError> {
    parse_magnetization(BufReader::new(File::open(path)?))
}
