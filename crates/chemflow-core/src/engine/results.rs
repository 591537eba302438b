//! Readers for the result files written by vibration jobs.

use crate::db::models::{SystemData, Vibration};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResultsError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid vibration energy on line {line}: '{text}'")]
    InvalidVibration { line: usize, text: String },
    #[error("Invalid thermochemistry summary '{path}': {source}")]
    InvalidThermo {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Unknown thermochemistry kind '{0}' (expected HarmonicThermo, CrystalThermo or IdealGasThermo)")]
    UnknownThermoKind(String),
    #[error("Thermochemistry of kind {kind} needs a value for '{field}'")]
    MissingThermoField { kind: &'static str, field: &'static str },
}

fn read_text(path: &Path) -> Result<String, ResultsError> {
    fs::read_to_string(path).map_err(|source| ResultsError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses vibration energies, one `real [imaginary]` pair in eV per line.
/// Blank lines and `#` comments are ignored.
pub fn parse_vibrations(text: &str) -> Result<Vec<Vibration>, ResultsError> {
    let mut vibrations = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let content = line.split('#').next().unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }
        let invalid = || ResultsError::InvalidVibration {
            line: i + 1,
            text: line.trim().to_string(),
        };
        let values: Vec<f64> = content
            .split_whitespace()
            .map(|t| t.parse::<f64>().map_err(|_| invalid()))
            .collect::<Result<_, _>>()?;
        let vibration = match values.as_slice() {
            [real] => Vibration {
                energy_real: *real,
                energy_imag: 0.0,
            },
            [real, imag] => Vibration {
                energy_real: *real,
                energy_imag: *imag,
            },
            _ => return Err(invalid()),
        };
        vibrations.push(vibration);
    }
    Ok(vibrations)
}

pub fn read_vibrations(path: impl AsRef<Path>) -> Result<Vec<Vibration>, ResultsError> {
    parse_vibrations(&read_text(path.as_ref())?)
}

/// Thermochemistry models a summary can come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermoKind {
    Harmonic,
    Crystal,
    IdealGas,
}

impl ThermoKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Harmonic => "HarmonicThermo",
            Self::Crystal => "CrystalThermo",
            Self::IdealGas => "IdealGasThermo",
        }
    }
}

impl FromStr for ThermoKind {
    type Err = ResultsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HarmonicThermo" => Ok(Self::Harmonic),
            "CrystalThermo" => Ok(Self::Crystal),
            "IdealGasThermo" => Ok(Self::IdealGas),
            other => Err(ResultsError::UnknownThermoKind(other.to_string())),
        }
    }
}

/// Thermochemistry evaluated at one temperature, energies in eV and entropy
/// in eV/K.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThermoSummary {
    pub kind: String,
    pub temperature: f64,
    pub entropy: f64,
    pub internal_energy: Option<f64>,
    pub enthalpy: Option<f64>,
    pub free_energy: f64,
}

impl ThermoSummary {
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ResultsError> {
        toml::from_str(text).map_err(|source| ResultsError::InvalidThermo {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ResultsError> {
        let path = path.as_ref();
        Self::from_toml_str(&read_text(path)?, path)
    }

    /// `<kind>@<temperature>` with two decimals, e.g. `HarmonicThermo@298.15`.
    pub fn label(&self) -> String {
        format!("{}@{:.2}", self.kind, self.temperature)
    }

    /// Stores the summary on a system.
    ///
    /// Harmonic and crystal models set the internal energy, the ideal gas
    /// model sets the enthalpy.
    pub fn apply_to(&self, data: &mut SystemData) -> Result<(), ResultsError> {
        let kind: ThermoKind = self.kind.parse()?;
        match kind {
            ThermoKind::Harmonic | ThermoKind::Crystal => {
                data.internal_energy = Some(self.internal_energy.ok_or(ResultsError::MissingThermoField {
                    kind: kind.name(),
                    field: "internal_energy",
                })?);
            }
            ThermoKind::IdealGas => {
                data.enthalpy = Some(self.enthalpy.ok_or(ResultsError::MissingThermoField {
                    kind: kind.name(),
                    field: "enthalpy",
                })?);
            }
        }
        data.entropy = Some(self.entropy);
        data.free_energy = Some(self.free_energy);
        data.thermo = Some(self.label());
        Ok(())
    }
}
