//! Record types stored in and loaded from the database.

use crate::core::template::{Template, TemplateValue};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub type RecordId = i64;

/// A value of a vertical key/value property (system notes, calculator
/// attributes). The `kind` column of a property row selects which of the
/// typed value columns is populated.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Null,
}

impl PropertyValue {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bool(_) => "bool",
            Self::Null => "null",
        }
    }

    /// Rebuilds a value from the columns of a property row.
    ///
    /// Returns `None` for an unknown kind or when the column the kind points
    /// at is empty.
    pub(crate) fn from_columns(
        kind: &str,
        int_value: Option<i64>,
        float_value: Option<f64>,
        text_value: Option<String>,
        bool_value: Option<bool>,
    ) -> Option<Self> {
        match kind {
            "int" => int_value.map(Self::Int),
            "float" => float_value.map(Self::Float),
            "text" => text_value.map(Self::Text),
            "bool" => bool_value.map(Self::Bool),
            "null" => Some(Self::Null),
            _ => None,
        }
    }

    /// Interprets a command-line literal (`pw=500`, `xc=PBE`, `spinpol=true`).
    pub fn parse_literal(value: &str) -> Self {
        match TemplateValue::parse_literal(value) {
            TemplateValue::Int(i) => Self::Int(i),
            TemplateValue::Float(x) => Self::Float(x),
            TemplateValue::Bool(b) => Self::Bool(b),
            TemplateValue::None => Self::Null,
            TemplateValue::Text(s) | TemplateValue::Raw(s) => Self::Text(s),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Null => f.write_str("null"),
        }
    }
}

/// Text that looks like a Python collection (`(4, 4, 1)`, `[...]`, `{...}`)
/// is substituted unquoted.
impl From<&PropertyValue> for TemplateValue {
    fn from(value: &PropertyValue) -> Self {
        match value {
            PropertyValue::Int(i) => Self::Int(*i),
            PropertyValue::Float(x) => Self::Float(*x),
            PropertyValue::Bool(b) => Self::Bool(*b),
            PropertyValue::Null => Self::None,
            PropertyValue::Text(s) if s.trim_start().starts_with(['(', '[', '{']) => Self::Raw(s.clone()),
            PropertyValue::Text(s) => Self::Text(s.clone()),
        }
    }
}

/// Scalar columns and notes of a `systems` row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemData {
    pub name: Option<String>,
    pub topology: Option<String>,
    pub formula: Option<String>,
    pub username: Option<String>,
    /// Cell parameters `[a, b, c, alpha, beta, gamma]` (Angstrom, degrees).
    pub cell: Option<[f64; 6]>,
    pub pbc: [bool; 3],
    pub energy: Option<f64>,
    pub free_energy: Option<f64>,
    pub enthalpy: Option<f64>,
    pub entropy: Option<f64>,
    pub internal_energy: Option<f64>,
    /// Thermochemistry label, `<kind>@<temperature>`.
    pub thermo: Option<String>,
    pub magnetic_moment: Option<f64>,
    pub absolute_magnetization: Option<f64>,
    pub total_magnetization: Option<f64>,
    pub articledoi: Option<String>,
    pub notes: BTreeMap<String, PropertyValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemRecord {
    pub id: RecordId,
    /// Insertion time, ISO 8601 in UTC.
    pub timestamp: String,
    pub data: SystemData,
}

/// A system to be inserted together with its atoms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewSystem {
    pub data: SystemData,
    pub atoms: Vec<AtomRecord>,
}

/// One row of the `atoms` table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AtomRecord {
    pub atomic_number: u8,
    pub mass: f64,
    pub tag: i64,
    pub position: [f64; 3],
    pub force: Option<[f64; 3]>,
    pub momentum: [f64; 3],
    pub charge: f64,
    pub magmom: f64,
    pub initial_magmom: f64,
    pub initial_charge: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    NotStarted,
    Submitted,
    Running,
    Finished,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        Self::NotStarted,
        Self::Submitted,
        Self::Running,
        Self::Finished,
        Self::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not started",
            Self::Submitted => "submitted",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    /// Accepts the canonical strings case-insensitively; `_` and `-` may stand
    /// in for the space of `not started`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|s| s.as_str()).collect();
                format!("unknown job status '{s}' (expected one of: {})", known.join(", "))
            })
    }
}

/// A job to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub system_id: RecordId,
    pub name: String,
    /// Directory the job runs in.
    pub abspath: PathBuf,
    pub inpname: String,
    pub outname: String,
    pub status: JobStatus,
    pub hostname: Option<String>,
    pub username: Option<String>,
    pub calculator_id: Option<RecordId>,
    pub template_id: Option<RecordId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub id: RecordId,
    pub system_id: RecordId,
    pub name: String,
    pub abspath: PathBuf,
    pub inpname: String,
    pub outname: String,
    pub status: JobStatus,
    pub hostname: Option<String>,
    pub username: Option<String>,
    /// Copy of the input script, stored once the job has been harvested.
    pub jobscript: Option<String>,
    pub calculator_id: Option<RecordId>,
    pub template_id: Option<RecordId>,
}

impl JobRecord {
    pub fn inppath(&self) -> PathBuf {
        self.abspath.join(&self.inpname)
    }

    pub fn outpath(&self) -> PathBuf {
        self.abspath.join(&self.outname)
    }

    pub fn workdir(&self) -> &Path {
        &self.abspath
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewCalculator {
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
    pub attributes: BTreeMap<String, PropertyValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalculatorRecord {
    pub id: RecordId,
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
    pub attributes: BTreeMap<String, PropertyValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateRecord {
    pub id: RecordId,
    pub name: String,
    pub template: String,
}

impl TemplateRecord {
    pub fn to_template(&self) -> Template {
        Template::new(self.template.clone())
    }
}

/// A normal-mode energy in eV; imaginary modes have a non-zero `energy_imag`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vibration {
    pub energy_real: f64,
    pub energy_imag: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewVibrationSet {
    pub system_id: RecordId,
    pub name: String,
    /// Indices of the displaced atoms, `None` when all atoms were displaced.
    pub atom_ids: Option<Vec<usize>>,
    pub vibrations: Vec<Vibration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VibrationSetRecord {
    pub id: RecordId,
    pub system_id: RecordId,
    pub name: String,
    pub atom_ids: Option<Vec<usize>>,
    pub vibrations: Vec<Vibration>,
}
