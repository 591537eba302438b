use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The `[submit]` table: defaults for batch resources.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileSubmitConfig {
    pub host: Option<String>,
    pub nodes: Option<u32>,
    pub ppn: Option<u32>,
    pub mem_per_cpu: Option<String>,
    pub account: Option<String>,
    pub queue: Option<String>,
    pub walltime: Option<String>,
    pub scratch: Option<bool>,
    pub program: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    /// Site configuration used when none is given on the command line.
    pub site_config: Option<PathBuf>,
    pub submit: Option<FileSubmitConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}
