//! Site configuration: where things live on a cluster and how each program
//! is launched.
//!
//! ```toml
//! batch = "slurm"
//! home = "/home/user"
//! scratch = "/work/user"
//! lib-paths = ["/opt/intel/lib"]
//!
//! [vars]
//! OMP_NUM_THREADS = "1"
//!
//! [jobspec.pythonqe]
//! modules = "module load espresso"
//! cmd = "python {input} > {outfile}"
//! ```

use super::SchedulerError;
use super::batch::BatchSystem;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// How to run one program inside a job script. Commands may reference
/// request fields as `{key}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct JobSpec {
    /// Shell lines loading the program's environment.
    pub modules: Option<String>,
    pub precmd: Option<String>,
    pub cmd: String,
    pub postcmd: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SiteConfig {
    pub batch: BatchSystem,
    /// Directory holding the submission ledger.
    #[serde(default = "default_home")]
    pub home: PathBuf,
    /// Root of per-job scratch directories.
    pub scratch: Option<PathBuf>,
    #[serde(default)]
    pub lib_paths: Vec<String>,
    /// Environment variables exported by every job script.
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
    #[serde(default)]
    pub jobspec: BTreeMap<String, JobSpec>,
}

fn default_home() -> PathBuf {
    std::env::var_os("HOME").map_or_else(|| PathBuf::from("."), PathBuf::from)
}

impl SiteConfig {
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, SchedulerError> {
        toml::from_str(text).map_err(|source| SchedulerError::SiteConfig {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text, path)?;
        tracing::debug!(path = %path.display(), batch = %config.batch, programs = config.jobspec.len(), "Loaded site configuration");
        Ok(config)
    }

    pub fn jobspec(&self, program: &str) -> Result<&JobSpec, SchedulerError> {
        self.jobspec.get(program).ok_or_else(|| SchedulerError::UnknownProgram {
            program: program.to_string(),
            known: self.jobspec.keys().cloned().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITE: &str = r#"
batch = "PBS"
home = "/home/tester"
scratch = "/scratch/tester"
lib-paths = ["/opt/lib", "/usr/local/lib"]

[vars]
ESP_PSP_PATH = "/opt/pseudo"

[jobspec.pythonqe]
modules = "module load espresso/6.8"
cmd = "python {input} > {outfile}"
"#;

    #[test]
    fn parses_a_complete_site() {
        let site = SiteConfig::from_toml_str(SITE, Path::new("site.toml")).unwrap();
        assert_eq!(site.batch, BatchSystem::Pbs);
        assert_eq!(site.home, PathBuf::from("/home/tester"));
        assert_eq!(site.lib_paths.len(), 2);
        assert_eq!(site.vars["ESP_PSP_PATH"], "/opt/pseudo");
        assert_eq!(site.jobspec("pythonqe").unwrap().postcmd, None);
    }

    #[test]
    fn unknown_programs_list_the_known_ones() {
        let site = SiteConfig::from_toml_str(SITE, Path::new("site.toml")).unwrap();
        let err = site.jobspec("gpaw").unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownProgram { ref known, .. } if known == &["pythonqe"]));
    }

    #[test]
    fn unknown_fields_and_batch_systems_are_rejected() {
        let typo = "batch = \"slurm\"\nscrach = \"/tmp\"\n";
        assert!(SiteConfig::from_toml_str(typo, Path::new("a.toml")).is_err());
        let lsf = "batch = \"lsf\"\n";
        let err = SiteConfig::from_toml_str(lsf, Path::new("b.toml")).unwrap_err();
        assert!(err.to_string().contains("b.toml"));
    }
}
