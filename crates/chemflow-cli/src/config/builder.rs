use super::defaults::DefaultsConfig;
use super::file::{FileConfig, FileSubmitConfig};
use crate::cli::ResourceArgs;
use crate::error::{CliError, Result};
use chemflow::scheduler::{ExistingScript, SiteConfig, SubmitRequest};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable pointing at the site configuration.
pub const SITE_CONFIG_ENV: &str = "CHEMFLOW_SITE_CONFIG";
const SITE_CONFIG_FILE: &str = "site.toml";
const CONFIG_FILE: &str = "config.toml";

/// Everything a submission needs besides the input file and directory.
#[derive(Debug, Clone)]
pub struct SubmitSettings {
    pub resources: SubmitRequest,
    pub site: SiteConfig,
    pub existing: ExistingScript,
    pub submit: bool,
}

fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "chemflow").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Loads the explicit configuration file, or the one in the user's config
/// directory when it exists.
pub fn load_file_config(explicit: Option<&Path>) -> Result<FileConfig> {
    if let Some(path) = explicit {
        return FileConfig::from_file(path);
    }
    match config_dir().map(|dir| dir.join(CONFIG_FILE)) {
        Some(path) if path.is_file() => FileConfig::from_file(&path),
        _ => Ok(FileConfig::default()),
    }
}

/// Picks the site configuration: command line, then environment, then the
/// configuration file, then `site.toml` in the user's config directory.
pub fn resolve_site_config_path(
    cli: Option<&Path>,
    env: Option<PathBuf>,
    file: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<PathBuf> {
    let candidate = cli
        .map(Path::to_path_buf)
        .or(env)
        .or_else(|| file.map(Path::to_path_buf))
        .or_else(|| config_dir.map(|dir| dir.join(SITE_CONFIG_FILE)));
    match candidate {
        Some(path) if path.is_file() => Ok(path),
        Some(path) => Err(CliError::Config(format!(
            "Site configuration '{}' does not exist (use --site-config or set {SITE_CONFIG_ENV}).",
            path.display()
        ))),
        None => Err(CliError::Config(format!(
            "No site configuration found (use --site-config or set {SITE_CONFIG_ENV})."
        ))),
    }
}

fn existing_policy(args: &ResourceArgs) -> ExistingScript {
    match (args.overwrite, args.keep) {
        (true, _) => ExistingScript::Overwrite,
        (false, true) => ExistingScript::Keep,
        (false, false) => ExistingScript::Ask,
    }
}

/// Merges resources: command line first, then the `[submit]` table, then
/// `defaults`. The input and working directory are left empty.
pub fn merge_resources(args: &ResourceArgs, file: &FileSubmitConfig, defaults: DefaultsConfig) -> SubmitRequest {
    let mut request = SubmitRequest::new("", "");
    request.host = args.host.clone().or_else(|| file.host.clone());
    request.nodes = args.nodes.or(file.nodes).unwrap_or(defaults.nodes);
    request.ppn = args.ppn.or(file.ppn).unwrap_or(defaults.ppn);
    request.mem_per_cpu = args
        .mem_per_cpu
        .clone()
        .or_else(|| file.mem_per_cpu.clone())
        .unwrap_or(defaults.mem_per_cpu);
    request.account = args
        .account
        .clone()
        .or_else(|| file.account.clone())
        .unwrap_or(defaults.account);
    request.queue = args.queue.clone().or_else(|| file.queue.clone()).unwrap_or(defaults.queue);
    request.walltime = args
        .walltime
        .clone()
        .or_else(|| file.walltime.clone())
        .unwrap_or(defaults.walltime);
    request.scratch = args.scratch || file.scratch.unwrap_or(false);
    request.program = args
        .program
        .clone()
        .or_else(|| file.program.clone())
        .unwrap_or(defaults.program);
    request
}

pub fn build_submit_settings(args: &ResourceArgs, defaults: DefaultsConfig) -> Result<SubmitSettings> {
    let file_config = load_file_config(args.config.as_deref())?;
    let resources = merge_resources(args, &file_config.submit.clone().unwrap_or_default(), defaults);

    let site_path = resolve_site_config_path(
        args.site_config.as_deref(),
        std::env::var_os(SITE_CONFIG_ENV).map(PathBuf::from),
        file_config.site_config.as_deref(),
        config_dir().as_deref(),
    )?;
    debug!(path = %site_path.display(), "Using site configuration");
    let site = SiteConfig::load(&site_path)?;

    Ok(SubmitSettings {
        resources,
        site,
        existing: existing_policy(args),
        submit: !args.no_submit,
    })
}
