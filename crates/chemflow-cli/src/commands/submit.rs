use crate::cli::SubmitArgs;
use crate::config::{DefaultsConfig, build_submit_settings};
use crate::error::{CliError, Result};
use crate::utils::prompt::confirm_overwrite;
use chemflow::scheduler::{CommandSubmitter, SubmitRequest, write_and_submit};
use std::path::{Path, PathBuf};
use tracing::info;

pub fn run(args: SubmitArgs) -> Result<()> {
    let workdir = std::env::current_dir()?;
    let settings = build_submit_settings(&args.resources, DefaultsConfig::default())?;
    let request = prepare_request(settings.resources, args.input, args.extra_files, workdir)?;

    info!("Preparing {} for the {} batch system", request.input, settings.site.batch);
    let mut confirm = |path: &Path| confirm_overwrite(path);
    let outcome = write_and_submit(
        &request,
        &settings.site,
        settings.existing,
        &mut confirm,
        &CommandSubmitter,
        settings.submit,
    )?;

    match outcome.job_id {
        Some(id) => println!("Submitted {} as job {id}", outcome.script.display()),
        None if settings.submit => println!("Submitted {}", outcome.script.display()),
        None => println!("Wrote {} (not submitted)", outcome.script.display()),
    }
    Ok(())
}

/// Fills the per-submission fields of `resources`; the input must exist in
/// `workdir`.
fn prepare_request(
    mut resources: SubmitRequest,
    input: String,
    extra_files: Vec<String>,
    workdir: PathBuf,
) -> Result<SubmitRequest> {
    if !workdir.join(&input).is_file() {
        return Err(CliError::Argument(format!(
            "Input file '{}' does not exist in {}",
            input,
            workdir.display()
        )));
    }
    resources.input = input;
    resources.extra_files = extra_files;
    resources.workdir = workdir;
    Ok(resources)
}
