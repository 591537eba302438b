use super::SchedulerError;
use super::request::SubmitRequest;
use super::script::render_job_script;
use super::site::SiteConfig;
use chrono::{DateTime, Local};
use regex::Regex;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

pub const LEDGER_FILE: &str = "submitted_jobs.dat";

static JOB_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z\.]*(\d+)[a-zA-Z\.]*").expect("valid job id regex"));

/// Runs a batch submission command.
pub trait Submitter {
    /// Submits `script` from `workdir` and returns the command's standard
    /// output.
    fn submit(&self, executable: &str, script: &Path, workdir: &Path) -> Result<String, SchedulerError>;
}

/// Submits by spawning the scheduler's executable.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandSubmitter;

impl Submitter for CommandSubmitter {
    fn submit(&self, executable: &str, script: &Path, workdir: &Path) -> Result<String, SchedulerError> {
        let output = Command::new(executable)
            .arg(script)
            .current_dir(workdir)
            .output()
            .map_err(|source| SchedulerError::Spawn {
                executable: executable.to_string(),
                source,
            })?;
        if !output.status.success() {
            return Err(SchedulerError::SubmitFailed {
                executable: executable.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// What to do when the job script already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExistingScript {
    /// Ask through the confirmation callback.
    #[default]
    Ask,
    Overwrite,
    Keep,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub script: PathBuf,
    /// `false` when an existing script was kept unchanged.
    pub script_written: bool,
    /// Scheduler job id; `None` when not submitted or not reported.
    pub job_id: Option<String>,
}

/// The first run of digits in the scheduler's reply, e.g. `4711` from
/// `Submitted batch job 4711` or `4711.pbs01`.
pub fn parse_job_id(output: &str) -> Option<String> {
    JOB_ID_RE.captures(output).map(|caps| caps[1].to_string())
}

/// Appends `<id> <cwd> <timestamp>` to the ledger in `home`.
pub fn append_ledger(home: &Path, job_id: &str, workdir: &Path, when: DateTime<Local>) -> Result<(), SchedulerError> {
    let mut ledger = OpenOptions::new()
        .create(true)
        .append(true)
        .open(home.join(LEDGER_FILE))?;
    writeln!(
        ledger,
        "{job_id} {:>12} {:>20}",
        workdir.display(),
        when.format("%Y-%m-%d+%H:%M:%S").to_string()
    )?;
    Ok(())
}

/// Writes the job script for `request` (subject to `existing`) and, when
/// `submit` is set, queues it and records the job id in the ledger.
///
/// `confirm` is consulted only for [`ExistingScript::Ask`] and decides whether
/// an existing script is overwritten.
pub fn write_and_submit(
    request: &SubmitRequest,
    site: &SiteConfig,
    existing: ExistingScript,
    confirm: &mut dyn FnMut(&Path) -> bool,
    submitter: &dyn Submitter,
    submit: bool,
) -> Result<SubmitOutcome, SchedulerError> {
    let script = request.script_path();
    let overwrite = !script.exists()
        || match existing {
            ExistingScript::Overwrite => true,
            ExistingScript::Keep => false,
            ExistingScript::Ask => confirm(&script),
        };

    if overwrite {
        let text = render_job_script(request, site)?;
        fs::write(&script, text)?;
        tracing::info!(script = %script.display(), "Created job script");
    } else {
        tracing::info!(script = %script.display(), "Using existing job script without changes");
    }

    let mut outcome = SubmitOutcome {
        script: script.clone(),
        script_written: overwrite,
        job_id: None,
    };
    if !submit {
        tracing::info!(script = %script.display(), "Not submitting job script");
        return Ok(outcome);
    }

    let executable = site.batch.executable();
    let output = submitter.submit(executable, Path::new(&request.script_name()), &request.workdir)?;
    outcome.job_id = parse_job_id(&output);
    match &outcome.job_id {
        Some(id) => {
            append_ledger(&site.home, id, &request.workdir, Local::now())?;
            tracing::info!(job_id = %id, "Submitted batch job");
        }
        None => tracing::warn!(output = output.trim(), "Submitted, but no job id in the scheduler output"),
    }
    Ok(outcome)
}
