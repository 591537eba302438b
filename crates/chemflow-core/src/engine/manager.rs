//! Database-driven management of calculation jobs.
//!
//! A [`JobManager`] works on a batch of systems at a time: it inserts job
//! rows, renders their input scripts from templates and calculator settings,
//! submits them, and harvests geometries, vibrations and thermochemistry back
//! into the database once they have run. Every batch runs in one transaction
//! that is committed or rolled back as a unit according to the manager's
//! `commit` flag. Files written to job directories are not rolled back.

use super::EngineError;
use super::results::{ThermoSummary, read_vibrations};
use crate::core::io::pwscf::read_magnetization;
use crate::core::io::{read_structure, write_structure};
use crate::core::template::{Substitutions, TemplateValue};
use crate::core::utils::text::sanitize_name;
use crate::db::convert::{apply_structure, atom_records, structure_from_system};
use crate::db::models::{JobRecord, JobStatus, NewJob, NewSystem, NewVibrationSet, RecordId, SystemData, SystemRecord};
use crate::db::repo::{
    CalculatorRepository, JobRepository, RepoResult, SqliteCalculatorRepository, SqliteJobRepository,
    SqliteSystemRepository, SqliteTemplateRepository, SqliteVibrationRepository, SystemRepository,
    TemplateRepository, VibrationRepository,
};
use crate::scheduler::request::DEFAULT_WALLTIME;
use crate::scheduler::script::render_job_script;
use crate::scheduler::submit::SubmitOutcome;
use crate::scheduler::{ExistingScript, SiteConfig, SubmitRequest, Submitter, write_and_submit};
use rusqlite::{Connection, Transaction};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File the stored structure is written to when a template needs `atoms` and
/// no value was supplied.
pub const STRUCTURE_FILE: &str = "structure.xyz";
pub const NEB_JOB_NAME: &str = "neb";
pub const NEB_INITIAL_FILE: &str = "initial.xyz";
pub const NEB_FINAL_FILE: &str = "final.xyz";
pub const VIBRATION_OUTPUT: &str = "vibenergies.txt";
pub const THERMO_OUTPUT: &str = "thermo.toml";

/// Output file name expected from a job, derived from the job name.
pub fn output_name(job_name: &str) -> String {
    if job_name.contains("relax") {
        "relaxed.xyz".to_string()
    } else if job_name == "freq" {
        VIBRATION_OUTPUT.to_string()
    } else if job_name == "thermo" {
        THERMO_OUTPUT.to_string()
    } else {
        format!("{}.out", sanitize_name(job_name))
    }
}

/// Resources used by [`JobManager::submit_jobs`] when the caller has no
/// preference: two nodes for five days.
pub fn default_job_resources() -> SubmitRequest {
    let mut request = SubmitRequest::new("", "");
    request.nodes = 2;
    request.walltime = DEFAULT_WALLTIME.to_string();
    request
}

/// Jobs to insert for a batch of systems.
#[derive(Debug, Clone)]
pub struct InsertJobs {
    pub name: String,
    /// Parent directory; each system gets `workdir/<sanitized system name>`.
    pub workdir: PathBuf,
    pub template_id: Option<RecordId>,
    pub calculator_id: Option<RecordId>,
    pub hostname: Option<String>,
}

impl InsertJobs {
    pub fn new(name: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            workdir: workdir.into(),
            template_id: None,
            calculator_id: None,
            hostname: None,
        }
    }
}

/// Vibration jobs placed in a subdirectory of an existing relaxation job.
#[derive(Debug, Clone)]
pub struct InsertVibrationJobs {
    pub relax_name: String,
    pub vib_name: String,
    pub template_id: Option<RecordId>,
    pub calculator_id: Option<RecordId>,
    pub hostname: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedJob {
    pub system: String,
    pub missing: Vec<String>,
}

/// What happened to each input script of a write batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteReport {
    pub written: Vec<PathBuf>,
    /// Existing scripts left alone because overwriting was not requested.
    pub kept: Vec<PathBuf>,
    /// Jobs whose substitutions lacked some template keys.
    pub skipped: Vec<SkippedJob>,
}

#[derive(Debug, Clone)]
pub struct GeometryUpdate {
    pub status: JobStatus,
    /// PWscf log inside the job directory to take magnetizations from.
    pub magnetization_log: Option<String>,
}

impl Default for GeometryUpdate {
    fn default() -> Self {
        Self {
            status: JobStatus::Finished,
            magnetization_log: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VibrationUpdate {
    pub vib_file: String,
    /// Name of the vibration set created from `vib_file`.
    pub vib_name: String,
    pub thermo_file: Option<String>,
    pub status: JobStatus,
}

impl Default for VibrationUpdate {
    fn default() -> Self {
        Self {
            vib_file: VIBRATION_OUTPUT.to_string(),
            vib_name: "PHVA".to_string(),
            thermo_file: None,
            status: JobStatus::Finished,
        }
    }
}

/// Everything needed to turn jobs into batch submissions.
pub struct SubmitContext<'a> {
    pub site: &'a SiteConfig,
    pub submitter: &'a dyn Submitter,
    /// Resource template; its `input` and `workdir` are replaced per job.
    pub resources: SubmitRequest,
    pub existing: ExistingScript,
    /// Write scripts only when `false`.
    pub submit: bool,
}

/// A nudged elastic band calculation between two stored systems.
#[derive(Debug, Clone)]
pub struct NebOptions {
    pub ts_name: String,
    pub initial_name: String,
    pub final_name: String,
    pub workdir: PathBuf,
    pub template_id: Option<RecordId>,
    pub calculator_id: Option<RecordId>,
    pub hostname: Option<String>,
    pub nimage: i64,
    pub springc: f64,
    pub climb: bool,
    /// Python expression for the initial magnetic moments; `None` when unset.
    pub magmoms: Option<String>,
    pub fmax: f64,
    pub overrides: Substitutions,
}

impl NebOptions {
    pub fn new(
        ts_name: impl Into<String>,
        initial_name: impl Into<String>,
        final_name: impl Into<String>,
        workdir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ts_name: ts_name.into(),
            initial_name: initial_name.into(),
            final_name: final_name.into(),
            workdir: workdir.into(),
            template_id: None,
            calculator_id: None,
            hostname: None,
            nimage: 5,
            springc: 0.1,
            climb: true,
            magmoms: None,
            fmax: 0.2,
            overrides: Substitutions::new(),
        }
    }

    fn substitutions(&self) -> Substitutions {
        Substitutions::from([
            ("initial".to_string(), TemplateValue::from(NEB_INITIAL_FILE)),
            ("final".to_string(), TemplateValue::from(NEB_FINAL_FILE)),
            ("nimage".to_string(), TemplateValue::Int(self.nimage)),
            ("springc".to_string(), TemplateValue::Float(self.springc)),
            ("climb".to_string(), TemplateValue::Bool(self.climb)),
            (
                "magmoms".to_string(),
                self.magmoms.clone().map_or(TemplateValue::None, TemplateValue::Raw),
            ),
            ("fmax".to_string(), TemplateValue::Float(self.fmax)),
        ])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NebOutcome {
    pub system_id: RecordId,
    pub job_id: RecordId,
    pub report: WriteReport,
}

pub struct JobManager<'c> {
    conn: &'c mut Connection,
    commit: bool,
    username: Option<String>,
}

impl<'c> JobManager<'c> {
    /// A manager that commits its batches and records `$USER` on new rows.
    pub fn new(conn: &'c mut Connection) -> Self {
        Self {
            conn,
            commit: true,
            username: std::env::var("USER").ok(),
        }
    }

    /// With `commit` unset every batch is rolled back after it ran, which
    /// makes a dry run of the database side.
    pub fn with_commit(mut self, commit: bool) -> Self {
        self.commit = commit;
        self
    }

    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username;
        self
    }

    pub fn insert_jobs(&mut self, system_ids: &[RecordId], options: &InsertJobs) -> Result<Vec<RecordId>, EngineError> {
        let username = self.username.as_deref();
        run_in_transaction(self.conn, self.commit, "insert_jobs", |tx| {
            let systems = SqliteSystemRepository::new(tx);
            let mut ids = Vec::with_capacity(system_ids.len());
            for &system_id in system_ids {
                let system = systems.get_system(system_id)?;
                ids.push(insert_job_row(tx, &system, options, username)?);
            }
            info!(job = %options.name, count = ids.len(), "Inserted jobs");
            Ok(ids)
        })
    }

    pub fn insert_vibration_jobs(
        &mut self,
        system_ids: &[RecordId],
        options: &InsertVibrationJobs,
    ) -> Result<Vec<RecordId>, EngineError> {
        let username = self.username.as_deref();
        run_in_transaction(self.conn, self.commit, "insert_vibration_jobs", |tx| {
            let jobs = SqliteJobRepository::new(tx);
            let sanitized = sanitize_name(&options.vib_name);
            let mut ids = Vec::with_capacity(system_ids.len());
            for &system_id in system_ids {
                let relax = jobs.find_job(system_id, &options.relax_name)?;
                ids.push(jobs.create_job(&NewJob {
                    system_id,
                    name: options.vib_name.clone(),
                    abspath: relax.abspath.join(&sanitized),
                    inpname: format!("{sanitized}.py"),
                    outname: VIBRATION_OUTPUT.to_string(),
                    status: JobStatus::NotStarted,
                    hostname: options.hostname.clone(),
                    username: username.map(String::from),
                    calculator_id: options.calculator_id,
                    template_id: options.template_id,
                })?);
            }
            info!(job = %options.vib_name, count = ids.len(), "Inserted vibration jobs");
            Ok(ids)
        })
    }

    /// Renders and writes the input script of job `job_name` for each system.
    ///
    /// Values come from the calculator attributes the template names, then
    /// from `overrides`. Systems whose values miss template keys are skipped
    /// and reported.
    pub fn write_jobs(
        &mut self,
        system_ids: &[RecordId],
        job_name: &str,
        overrides: &Substitutions,
        overwrite: bool,
    ) -> Result<WriteReport, EngineError> {
        run_in_transaction(self.conn, self.commit, "write_jobs", |tx| {
            let systems = SqliteSystemRepository::new(tx);
            let jobs = SqliteJobRepository::new(tx);
            let mut report = WriteReport::default();
            for &system_id in system_ids {
                let system = systems.get_system(system_id)?;
                let job = jobs.find_job(system_id, job_name)?;
                render_job(tx, &system, &job, Substitutions::new(), overrides, overwrite, &mut report)?;
            }
            Ok(report)
        })
    }

    /// Like [`write_jobs`](Self::write_jobs) for vibration jobs, with `atoms`
    /// pointing at the output of the relaxation job unless overridden.
    pub fn write_vibration_jobs(
        &mut self,
        system_ids: &[RecordId],
        relax_name: &str,
        vib_name: &str,
        overrides: &Substitutions,
        overwrite: bool,
    ) -> Result<WriteReport, EngineError> {
        run_in_transaction(self.conn, self.commit, "write_vibration_jobs", |tx| {
            let systems = SqliteSystemRepository::new(tx);
            let jobs = SqliteJobRepository::new(tx);
            let mut report = WriteReport::default();
            for &system_id in system_ids {
                let system = systems.get_system(system_id)?;
                let relax = jobs.find_job(system_id, relax_name)?;
                let vib = jobs.find_job(system_id, vib_name)?;
                let base = Substitutions::from([(
                    "atoms".to_string(),
                    TemplateValue::Text(relax.outpath().to_string_lossy().into_owned()),
                )]);
                render_job(tx, &system, &vib, base, overrides, overwrite, &mut report)?;
            }
            Ok(report)
        })
    }

    /// Replaces atoms, cell, periodicity, formula and energy of each system
    /// with the output structure of its job, stores the input script on the
    /// job and sets its status.
    pub fn update_geometries(
        &mut self,
        system_ids: &[RecordId],
        job_name: &str,
        update: &GeometryUpdate,
    ) -> Result<usize, EngineError> {
        run_in_transaction(self.conn, self.commit, "update_geometries", |tx| {
            let systems = SqliteSystemRepository::new(tx);
            let jobs = SqliteJobRepository::new(tx);
            for &system_id in system_ids {
                let system = systems.get_system(system_id)?;
                let mut job = jobs.find_job(system_id, job_name)?;
                harvest_jobscript(&mut job, update.status)?;

                let structure = read_structure(job.outpath(), -1)?;
                systems.replace_atoms(system_id, &atom_records(&structure))?;
                let mut data = system.data;
                apply_structure(&mut data, &structure);
                if let Some(log) = &update.magnetization_log {
                    let magnetization = read_magnetization(job.abspath.join(log))?;
                    data.total_magnetization = Some(magnetization.total);
                    data.absolute_magnetization = Some(magnetization.absolute);
                }
                systems.update_system(system_id, &data)?;
                jobs.update_job(&job)?;
                debug!(system_id, job = job_name, atoms = structure.len(), "Updated geometry");
            }
            info!(job = job_name, count = system_ids.len(), "Updated geometries");
            Ok(system_ids.len())
        })
    }

    /// Loads vibration energies and the thermochemistry summary written by
    /// each system's job. Missing result files are skipped.
    pub fn update_vibrations(
        &mut self,
        system_ids: &[RecordId],
        job_name: &str,
        update: &VibrationUpdate,
    ) -> Result<usize, EngineError> {
        run_in_transaction(self.conn, self.commit, "update_vibrations", |tx| {
            let systems = SqliteSystemRepository::new(tx);
            let jobs = SqliteJobRepository::new(tx);
            let vibrations = SqliteVibrationRepository::new(tx);
            for &system_id in system_ids {
                let system = systems.get_system(system_id)?;
                let mut job = jobs.find_job(system_id, job_name)?;
                harvest_jobscript(&mut job, update.status)?;

                let vib_path = job.abspath.join(&update.vib_file);
                if vib_path.exists() {
                    vibrations.create_vibration_set(&NewVibrationSet {
                        system_id,
                        name: update.vib_name.clone(),
                        atom_ids: None,
                        vibrations: read_vibrations(&vib_path)?,
                    })?;
                } else {
                    debug!(path = %vib_path.display(), "No vibration file");
                }

                if let Some(thermo_file) = &update.thermo_file {
                    let thermo_path = job.abspath.join(thermo_file);
                    if thermo_path.exists() {
                        let mut data = system.data;
                        ThermoSummary::load(&thermo_path)?.apply_to(&mut data)?;
                        systems.update_system(system_id, &data)?;
                    } else {
                        debug!(path = %thermo_path.display(), "No thermochemistry file");
                    }
                }
                jobs.update_job(&job)?;
            }
            info!(job = job_name, count = system_ids.len(), "Updated vibrations");
            Ok(system_ids.len())
        })
    }

    /// Writes a batch script into each job directory and submits it; jobs
    /// that were submitted get status `submitted`.
    ///
    /// Every job is resolved and its script rendered before the first
    /// submission, so a bad system fails the batch before anything is queued.
    /// When the scheduler rejects a job part way through, the statuses of the
    /// jobs already queued are still recorded and the error is returned.
    pub fn submit_jobs(
        &mut self,
        system_ids: &[RecordId],
        job_name: &str,
        context: &SubmitContext<'_>,
        confirm: &mut dyn FnMut(&Path) -> bool,
    ) -> Result<Vec<SubmitOutcome>, EngineError> {
        let (outcomes, failure) = run_in_transaction(self.conn, self.commit, "submit_jobs", |tx| {
            let jobs = SqliteJobRepository::new(tx);
            let mut pending = Vec::with_capacity(system_ids.len());
            for &system_id in system_ids {
                let job = jobs.find_job(system_id, job_name)?;
                if !job.abspath.is_dir() {
                    return Err(EngineError::MissingJobDirectory {
                        job: job.name,
                        path: job.abspath,
                    });
                }
                let mut request = context.resources.clone();
                request.input = job.inpname.clone();
                request.workdir = job.abspath.clone();
                render_job_script(&request, context.site)?;
                pending.push((job.id, request));
            }

            let mut outcomes = Vec::with_capacity(pending.len());
            for (job_id, request) in &pending {
                let outcome = match write_and_submit(
                    request,
                    context.site,
                    context.existing,
                    confirm,
                    context.submitter,
                    context.submit,
                ) {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        warn!(workdir = %request.workdir.display(), submitted = outcomes.len(), error = %err, "Submission failed, keeping earlier submissions");
                        return Ok((outcomes, Some(err)));
                    }
                };
                if context.submit {
                    jobs.set_status(*job_id, JobStatus::Submitted)?;
                }
                outcomes.push(outcome);
            }
            Ok((outcomes, None))
        })?;
        match failure {
            Some(err) => Err(err.into()),
            None => Ok(outcomes),
        }
    }

    /// Creates the transition-state system (topology taken from the initial
    /// state) with its `neb` job, renders the job input and writes the
    /// initial and final structures into the job directory.
    pub fn insert_neb(&mut self, options: &NebOptions) -> Result<NebOutcome, EngineError> {
        let username = self.username.as_deref();
        run_in_transaction(self.conn, self.commit, "insert_neb", |tx| {
            let systems = SqliteSystemRepository::new(tx);
            let initial = systems.find_system_by_name(&options.initial_name)?;
            let final_state = systems.find_system_by_name(&options.final_name)?;

            let system_id = systems.create_system(&NewSystem {
                data: SystemData {
                    name: Some(options.ts_name.clone()),
                    topology: initial.data.topology.clone(),
                    username: username.map(String::from),
                    ..SystemData::default()
                },
                atoms: Vec::new(),
            })?;
            let ts = systems.get_system(system_id)?;

            let job_options = InsertJobs {
                name: NEB_JOB_NAME.to_string(),
                workdir: options.workdir.clone(),
                template_id: options.template_id,
                calculator_id: options.calculator_id,
                hostname: options.hostname.clone(),
            };
            let job_id = insert_job_row(tx, &ts, &job_options, username)?;
            let job = SqliteJobRepository::new(tx).get_job(job_id)?;

            let mut report = WriteReport::default();
            render_job(tx, &ts, &job, options.substitutions(), &options.overrides, true, &mut report)?;

            fs::create_dir_all(&job.abspath).map_err(EngineError::io(&job.abspath))?;
            for (state, file) in [(&initial, NEB_INITIAL_FILE), (&final_state, NEB_FINAL_FILE)] {
                let structure = structure_from_system(tx, state.id)?;
                write_structure(job.abspath.join(file), &structure)?;
            }
            info!(ts = %options.ts_name, initial = %options.initial_name, final_state = %options.final_name, "Inserted NEB job");
            Ok(NebOutcome {
                system_id,
                job_id,
                report,
            })
        })
    }
}

fn run_in_transaction<T>(
    conn: &mut Connection,
    commit: bool,
    operation: &'static str,
    f: impl FnOnce(&Transaction<'_>) -> Result<T, EngineError>,
) -> Result<T, EngineError> {
    let tx = conn.transaction()?;
    let value = f(&tx)?;
    if commit {
        tx.commit()?;
        debug!(operation, "Committed");
    } else {
        tx.rollback()?;
        info!(operation, "Rolled back database changes (commit disabled)");
    }
    Ok(value)
}

fn system_label(system: &SystemRecord) -> String {
    system
        .data
        .name
        .clone()
        .unwrap_or_else(|| format!("system {}", system.id))
}

fn system_dir_name(system: &SystemRecord) -> String {
    system
        .data
        .name
        .as_deref()
        .map(sanitize_name)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("system_{}", system.id))
}

fn insert_job_row(
    conn: &Connection,
    system: &SystemRecord,
    options: &InsertJobs,
    username: Option<&str>,
) -> RepoResult<RecordId> {
    SqliteJobRepository::new(conn).create_job(&NewJob {
        system_id: system.id,
        name: options.name.clone(),
        abspath: options.workdir.join(system_dir_name(system)),
        inpname: format!("{}.py", sanitize_name(&options.name)),
        outname: output_name(&options.name),
        status: JobStatus::NotStarted,
        hostname: options.hostname.clone(),
        username: username.map(String::from),
        calculator_id: options.calculator_id,
        template_id: options.template_id,
    })
}

fn harvest_jobscript(job: &mut JobRecord, status: JobStatus) -> Result<(), EngineError> {
    let inppath = job.inppath();
    job.jobscript = Some(fs::read_to_string(&inppath).map_err(EngineError::io(&inppath))?);
    job.status = status;
    Ok(())
}

fn render_job(
    conn: &Connection,
    system: &SystemRecord,
    job: &JobRecord,
    base: Substitutions,
    overrides: &Substitutions,
    overwrite: bool,
    report: &mut WriteReport,
) -> Result<(), EngineError> {
    let template_id = job.template_id.ok_or_else(|| EngineError::NoTemplate {
        job: job.name.clone(),
        system_id: system.id,
    })?;
    let template = SqliteTemplateRepository::new(conn).get_template(template_id)?.to_template();
    let keys = template.named_keys();

    let mut values = Substitutions::new();
    if let Some(calculator_id) = job.calculator_id {
        let calculator = SqliteCalculatorRepository::new(conn).get_calculator(calculator_id)?;
        values.extend(
            calculator
                .attributes
                .iter()
                .filter(|(key, _)| keys.contains(key))
                .map(|(key, value)| (key.clone(), TemplateValue::from(value))),
        );
    }
    values.extend(base);
    values.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));

    let needs_structure = keys.iter().any(|k| k == "atoms") && !values.contains_key("atoms");
    if needs_structure {
        values.insert("atoms".to_string(), TemplateValue::from(STRUCTURE_FILE));
    }

    let missing = template.missing_keys(&values);
    if !missing.is_empty() {
        let label = system_label(system);
        warn!(system = %label, job = %job.name, missing = %missing.join(", "), "Not writing input, missing template values");
        report.skipped.push(SkippedJob { system: label, missing });
        return Ok(());
    }

    let inppath = job.inppath();
    if inppath.exists() && !overwrite {
        info!(path = %inppath.display(), "Input exists, keeping it");
        report.kept.push(inppath);
        return Ok(());
    }

    fs::create_dir_all(&job.abspath).map_err(EngineError::io(&job.abspath))?;
    if needs_structure {
        let structure = structure_from_system(conn, system.id)?;
        write_structure(job.abspath.join(STRUCTURE_FILE), &structure)?;
    }
    template.render_and_write(&values, &inppath)?;
    info!(path = %inppath.display(), "Wrote job input");
    report.written.push(inppath);
    Ok(())
}
