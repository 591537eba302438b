use super::{argument_error, current_user};
use crate::cli::{JobSource, JobsArgs, JobsCommands, SystemSelection};
use crate::config::{DefaultsConfig, build_submit_settings};
use crate::error::{CliError, Result};
use crate::utils::parser::{parse_id_list, parse_substitutions};
use crate::utils::prompt::confirm_overwrite;
use chemflow::core::template::library::bundled_text;
use chemflow::db::models::{JobRecord, JobStatus, RecordId};
use chemflow::db::open_existing_db;
use chemflow::db::repo::{
    CalculatorRepository, JobQuery, JobRepository, RepoError, SqliteCalculatorRepository, SqliteJobRepository,
    SqliteTemplateRepository, TemplateRepository,
};
use chemflow::engine::{
    GeometryUpdate, InsertJobs, InsertVibrationJobs, JobManager, NebOptions, SubmitContext, VibrationUpdate,
    WriteReport,
};
use chemflow::scheduler::CommandSubmitter;
use rusqlite::Connection;
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

pub fn run(args: JobsArgs) -> Result<()> {
    let mut conn = open_existing_db(&args.db.path)?;
    let commit = !args.no_commit;
    if !commit {
        println!("Database changes will be rolled back (--no-commit)");
    }

    match args.command {
        JobsCommands::Insert {
            selection,
            name,
            workdir,
            source,
        } => {
            let ids = system_ids(&selection)?;
            let (template_id, calculator_id) = resolve_source(&conn, &source)?;
            let options = InsertJobs {
                name,
                workdir: std::path::absolute(&workdir)?,
                template_id,
                calculator_id,
                hostname: source.hostname,
            };
            let inserted = manager(&mut conn, commit).insert_jobs(&ids, &options)?;
            println!("Inserted {} '{}' job(s)", inserted.len(), options.name);
        }
        JobsCommands::InsertVibs {
            selection,
            relax_name,
            vib_name,
            source,
        } => {
            let ids = system_ids(&selection)?;
            let (template_id, calculator_id) = resolve_source(&conn, &source)?;
            let options = InsertVibrationJobs {
                relax_name,
                vib_name,
                template_id,
                calculator_id,
                hostname: source.hostname,
            };
            let inserted = manager(&mut conn, commit).insert_vibration_jobs(&ids, &options)?;
            println!("Inserted {} '{}' job(s)", inserted.len(), options.vib_name);
        }
        JobsCommands::Write {
            selection,
            name,
            values,
            overwrite,
        } => {
            let ids = system_ids(&selection)?;
            let overrides = parse_substitutions(&values).map_err(argument_error)?;
            let report = manager(&mut conn, commit).write_jobs(&ids, &name, &overrides, overwrite)?;
            print!("{}", summarize(&report));
        }
        JobsCommands::WriteVibs {
            selection,
            relax_name,
            vib_name,
            values,
            overwrite,
        } => {
            let ids = system_ids(&selection)?;
            let overrides = parse_substitutions(&values).map_err(argument_error)?;
            let report =
                manager(&mut conn, commit).write_vibration_jobs(&ids, &relax_name, &vib_name, &overrides, overwrite)?;
            print!("{}", summarize(&report));
        }
        JobsCommands::Submit {
            selection,
            name,
            resources,
        } => {
            let ids = system_ids(&selection)?;
            let settings = build_submit_settings(&resources, DefaultsConfig::jobs())?;
            let context = SubmitContext {
                site: &settings.site,
                submitter: &CommandSubmitter,
                resources: settings.resources.clone(),
                existing: settings.existing,
                submit: settings.submit,
            };
            let mut confirm = |path: &Path| confirm_overwrite(path);
            let outcomes = manager(&mut conn, commit).submit_jobs(&ids, &name, &context, &mut confirm)?;
            for outcome in outcomes {
                match outcome.job_id {
                    Some(id) => println!("Submitted {} as job {id}", outcome.script.display()),
                    None => println!("Prepared {}", outcome.script.display()),
                }
            }
        }
        JobsCommands::UpdateGeoms {
            selection,
            name,
            status,
            magnetization_log,
        } => {
            let ids = system_ids(&selection)?;
            let update = GeometryUpdate {
                status: parse_status(&status)?,
                magnetization_log,
            };
            let count = manager(&mut conn, commit).update_geometries(&ids, &name, &update)?;
            println!("Updated the geometry of {count} system(s) from '{name}'");
        }
        JobsCommands::UpdateVibs {
            selection,
            name,
            vib_file,
            vib_name,
            thermo_file,
            status,
        } => {
            let ids = system_ids(&selection)?;
            let update = VibrationUpdate {
                vib_file,
                vib_name,
                thermo_file,
                status: parse_status(&status)?,
            };
            let count = manager(&mut conn, commit).update_vibrations(&ids, &name, &update)?;
            println!("Updated the vibrations of {count} system(s) from '{name}'");
        }
        JobsCommands::InsertNeb {
            ts,
            initial,
            final_state,
            workdir,
            source,
            nimage,
            springc,
            no_climb,
            magmoms,
            fmax,
            values,
        } => {
            let (template_id, calculator_id) = resolve_source(&conn, &source)?;
            let mut options = NebOptions::new(ts, initial, final_state, std::path::absolute(&workdir)?);
            options.template_id = template_id;
            options.calculator_id = calculator_id;
            options.hostname = source.hostname;
            options.nimage = nimage;
            options.springc = springc;
            options.climb = !no_climb;
            options.magmoms = magmoms;
            options.fmax = fmax;
            options.overrides = parse_substitutions(&values).map_err(argument_error)?;

            let outcome = manager(&mut conn, commit).insert_neb(&options)?;
            println!(
                "Created system {} '{}' with NEB job {}",
                outcome.system_id, options.ts_name, outcome.job_id
            );
            print!("{}", summarize(&outcome.report));
        }
        JobsCommands::List { system, name, status } => {
            let query = JobQuery {
                system_id: system,
                name,
                status: status.as_deref().map(parse_status).transpose()?,
            };
            let jobs = SqliteJobRepository::new(&conn).list_jobs(&query)?;
            print!("{}", format_jobs(&jobs));
        }
    }
    Ok(())
}

fn manager(conn: &mut Connection, commit: bool) -> JobManager<'_> {
    JobManager::new(conn)
        .with_commit(commit)
        .with_username(current_user())
}

fn system_ids(selection: &SystemSelection) -> Result<Vec<RecordId>> {
    parse_id_list(&selection.systems).map_err(argument_error)
}

fn parse_status(text: &str) -> Result<JobStatus> {
    text.parse().map_err(CliError::Argument)
}

/// Finds the template and calculator ids named by `source`. A template that
/// is only bundled is stored in the database on first use.
fn resolve_source(conn: &Connection, source: &JobSource) -> Result<(Option<RecordId>, Option<RecordId>)> {
    let template_id = match &source.template {
        Some(name) => {
            let templates = SqliteTemplateRepository::new(conn);
            match templates.find_template_by_name(name) {
                Ok(record) => Some(record.id),
                Err(RepoError::NotFound { .. }) => {
                    let id = templates.create_template(name, bundled_text(name)?)?;
                    info!("Stored bundled template '{}' as id {}", name, id);
                    Some(id)
                }
                Err(err) => return Err(err.into()),
            }
        }
        None => None,
    };
    let calculator_id = match &source.calculator {
        Some(name) => Some(SqliteCalculatorRepository::new(conn).find_calculator_by_name(name)?.id),
        None => None,
    };
    Ok((template_id, calculator_id))
}

fn summarize(report: &WriteReport) -> String {
    let mut out = String::new();
    for path in &report.written {
        let _ = writeln!(out, "Wrote {}", path.display());
    }
    for path in &report.kept {
        let _ = writeln!(out, "Kept existing {}", path.display());
    }
    for skipped in &report.skipped {
        let _ = writeln!(out, "Skipped {}: missing {}", skipped.system, skipped.missing.join(", "));
    }
    out
}

fn format_jobs(jobs: &[JobRecord]) -> String {
    let mut out = format!(
        "{:>6} {:>7}  {:<12} {:<12} {}\n",
        "id", "system", "name", "status", "path"
    );
    for job in jobs {
        let _ = writeln!(
            out,
            "{:>6} {:>7}  {:<12} {:<12} {}",
            job.id,
            job.system_id,
            job.name,
            job.status,
            job.inppath().display()
        );
    }
    out
}
