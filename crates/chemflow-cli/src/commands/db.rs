use super::{argument_error, current_user, emit};
use crate::cli::{DbArgs, DbCommands};
use crate::error::Result;
use crate::utils::parser::parse_properties;
use crate::utils::progress::ItemProgress;
use chemflow::db::convert::SystemLabels;
use chemflow::db::export::export_table;
use chemflow::db::migrations::current_user_version;
use chemflow::db::models::SystemRecord;
use chemflow::db::repo::{SqliteSystemRepository, SystemQuery, SystemRepository};
use chemflow::db::{open_db, open_existing_db};
use chemflow::workflows::{ImportOptions, import_structure};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

pub fn run(args: DbArgs) -> Result<()> {
    let path = args.db.path;
    match args.command {
        DbCommands::Init => handle_init(&path),
        DbCommands::Add {
            files,
            name,
            topology,
            index,
            magmom,
            notes,
        } => {
            let labels = SystemLabels {
                name,
                topology,
                username: current_user(),
                magnetic_moment: magmom,
                notes: parse_properties(&notes).map_err(argument_error)?,
            };
            handle_add(&path, &files, index, labels)
        }
        DbCommands::List {
            name,
            topology,
            user,
            limit,
        } => handle_list(
            &path,
            &SystemQuery {
                name,
                topology,
                username: user,
                limit,
            },
        ),
        DbCommands::Delete { id } => {
            let conn = open_existing_db(&path)?;
            SqliteSystemRepository::new(&conn).delete_system(id)?;
            println!("Deleted system {id}");
            Ok(())
        }
        DbCommands::Export { table, output } => handle_export(&path, &table, output.as_deref()),
    }
}

fn handle_init(path: &Path) -> Result<()> {
    let conn = open_db(path)?;
    let version = current_user_version(&conn)?;
    println!("Database {} is ready (schema version {version})", path.display());
    Ok(())
}

fn handle_add(path: &Path, files: &[PathBuf], index: isize, labels: SystemLabels) -> Result<()> {
    let mut conn = open_existing_db(path)?;
    let progress = (files.len() > 1).then(|| ItemProgress::new(files.len() as u64, "Importing"));

    for file in files {
        let options = ImportOptions {
            index,
            labels: labels.clone(),
        };
        let id = import_structure(&mut conn, file, options)?;
        info!("Stored {:?} as system {}", file, id);
        let line = format!("Added system {id} from {}", file.display());
        match &progress {
            Some(progress) => {
                progress.println(&line);
                progress.step(&file.display().to_string());
            }
            None => println!("{line}"),
        }
    }
    if let Some(progress) = progress {
        progress.finish(format!("Imported {} files", files.len()));
    }
    Ok(())
}

fn format_systems(systems: &[SystemRecord]) -> String {
    let mut out = format!(
        "{:>6}  {:<20} {:<12} {:<10} {:>16}  {}\n",
        "id", "name", "formula", "topology", "energy", "timestamp"
    );
    for system in systems {
        let data = &system.data;
        let energy = data.energy.map(|e| format!("{e:.6}")).unwrap_or_default();
        let _ = writeln!(
            out,
            "{:>6}  {:<20} {:<12} {:<10} {:>16}  {}",
            system.id,
            data.name.as_deref().unwrap_or("-"),
            data.formula.as_deref().unwrap_or("-"),
            data.topology.as_deref().unwrap_or("-"),
            energy,
            system.timestamp
        );
    }
    out
}

fn handle_list(path: &Path, query: &SystemQuery) -> Result<()> {
    let conn = open_existing_db(path)?;
    let systems = SqliteSystemRepository::new(&conn).list_systems(query)?;
    print!("{}", format_systems(&systems));
    Ok(())
}

fn handle_export(path: &Path, table: &str, output: Option<&Path>) -> Result<()> {
    let conn = open_existing_db(path)?;
    let mut buffer = Vec::new();
    let rows = export_table(&conn, table, &mut buffer)?;
    info!("Exported {} row(s) from '{}'", rows, table);
    emit(&String::from_utf8_lossy(&buffer), output)
}
