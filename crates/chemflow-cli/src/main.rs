mod cli;
mod commands;
mod config;
mod error;
mod logging;
mod utils;

use crate::cli::{Cli, Commands};
use crate::error::{CliError, Result};
use clap::Parser;
use tracing::{debug, error, info};

fn main() {
    if let Err(e) = run_app() {
        eprintln!("\n❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn run_app() -> Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.clone())?;

    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default().into_hooks();
    eyre_hook.install().map_err(|e| CliError::Other(e.into()))?;
    std::panic::set_hook(Box::new(move |pi| {
        error!("{}", panic_hook.panic_report(pi));
    }));

    info!("chemflow CLI v{} starting up.", env!("CARGO_PKG_VERSION"));
    debug!("Full CLI arguments parsed: {:?}", &cli);

    let command_result = match cli.command {
        Commands::Convert { input, output } => commands::convert::run_convert(&input, &output),
        Commands::Extract {
            trajectory,
            index,
            output,
        } => commands::convert::run_extract(&trajectory, index, &output),
        Commands::ToCar { input, output } => commands::convert::run_to_car(&input, &output),
        Commands::Db(args) => {
            info!("Dispatching to 'db' command.");
            commands::db::run(args)
        }
        Commands::Template(args) => {
            info!("Dispatching to 'template' command.");
            commands::template::run(args)
        }
        Commands::Calc(args) => {
            info!("Dispatching to 'calc' command.");
            commands::calc::run(args)
        }
        Commands::Jobs(args) => {
            info!("Dispatching to 'jobs' command.");
            commands::jobs::run(args)
        }
        Commands::Submit(args) => {
            info!("Dispatching to 'submit' command.");
            commands::submit::run(args)
        }
    };

    match &command_result {
        Ok(_) => info!("✅ Command completed successfully."),
        Err(e) => error!("❌ Command failed: {}", e),
    }

    command_result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{DbCommands, JobsCommands};
    use clap::CommandFactory;

    #[test]
    fn command_line_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_reach_nested_commands() {
        let cli = Cli::try_parse_from(["chemflow", "-vv", "db", "list", "--db", "x.db", "--limit", "3"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Db(args) => {
                assert_eq!(args.db.path, std::path::PathBuf::from("x.db"));
                assert!(matches!(args.command, DbCommands::List { limit: Some(3), .. }));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn extract_accepts_negative_indices() {
        let cli = Cli::try_parse_from(["chemflow", "extract", "traj.xyz", "-2", "out.xyz"]).unwrap();
        assert!(matches!(cli.command, Commands::Extract { index: -2, .. }));
    }

    #[test]
    fn jobs_submit_collects_resources() {
        let cli = Cli::try_parse_from([
            "chemflow", "jobs", "--no-commit", "submit", "-s", "1-3", "-n", "relax", "-N", "4", "--walltime",
            "01:00:00", "--keep",
        ])
        .unwrap();
        match cli.command {
            Commands::Jobs(args) => {
                assert!(args.no_commit);
                match args.command {
                    JobsCommands::Submit {
                        selection,
                        name,
                        resources,
                    } => {
                        assert_eq!(selection.systems, "1-3");
                        assert_eq!(name, "relax");
                        assert_eq!(resources.nodes, Some(4));
                        assert_eq!(resources.walltime.as_deref(), Some("01:00:00"));
                        assert!(resources.keep && !resources.overwrite);
                    }
                    other => panic!("unexpected command: {other:?}"),
                }
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
