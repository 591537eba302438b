use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Lukasz Mentel",
    version,
    about = "chemflow - store computed structures in a job database, render calculation inputs and drive PBS/SLURM batch jobs.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert a structure file to another format (all frames).
    Convert {
        /// Input structure file (.xyz, .extxyz, .car).
        input: PathBuf,
        /// Output structure file; the format follows the extension.
        output: PathBuf,
    },
    /// Extract one frame of a trajectory into its own file.
    Extract {
        /// Trajectory to read.
        trajectory: PathBuf,
        /// Index of the frame; negative values count from the end.
        #[arg(allow_negative_numbers = true)]
        index: isize,
        /// Output structure file.
        output: PathBuf,
    },
    /// Write the last frame of a structure file as a BIOSYM archive (.car).
    ToCar {
        input: PathBuf,
        #[arg(short, long, default_value = "output.car", value_name = "PATH")]
        output: PathBuf,
    },
    /// Create, fill, inspect and export the system database.
    Db(DbArgs),
    /// Manage input-script templates.
    Template(TemplateArgs),
    /// Manage calculator settings.
    Calc(CalcArgs),
    /// Insert, render, submit and harvest calculation jobs.
    Jobs(JobsArgs),
    /// Write a batch job script for one input file and submit it.
    Submit(SubmitArgs),
}

/// Location of the system database.
#[derive(Args, Debug, Clone)]
pub struct DbLocation {
    /// Path to the SQLite database.
    #[arg(long = "db", global = true, default_value = "chemflow.db", value_name = "PATH")]
    pub path: PathBuf,
}

#[derive(Args, Debug)]
pub struct DbArgs {
    #[command(flatten)]
    pub db: DbLocation,
    #[command(subcommand)]
    pub command: DbCommands,
}

#[derive(Subcommand, Debug)]
pub enum DbCommands {
    /// Create the database (or upgrade its schema).
    Init,
    /// Import structure files as new systems.
    Add {
        /// Structure files to import.
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// System name; defaults to the name stored in the file.
        #[arg(short, long)]
        name: Option<String>,
        /// Topology code, e.g. a zeolite framework type.
        #[arg(short, long)]
        topology: Option<String>,
        /// Frame to import from each file.
        #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
        index: isize,
        /// Total magnetic moment of the system.
        #[arg(long)]
        magmom: Option<f64>,
        /// Attach a note to the system. Can be used multiple times.
        #[arg(short = 'S', long = "set", value_name = "KEY=VALUE")]
        notes: Vec<String>,
    },
    /// List stored systems.
    List {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        topology: Option<String>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Delete a system together with its atoms, notes, jobs and vibrations.
    Delete { id: i64 },
    /// Dump one table as CSV.
    Export {
        table: String,
        /// Output file; standard output when omitted.
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct TemplateArgs {
    #[command(flatten)]
    pub db: DbLocation,
    #[command(subcommand)]
    pub command: TemplateCommands,
}

#[derive(Subcommand, Debug)]
pub enum TemplateCommands {
    /// List bundled templates and those stored in the database.
    List,
    /// Print a template.
    Show { name: String },
    /// Print the placeholder names of a template.
    Keys { name: String },
    /// Render a template with values given on the command line.
    Render {
        name: String,
        /// Value for a placeholder. Can be used multiple times.
        #[arg(short = 'S', long = "set", value_name = "KEY=VALUE")]
        values: Vec<String>,
        /// Leave placeholders without a value untouched.
        #[arg(long)]
        safe: bool,
        /// Output file; standard output when omitted.
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Store a template in the database.
    Add {
        name: String,
        /// Read the template text from this file instead of the bundled library.
        #[arg(short, long, value_name = "PATH")]
        file: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct CalcArgs {
    #[command(flatten)]
    pub db: DbLocation,
    #[command(subcommand)]
    pub command: CalcCommands,
}

#[derive(Subcommand, Debug)]
pub enum CalcCommands {
    /// Store a calculator with its attributes.
    Add {
        name: String,
        #[arg(long)]
        version: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Calculator attribute. Can be used multiple times.
        #[arg(short = 'S', long = "set", value_name = "KEY=VALUE")]
        attributes: Vec<String>,
    },
    /// Print a calculator and its attributes.
    Show { name: String },
}

#[derive(Args, Debug)]
pub struct JobsArgs {
    #[command(flatten)]
    pub db: DbLocation,
    /// Roll back all database changes when the command finishes.
    #[arg(long, global = true)]
    pub no_commit: bool,
    #[command(subcommand)]
    pub command: JobsCommands,
}

/// The systems a job command acts on.
#[derive(Args, Debug, Clone)]
pub struct SystemSelection {
    /// System ids, e.g. `1,4,7-9`.
    #[arg(short, long = "systems", required = true, value_name = "IDS")]
    pub systems: String,
}

#[derive(Args, Debug, Clone)]
pub struct JobSource {
    /// Template name (database first, then the bundled library).
    #[arg(short, long)]
    pub template: Option<String>,
    /// Calculator name.
    #[arg(short, long)]
    pub calculator: Option<String>,
    #[arg(long)]
    pub hostname: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum JobsCommands {
    /// Insert a job for every selected system.
    Insert {
        #[command(flatten)]
        selection: SystemSelection,
        /// Job name.
        #[arg(short, long)]
        name: String,
        /// Parent directory of the job directories.
        #[arg(short, long, default_value = ".")]
        workdir: PathBuf,
        #[command(flatten)]
        source: JobSource,
    },
    /// Insert vibration jobs below existing relaxation jobs.
    InsertVibs {
        #[command(flatten)]
        selection: SystemSelection,
        #[arg(long, default_value = "relax")]
        relax_name: String,
        #[arg(long, default_value = "freq")]
        vib_name: String,
        #[command(flatten)]
        source: JobSource,
    },
    /// Render the input scripts of a job.
    Write {
        #[command(flatten)]
        selection: SystemSelection,
        #[arg(short, long)]
        name: String,
        /// Template value overriding calculator attributes. Can be used multiple times.
        #[arg(short = 'S', long = "set", value_name = "KEY=VALUE")]
        values: Vec<String>,
        /// Replace input scripts that already exist.
        #[arg(long)]
        overwrite: bool,
    },
    /// Render the input scripts of vibration jobs.
    WriteVibs {
        #[command(flatten)]
        selection: SystemSelection,
        #[arg(long, default_value = "relax")]
        relax_name: String,
        #[arg(long, default_value = "freq")]
        vib_name: String,
        #[arg(short = 'S', long = "set", value_name = "KEY=VALUE")]
        values: Vec<String>,
        #[arg(long)]
        overwrite: bool,
    },
    /// Write batch scripts for a job and submit them.
    Submit {
        #[command(flatten)]
        selection: SystemSelection,
        #[arg(short, long)]
        name: String,
        #[command(flatten)]
        resources: ResourceArgs,
    },
    /// Store the output geometries of a job.
    UpdateGeoms {
        #[command(flatten)]
        selection: SystemSelection,
        #[arg(short, long)]
        name: String,
        /// Status to record on the jobs.
        #[arg(long, default_value = "finished")]
        status: String,
        /// PWscf log in the job directory to read magnetizations from.
        #[arg(long, value_name = "FILE")]
        magnetization_log: Option<String>,
    },
    /// Store the vibrations and thermochemistry of a job.
    UpdateVibs {
        #[command(flatten)]
        selection: SystemSelection,
        #[arg(short, long, default_value = "freq")]
        name: String,
        #[arg(long, default_value = "vibenergies.txt", value_name = "FILE")]
        vib_file: String,
        /// Name of the created vibration set.
        #[arg(long, default_value = "PHVA")]
        vib_name: String,
        #[arg(long, value_name = "FILE")]
        thermo_file: Option<String>,
        #[arg(long, default_value = "finished")]
        status: String,
    },
    /// Create a transition-state system with an NEB job between two systems.
    InsertNeb {
        /// Name of the new transition-state system.
        #[arg(long)]
        ts: String,
        /// Name of the initial-state system.
        #[arg(long)]
        initial: String,
        /// Name of the final-state system.
        #[arg(long = "final")]
        final_state: String,
        #[arg(short, long, default_value = ".")]
        workdir: PathBuf,
        #[command(flatten)]
        source: JobSource,
        #[arg(long, default_value_t = 5)]
        nimage: i64,
        #[arg(long, default_value_t = 0.1)]
        springc: f64,
        /// Disable the climbing image.
        #[arg(long)]
        no_climb: bool,
        /// Python expression with initial magnetic moments.
        #[arg(long)]
        magmoms: Option<String>,
        #[arg(long, default_value_t = 0.2)]
        fmax: f64,
        #[arg(short = 'S', long = "set", value_name = "KEY=VALUE")]
        values: Vec<String>,
    },
    /// List jobs.
    List {
        #[arg(long)]
        system: Option<i64>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
}

/// Batch resources and submission behavior. Unset values come from the
/// `[submit]` table of the configuration file, then from built-in defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct ResourceArgs {
    /// Destination host (PBS only).
    #[arg(long)]
    pub host: Option<String>,
    #[arg(short = 'N', long)]
    pub nodes: Option<u32>,
    /// Processors per node.
    #[arg(short = 'p', long)]
    pub ppn: Option<u32>,
    #[arg(short = 'm', long, value_name = "MEM")]
    pub mem_per_cpu: Option<String>,
    #[arg(short = 'A', long)]
    pub account: Option<String>,
    #[arg(short = 'Q', long)]
    pub queue: Option<String>,
    /// Wall-clock limit as HH:MM:SS.
    #[arg(short = 'W', long)]
    pub walltime: Option<String>,
    /// Run in a scratch directory.
    #[arg(long)]
    pub scratch: bool,
    /// Program key of the site's job specifications.
    #[arg(short = 'P', long)]
    pub program: Option<String>,
    /// Write the job script without submitting it.
    #[arg(long)]
    pub no_submit: bool,
    /// Replace an existing job script without asking.
    #[arg(long, conflicts_with = "keep")]
    pub overwrite: bool,
    /// Keep an existing job script without asking.
    #[arg(long)]
    pub keep: bool,
    /// Site configuration file.
    #[arg(long, value_name = "PATH")]
    pub site_config: Option<PathBuf>,
    /// Configuration file with a `[submit]` table of defaults.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Input file for the program.
    pub input: String,
    /// Additional files staged with the input.
    #[arg(short = 'e', long = "extra-file", value_name = "FILE")]
    pub extra_files: Vec<String>,
    #[command(flatten)]
    pub resources: ResourceArgs,
}
