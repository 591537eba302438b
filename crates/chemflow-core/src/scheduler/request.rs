use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_NODES: u32 = 1;
pub const DEFAULT_PPN: u32 = 16;
pub const DEFAULT_MEM_PER_CPU: &str = "3700M";
pub const DEFAULT_ACCOUNT: &str = "nn4683k";
pub const DEFAULT_QUEUE: &str = "default";
pub const DEFAULT_WALLTIME: &str = "120:00:00";
pub const DEFAULT_PROGRAM: &str = "pythonqe";

/// Resources and files of a single batch submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Input file handed to the program; also names the job.
    pub input: String,
    /// Additional files staged to scratch together with the input.
    pub extra_files: Vec<String>,
    /// Destination host; takes the place of the node count in PBS directives.
    pub host: Option<String>,
    pub nodes: u32,
    pub ppn: u32,
    pub mem_per_cpu: String,
    pub account: String,
    /// Queue name; `default` leaves the queue to the scheduler.
    pub queue: String,
    /// Wall-clock limit as `HH:MM:SS`.
    pub walltime: String,
    /// Run in a per-job scratch directory instead of `workdir`.
    pub scratch: bool,
    /// Key into the site's `[jobspec]` tables.
    pub program: String,
    /// Directory the job is submitted from.
    pub workdir: PathBuf,
}

impl SubmitRequest {
    /// A request for `input` in `workdir` with the default resources.
    pub fn new(input: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            extra_files: Vec::new(),
            host: None,
            nodes: DEFAULT_NODES,
            ppn: DEFAULT_PPN,
            mem_per_cpu: DEFAULT_MEM_PER_CPU.to_string(),
            account: DEFAULT_ACCOUNT.to_string(),
            queue: DEFAULT_QUEUE.to_string(),
            walltime: DEFAULT_WALLTIME.to_string(),
            scratch: false,
            program: DEFAULT_PROGRAM.to_string(),
            workdir: workdir.into(),
        }
    }

    /// The input file name without its last extension.
    pub fn jobname(&self) -> String {
        Path::new(&self.input).with_extension("").to_string_lossy().into_owned()
    }

    pub fn outfile(&self) -> String {
        format!("{}.out", self.jobname())
    }

    pub fn script_name(&self) -> String {
        format!("run.{}", self.jobname())
    }

    pub fn script_path(&self) -> PathBuf {
        self.workdir.join(self.script_name())
    }

    /// Values available to `{key}` placeholders in site commands.
    pub fn command_fields(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("input", self.input.clone()),
            ("extrafiles", self.extra_files.join(" ")),
            ("host", self.host.clone().unwrap_or_default()),
            ("nodes", self.nodes.to_string()),
            ("ppn", self.ppn.to_string()),
            ("mem_per_cpu", self.mem_per_cpu.clone()),
            ("account", self.account.clone()),
            ("queue", self.queue.clone()),
            ("walltime", self.walltime.clone()),
            ("program", self.program.clone()),
            ("workdir", self.workdir.to_string_lossy().into_owned()),
            ("jobname", self.jobname()),
            ("outfile", self.outfile()),
            ("script_name", self.script_name()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_derive_from_the_input_stem() {
        let request = SubmitRequest::new("pw.relax.py", "/work");
        assert_eq!(request.jobname(), "pw.relax");
        assert_eq!(request.outfile(), "pw.relax.out");
        assert_eq!(request.script_name(), "run.pw.relax");
        assert_eq!(request.script_path(), PathBuf::from("/work/run.pw.relax"));
    }

    #[test]
    fn defaults_match_a_full_node() {
        let request = SubmitRequest::new("input.py", ".");
        assert_eq!((request.nodes, request.ppn), (1, 16));
        assert_eq!(request.walltime, "120:00:00");
        assert_eq!(request.program, "pythonqe");
        assert_eq!(request.command_fields()["outfile"], "input.out");
    }
}
