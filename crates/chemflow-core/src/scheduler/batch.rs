use super::SchedulerError;
use super::request::SubmitRequest;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Batch queueing systems that job scripts can be written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum BatchSystem {
    Pbs,
    Slurm,
}

impl BatchSystem {
    pub const ALL: [BatchSystem; 2] = [Self::Pbs, Self::Slurm];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pbs => "pbs",
            Self::Slurm => "slurm",
        }
    }

    /// The command that queues a job script.
    pub fn executable(&self) -> &'static str {
        match self {
            Self::Pbs => "qsub",
            Self::Slurm => "sbatch",
        }
    }

    /// Scheduler directives for the top of a job script, newline terminated.
    pub fn directives(&self, request: &SubmitRequest) -> String {
        match self {
            Self::Pbs => pbs_directives(request),
            Self::Slurm => slurm_directives(request),
        }
    }
}

impl fmt::Display for BatchSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BatchSystem {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|batch| batch.name() == lowered)
            .ok_or_else(|| SchedulerError::UnsupportedBatch {
                name: s.to_string(),
                supported: Self::ALL.iter().map(|b| b.name().to_string()).collect(),
            })
    }
}

impl TryFrom<String> for BatchSystem {
    type Error = SchedulerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Last eight characters of the working directory.
fn short_job_name(request: &SubmitRequest) -> String {
    let workdir = request.workdir.to_string_lossy();
    let chars: Vec<char> = workdir.chars().collect();
    chars[chars.len().saturating_sub(8)..].iter().collect()
}

fn pbs_directives(request: &SubmitRequest) -> String {
    let mut directives = format!(
        "#PBS -N {}\n#PBS -A {}\n#PBS -l walltime={}\n#PBS -l pmem={}\n",
        short_job_name(request),
        request.account,
        request.walltime,
        request.mem_per_cpu
    );
    match &request.host {
        Some(host) => directives.push_str(&format!("#PBS -l nodes={host}:ppn={}\n", request.ppn)),
        None => directives.push_str(&format!("#PBS -l nodes={}:ppn={}\n", request.nodes, request.ppn)),
    }
    if request.queue != "default" {
        directives.push_str(&format!("#PBS -q {}\n", request.queue));
    }
    directives.push_str("#PBS -j oe\n");
    directives
}

fn slurm_directives(request: &SubmitRequest) -> String {
    format!(
        "#SBATCH --job-name={}\n#SBATCH --account={}\n#SBATCH --time={}\n#SBATCH --mem-per-cpu={}\n#SBATCH --nodes={} --ntasks-per-node={}\n#SBATCH --mail-type=FAIL\n",
        short_job_name(request),
        request.account,
        request.walltime,
        request.mem_per_cpu,
        request.nodes,
        request.ppn
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SubmitRequest {
        SubmitRequest::new("relax.py", "/home/user/calc/CH4_relax")
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!("PBS".parse::<BatchSystem>().unwrap(), BatchSystem::Pbs);
        assert_eq!(" Slurm".parse::<BatchSystem>().unwrap(), BatchSystem::Slurm);
        let err = "lsf".parse::<BatchSystem>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Support for batch system 'lsf' is not implemented, supported batch systems are: pbs, slurm"
        );
    }

    #[test]
    fn pbs_directives_use_nodes_or_host() {
        let mut request = request();
        assert_eq!(
            BatchSystem::Pbs.directives(&request),
            "#PBS -N H4_relax\n#PBS -A nn4683k\n#PBS -l walltime=120:00:00\n#PBS -l pmem=3700M\n#PBS -l nodes=1:ppn=16\n#PBS -j oe\n"
        );

        request.host = Some("node-7".into());
        request.queue = "express".into();
        let directives = BatchSystem::Pbs.directives(&request);
        assert!(directives.contains("#PBS -l nodes=node-7:ppn=16\n#PBS -q express\n#PBS -j oe\n"));
    }

    #[test]
    fn slurm_directives_match_the_site_layout() {
        let mut request = request();
        request.nodes = 2;
        request.walltime = "12:00:00".into();
        assert_eq!(
            BatchSystem::Slurm.directives(&request),
            "#SBATCH --job-name=H4_relax\n#SBATCH --account=nn4683k\n#SBATCH --time=12:00:00\n#SBATCH --mem-per-cpu=3700M\n#SBATCH --nodes=2 --ntasks-per-node=16\n#SBATCH --mail-type=FAIL\n"
        );
    }

    #[test]
    fn short_workdirs_are_used_whole() {
        let request = SubmitRequest::new("a.py", "/tmp");
        assert!(BatchSystem::Slurm.directives(&request).starts_with("#SBATCH --job-name=/tmp\n"));
    }
}
