use chemflow::engine::manager::default_job_resources;
use chemflow::scheduler::request::{
    DEFAULT_ACCOUNT, DEFAULT_MEM_PER_CPU, DEFAULT_NODES, DEFAULT_PPN, DEFAULT_PROGRAM, DEFAULT_QUEUE,
    DEFAULT_WALLTIME,
};

pub struct DefaultsConfig {
    pub nodes: u32,
    pub ppn: u32,
    pub mem_per_cpu: String,
    pub account: String,
    pub queue: String,
    pub walltime: String,
    pub program: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            nodes: DEFAULT_NODES,
            ppn: DEFAULT_PPN,
            mem_per_cpu: DEFAULT_MEM_PER_CPU.to_string(),
            account: DEFAULT_ACCOUNT.to_string(),
            queue: DEFAULT_QUEUE.to_string(),
            walltime: DEFAULT_WALLTIME.to_string(),
            program: DEFAULT_PROGRAM.to_string(),
        }
    }
}

impl DefaultsConfig {
    /// Defaults for jobs submitted from the database.
    pub fn jobs() -> Self {
        let resources = default_job_resources();
        Self {
            nodes: resources.nodes,
            ppn: resources.ppn,
            mem_per_cpu: resources.mem_per_cpu,
            account: resources.account,
            queue: resources.queue,
            walltime: resources.walltime,
            program: resources.program,
        }
    }
}
