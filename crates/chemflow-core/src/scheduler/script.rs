use super::SchedulerError;
use super::request::SubmitRequest;
use super::site::SiteConfig;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::LazyLock;

static FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid field regex"));

/// Expands `{key}` placeholders of a site command; `{{` and `}}` are literal
/// braces.
pub fn format_command(command: &str, fields: &BTreeMap<&str, String>) -> Result<String, SchedulerError> {
    let mut unknown = None;
    let expanded = FIELD_RE.replace_all(command, |caps: &Captures<'_>| match caps.get(1) {
        None => caps[0][..1].to_string(),
        Some(key) => match fields.get(key.as_str()) {
            Some(value) => value.clone(),
            None => {
                unknown.get_or_insert_with(|| key.as_str().to_string());
                String::new()
            }
        },
    });
    match unknown {
        Some(key) => Err(SchedulerError::UnknownCommandKey {
            key,
            command: command.to_string(),
        }),
        None => Ok(expanded.into_owned()),
    }
}

/// Renders the complete job script for `request` on `site`.
pub fn render_job_script(request: &SubmitRequest, site: &SiteConfig) -> Result<String, SchedulerError> {
    let jobspec = site.jobspec(&request.program)?;
    let mut fields = request.command_fields();
    fields.insert("home", site.home.to_string_lossy().into_owned());
    if let Some(scratch) = &site.scratch {
        fields.insert("scratch", scratch.to_string_lossy().into_owned());
    }

    let mut script = String::from("#!/bin/bash\n");
    script.push_str(&site.batch.directives(request));
    script.push('\n');

    if !site.lib_paths.is_empty() {
        let _ = writeln!(script, "export LD_LIBRARY_PATH=$LD_LIBRARY_PATH:{}\n", site.lib_paths.join(":"));
    }
    if let Some(modules) = &jobspec.modules {
        let _ = writeln!(script, "{modules}");
    }
    for (name, value) in &site.vars {
        let _ = writeln!(script, "export {name}={value}");
    }
    if let Some(precmd) = &jobspec.precmd {
        let _ = writeln!(script, "\n{}", format_command(precmd, &fields)?);
    }
    if request.scratch {
        let root = site.scratch.as_ref().ok_or(SchedulerError::NoScratchDir)?;
        let workdir = root.join(request.jobname());
        let mut files = request.input.clone();
        for extra in &request.extra_files {
            files.push(' ');
            files.push_str(extra);
        }
        let _ = writeln!(script, "mkdir -p {}", workdir.display());
        let _ = writeln!(script, "cp -t {} {files}", workdir.display());
        let _ = writeln!(script, "cd {}", workdir.display());
    }
    script.push_str("\n# Do the work\n");
    let _ = writeln!(script, "{}", format_command(&jobspec.cmd, &fields)?);
    if let Some(postcmd) = &jobspec.postcmd {
        script.push_str(&format_command(postcmd, &fields)?);
        if !postcmd.ends_with('\n') {
            script.push('\n');
        }
    }
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::batch::BatchSystem;
    use crate::scheduler::site::JobSpec;
    use std::path::PathBuf;

    fn site() -> SiteConfig {
        SiteConfig {
            batch: BatchSystem::Slurm,
            home: PathBuf::from("/home/tester"),
            scratch: Some(PathBuf::from("/scratch/tester")),
            lib_paths: vec!["/opt/lib".into()],
            vars: BTreeMap::from([("OMP_NUM_THREADS".to_string(), "1".to_string())]),
            jobspec: BTreeMap::from([(
                "pythonqe".to_string(),
                JobSpec {
                    modules: Some("module load espresso".into()),
                    precmd: Some("source {home}/.env".into()),
                    cmd: "python {input} > {outfile}".into(),
                    postcmd: Some("cp {outfile} {workdir}".into()),
                },
            )]),
        }
    }

    #[test]
    fn commands_expand_request_fields() {
        let fields = BTreeMap::from([("input", "relax.py".to_string())]);
        assert_eq!(format_command("python {input}", &fields).unwrap(), "python relax.py");
        assert_eq!(format_command("awk '{{print $1}}'", &fields).unwrap(), "awk '{print $1}'");
        let err = format_command("run {nope} {input}", &fields).unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownCommandKey { key, .. } if key == "nope"));
    }

    #[test]
    fn renders_every_section_in_order() {
        let mut request = SubmitRequest::new("relax.py", "/home/tester/calc/H2O");
        request.scratch = true;
        request.extra_files = vec!["H2O.xyz".into()];
        let script = render_job_script(&request, &site()).unwrap();

        let expected = "#!/bin/bash
#SBATCH --job-name=calc/H2O
#SBATCH --account=nn4683k
#SBATCH --time=120:00:00
#SBATCH --mem-per-cpu=3700M
#SBATCH --nodes=1 --ntasks-per-node=16
#SBATCH --mail-type=FAIL

export LD_LIBRARY_PATH=$LD_LIBRARY_PATH:/opt/lib

module load espresso
export OMP_NUM_THREADS=1

source /home/tester/.env
mkdir -p /scratch/tester/relax
cp -t /scratch/tester/relax relax.py H2O.xyz
cd /scratch/tester/relax

# Do the work
python relax.py > relax.out
cp relax.out /home/tester/calc/H2O
";
        assert_eq!(script, expected);
    }

    #[test]
    fn scratch_needs_a_scratch_root() {
        let mut site = site();
        site.scratch = None;
        let mut request = SubmitRequest::new("relax.py", "/tmp");
        request.scratch = true;
        assert!(matches!(render_job_script(&request, &site), Err(SchedulerError::NoScratchDir)));
    }

    #[test]
    fn unknown_programs_fail() {
        let mut request = SubmitRequest::new("relax.py", "/tmp");
        request.program = "vasp".into();
        assert!(matches!(
            render_job_script(&request, &site()),
            Err(SchedulerError::UnknownProgram { .. })
        ));
    }
}
