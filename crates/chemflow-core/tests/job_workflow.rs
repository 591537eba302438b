use chemflow::core::io::{read_structure, write_structure};
use chemflow::core::models::atom::Atom;
use chemflow::core::models::cell::Cell;
use chemflow::core::models::system::MolecularSystem;
use chemflow::core::template::{Substitutions, TemplateValue};
use chemflow::db::convert::SystemLabels;
use chemflow::db::models::{JobStatus, NewCalculator, PropertyValue};
use chemflow::db::open_db;
use chemflow::db::repo::{
    CalculatorRepository, JobRepository, SqliteCalculatorRepository, SqliteJobRepository, SqliteSystemRepository,
    SqliteTemplateRepository, SqliteVibrationRepository, SystemRepository, TemplateRepository, VibrationRepository,
};
use chemflow::engine::manager::default_job_resources;
use chemflow::engine::{GeometryUpdate, InsertJobs, InsertVibrationJobs, JobManager, SubmitContext, VibrationUpdate};
use chemflow::scheduler::submit::LEDGER_FILE;
use chemflow::scheduler::{ExistingScript, SchedulerError, SiteConfig, Submitter};
use chemflow::workflows::{ImportOptions, import_structure};
use nalgebra::Point3;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

const RELAX_TEMPLATE: &str = "\
from ase.io import read
atoms = read(%atoms)
calc = Espresso(pw=%pw, xc=%xc, kpts=%kpts)
";

const VIB_TEMPLATE: &str = "\
atoms = read(%atoms)
vib = Vibrations(atoms, delta=%delta)
";

struct FakeScheduler {
    calls: RefCell<Vec<PathBuf>>,
}

impl Submitter for FakeScheduler {
    fn submit(&self, executable: &str, script: &Path, workdir: &Path) -> Result<String, SchedulerError> {
        assert_eq!(executable, "sbatch");
        self.calls.borrow_mut().push(workdir.join(script));
        Ok(format!("Submitted batch job {}\n", 100 + self.calls.borrow().len()))
    }
}

fn water(oh: f64) -> MolecularSystem {
    let mut system = MolecularSystem::from_atoms(vec![
        Atom::new("O", Point3::new(5.0, 5.0, 5.0)).unwrap(),
        Atom::new("H", Point3::new(5.0 + oh, 5.0, 5.0)).unwrap(),
        Atom::new("H", Point3::new(5.0, 5.0 + oh, 5.0)).unwrap(),
    ]);
    system.cell = Cell::orthorhombic(10.0, 10.0, 10.0);
    system.pbc = [true; 3];
    system
}

#[test]
fn relax_then_vibrate_then_submit() {
    let dir = tempfile::tempdir().unwrap();
    let work = dir.path().join("calcs");
    let mut conn = open_db(dir.path().join("campaign.db")).unwrap();

    let input = dir.path().join("water.xyz");
    write_structure(&input, &water(1.0)).unwrap();
    let system_id = import_structure(
        &mut conn,
        &input,
        ImportOptions {
            index: -1,
            labels: SystemLabels {
                name: Some("H2O(g)".into()),
                ..SystemLabels::default()
            },
        },
    )
    .unwrap();

    let calculator_id = SqliteCalculatorRepository::new(&conn)
        .create_calculator(&NewCalculator {
            name: "espresso".into(),
            attributes: [
                ("pw".to_string(), PropertyValue::Int(500)),
                ("xc".to_string(), PropertyValue::Text("PBE".into())),
                ("kpts".to_string(), PropertyValue::Text("(1, 1, 1)".into())),
            ]
            .into(),
            ..NewCalculator::default()
        })
        .unwrap();
    let templates = SqliteTemplateRepository::new(&conn);
    let relax_template = templates.create_template("relax.py", RELAX_TEMPLATE).unwrap();
    let vib_template = templates.create_template("vib.py", VIB_TEMPLATE).unwrap();

    let mut manager = JobManager::new(&mut conn).with_username(Some("tester".into()));

    let mut relax = InsertJobs::new("relax", &work);
    relax.template_id = Some(relax_template);
    relax.calculator_id = Some(calculator_id);
    manager.insert_jobs(&[system_id], &relax).unwrap();

    let report = manager
        .write_jobs(&[system_id], "relax", &Substitutions::new(), false)
        .unwrap();
    let jobdir = work.join("H2O_g_");
    assert_eq!(report.written, vec![jobdir.join("relax.py")]);
    let script = fs::read_to_string(jobdir.join("relax.py")).unwrap();
    assert_eq!(
        script,
        "from ase.io import read\natoms = read('structure.xyz')\ncalc = Espresso(pw=500, xc='PBE', kpts=(1, 1, 1))\n"
    );
    assert_eq!(read_structure(jobdir.join("structure.xyz"), 0).unwrap().len(), 3);

    let mut relaxed = water(0.97);
    relaxed.energy = Some(-469.25);
    write_structure(jobdir.join("relaxed.xyz"), &relaxed).unwrap();
    manager
        .update_geometries(&[system_id], "relax", &GeometryUpdate::default())
        .unwrap();

    let vib = InsertVibrationJobs {
        relax_name: "relax".into(),
        vib_name: "freq".into(),
        template_id: Some(vib_template),
        calculator_id: Some(calculator_id),
        hostname: None,
    };
    manager.insert_vibration_jobs(&[system_id], &vib).unwrap();
    let overrides = Substitutions::from([("delta".to_string(), TemplateValue::Float(0.01))]);
    let report = manager
        .write_vibration_jobs(&[system_id], "relax", "freq", &overrides, false)
        .unwrap();
    let vibdir = jobdir.join("freq");
    assert_eq!(report.written, vec![vibdir.join("freq.py")]);
    let script = fs::read_to_string(vibdir.join("freq.py")).unwrap();
    assert!(script.contains(&format!("read('{}')", jobdir.join("relaxed.xyz").display())));

    let site = SiteConfig::from_toml_str(
        &format!(
            "batch = \"slurm\"\nhome = \"{}\"\n[jobspec.pythonqe]\ncmd = \"python {{input}} > {{outfile}}\"\n",
            dir.path().display()
        ),
        Path::new("site.toml"),
    )
    .unwrap();
    let scheduler = FakeScheduler {
        calls: RefCell::new(Vec::new()),
    };
    let context = SubmitContext {
        site: &site,
        submitter: &scheduler,
        resources: default_job_resources(),
        existing: ExistingScript::Overwrite,
        submit: true,
    };
    let outcomes = manager
        .submit_jobs(&[system_id], "freq", &context, &mut |_| true)
        .unwrap();
    assert_eq!(outcomes[0].job_id.as_deref(), Some("101"));
    assert_eq!(scheduler.calls.borrow().as_slice(), &[vibdir.join("run.freq")]);
    let job_script = fs::read_to_string(vibdir.join("run.freq")).unwrap();
    assert!(job_script.contains("#SBATCH --nodes=2 --ntasks-per-node=16\n"));
    assert!(job_script.contains("python freq.py > freq.out"));
    assert!(fs::read_to_string(dir.path().join(LEDGER_FILE)).unwrap().starts_with("101 "));

    fs::write(vibdir.join("vibenergies.txt"), "0.0123 0.0\n0.4500\n0.0 0.0021\n").unwrap();
    fs::write(
        vibdir.join("thermo.toml"),
        "kind = \"HarmonicThermo\"\ntemperature = 298.15\nentropy = 0.0012\ninternal_energy = -469.1\nfree_energy = -469.5\n",
    )
    .unwrap();
    let update = VibrationUpdate {
        thermo_file: Some("thermo.toml".into()),
        ..VibrationUpdate::default()
    };
    manager.update_vibrations(&[system_id], "freq", &update).unwrap();
    drop(manager);

    let systems = SqliteSystemRepository::new(&conn);
    let record = systems.get_system(system_id).unwrap();
    assert_eq!(record.data.energy, Some(-469.25));
    assert_eq!(record.data.formula.as_deref(), Some("H2O"));
    assert_eq!(record.data.thermo.as_deref(), Some("HarmonicThermo@298.15"));
    assert_eq!(record.data.internal_energy, Some(-469.1));
    assert_eq!(record.data.free_energy, Some(-469.5));
    let atoms = systems.atoms(system_id).unwrap();
    assert!((atoms[1].position[0] - 5.97).abs() < 1e-9);

    let jobs = SqliteJobRepository::new(&conn);
    let relax_job = jobs.find_job(system_id, "relax").unwrap();
    assert_eq!(relax_job.status, JobStatus::Finished);
    assert_eq!(relax_job.username.as_deref(), Some("tester"));
    assert!(relax_job.jobscript.unwrap().contains("Espresso"));
    let freq_job = jobs.find_job(system_id, "freq").unwrap();
    assert_eq!(freq_job.status, JobStatus::Finished);
    assert_eq!(freq_job.outname, "vibenergies.txt");

    let sets = SqliteVibrationRepository::new(&conn).vibration_sets(system_id).unwrap();
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].name, "PHVA");
    assert_eq!(sets[0].vibrations.len(), 3);
    assert_eq!(sets[0].vibrations[2].energy_imag, 0.0021);
}

#[test]
fn insert_neb_prepares_both_end_points() {
    let dir = tempfile::tempdir().unwrap();
    let mut conn = open_db(dir.path().join("neb.db")).unwrap();

    for (name, oh) in [("IS", 1.0), ("FS", 1.4)] {
        let input = dir.path().join(format!("{name}.xyz"));
        write_structure(&input, &water(oh)).unwrap();
        import_structure(
            &mut conn,
            &input,
            ImportOptions {
                index: 0,
                labels: SystemLabels {
                    name: Some(name.into()),
                    topology: Some("MFI".into()),
                    ..SystemLabels::default()
                },
            },
        )
        .unwrap();
    }
    let template = SqliteTemplateRepository::new(&conn)
        .create_template(
            "neb.py",
            "initial = read(%initial)\nfinal = read(%final)\nneb = NEB(images(%nimage), k=%springc, climb=%climb)\nmagmoms = %magmoms\nfmax = %fmax\n",
        )
        .unwrap();

    let mut options = chemflow::engine::NebOptions::new("TS", "IS", "FS", dir.path());
    options.template_id = Some(template);
    let outcome = JobManager::new(&mut conn).insert_neb(&options).unwrap();

    let jobdir = dir.path().join("TS");
    assert_eq!(outcome.report.written, vec![jobdir.join("neb.py")]);
    assert_eq!(
        fs::read_to_string(jobdir.join("neb.py")).unwrap(),
        "initial = read('initial.xyz')\nfinal = read('final.xyz')\nneb = NEB(images(5), k=0.1, climb=True)\nmagmoms = None\nfmax = 0.2\n"
    );
    let final_state = read_structure(jobdir.join("final.xyz"), 0).unwrap();
    assert!((final_state.atoms[1].position.x - 6.4).abs() < 1e-9);
    assert!(jobdir.join("initial.xyz").exists());

    let ts = SqliteSystemRepository::new(&conn).get_system(outcome.system_id).unwrap();
    assert_eq!(ts.data.name.as_deref(), Some("TS"));
    assert_eq!(ts.data.topology.as_deref(), Some("MFI"));
    let job = SqliteJobRepository::new(&conn).get_job(outcome.job_id).unwrap();
    assert_eq!(job.name, "neb");
    assert_eq!(job.status, JobStatus::NotStarted);
}
