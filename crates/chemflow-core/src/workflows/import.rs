use super::WorkflowError;
use crate::core::io::read_structure;
use crate::db::convert::{SystemLabels, system_from_structure};
use crate::db::models::RecordId;
use crate::db::repo::{SqliteSystemRepository, SystemRepository};
use rusqlite::Connection;
use std::path::Path;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Frame to import; negative values count from the end.
    pub index: isize,
    pub labels: SystemLabels,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            index: -1,
            labels: SystemLabels::default(),
        }
    }
}

/// Reads one frame of `path` and stores it as a new system in a single
/// transaction. Returns the new system id.
#[instrument(skip_all, name = "import_structure", fields(path = %path.as_ref().display()))]
pub fn import_structure(
    conn: &mut Connection,
    path: impl AsRef<Path>,
    options: ImportOptions,
) -> Result<RecordId, WorkflowError> {
    let structure = read_structure(path.as_ref(), options.index)?;
    let system = system_from_structure(&structure, options.labels);

    let tx = conn.transaction()?;
    let id = SqliteSystemRepository::new(&tx).create_system(&system)?;
    tx.commit()?;

    info!(
        id,
        name = system.data.name.as_deref().unwrap_or(""),
        formula = system.data.formula.as_deref().unwrap_or(""),
        atoms = system.atoms.len(),
        "Imported system"
    );
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::write_trajectory;
    use crate::core::models::atom::Atom;
    use crate::core::models::cell::Cell;
    use crate::core::models::system::MolecularSystem;
    use crate::db::models::PropertyValue;
    use crate::db::open_db_in_memory;
    use nalgebra::Point3;

    fn write_frames(path: &Path) {
        let frames: Vec<MolecularSystem> = [1.0, 1.2]
            .into_iter()
            .map(|d| {
                let mut system = MolecularSystem::from_atoms(vec![
                    Atom::new("O", Point3::new(0.0, 0.0, 0.0)).unwrap(),
                    Atom::new("H", Point3::new(d, 0.0, 0.0)).unwrap(),
                ]);
                system.cell = Cell::orthorhombic(10.0, 10.0, 10.0);
                system.pbc = [true; 3];
                system.energy = Some(-d);
                system
            })
            .collect();
        write_trajectory(path, &frames).unwrap();
    }

    #[test]
    fn imports_the_selected_frame_with_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oh.xyz");
        write_frames(&path);

        let mut conn = open_db_in_memory().unwrap();
        let options = ImportOptions {
            index: 0,
            labels: SystemLabels {
                name: Some("OH".into()),
                topology: Some("gas".into()),
                username: Some("tester".into()),
                notes: [("source".to_string(), PropertyValue::Text("test".into()))].into(),
                ..SystemLabels::default()
            },
        };
        let id = import_structure(&mut conn, &path, options).unwrap();

        let systems = SqliteSystemRepository::new(&conn);
        let record = systems.get_system(id).unwrap();
        assert_eq!(record.data.name.as_deref(), Some("OH"));
        assert_eq!(record.data.formula.as_deref(), Some("HO"));
        assert_eq!(record.data.energy, Some(-1.0));
        assert_eq!(record.data.pbc, [true; 3]);
        assert_eq!(record.data.notes["source"], PropertyValue::Text("test".into()));
        assert_eq!(systems.atoms(id).unwrap().len(), 2);
    }

    #[test]
    fn last_frame_is_the_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oh.xyz");
        write_frames(&path);

        let mut conn = open_db_in_memory().unwrap();
        let id = import_structure(&mut conn, &path, ImportOptions::default()).unwrap();
        let record = SqliteSystemRepository::new(&conn).get_system(id).unwrap();
        assert_eq!(record.data.energy, Some(-1.2));
    }

    #[test]
    fn unreadable_files_store_nothing() {
        let mut conn = open_db_in_memory().unwrap();
        let result = import_structure(&mut conn, "missing.xyz", ImportOptions::default());
        assert!(matches!(result, Err(WorkflowError::Structure(_))));
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM systems;", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 0);
    }
}
