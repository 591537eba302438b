//! Conversion between in-memory structures and stored records.

use super::models::{AtomRecord, NewSystem, PropertyValue, RecordId, SystemData};
use super::repo::{RepoError, RepoResult, SqliteSystemRepository, SystemRepository};
use crate::core::models::atom::{Atom, AtomError};
use crate::core::models::cell::Cell;
use crate::core::models::system::MolecularSystem;
use nalgebra::{Point3, Vector3};
use rusqlite::Connection;
use std::collections::BTreeMap;

/// Descriptive columns supplied alongside a structure when it is stored.
///
/// `name` and `topology` fall back to the values carried by the structure.
#[derive(Debug, Clone, Default)]
pub struct SystemLabels {
    pub name: Option<String>,
    pub topology: Option<String>,
    pub username: Option<String>,
    pub magnetic_moment: Option<f64>,
    pub notes: BTreeMap<String, PropertyValue>,
}

/// Builds the rows describing `structure`.
///
/// The structure's free-form info entries become notes, with `labels.notes`
/// taking precedence on clashing keys.
pub fn system_from_structure(structure: &MolecularSystem, labels: SystemLabels) -> NewSystem {
    let mut notes: BTreeMap<String, PropertyValue> = structure
        .info
        .iter()
        .map(|(k, v)| (k.clone(), PropertyValue::parse_literal(v)))
        .collect();
    notes.extend(labels.notes);

    let mut data = SystemData {
        name: labels.name.or_else(|| structure.name.clone()),
        topology: labels.topology.or_else(|| structure.topology.clone()),
        username: labels.username,
        magnetic_moment: labels.magnetic_moment,
        notes,
        ..SystemData::default()
    };
    apply_structure(&mut data, structure);

    NewSystem {
        data,
        atoms: atom_records(structure),
    }
}

/// Copies the geometry-derived columns (formula, cell, pbc, energy) of
/// `structure` onto `data`.
pub fn apply_structure(data: &mut SystemData, structure: &MolecularSystem) {
    data.formula = Some(structure.chemical_formula());
    data.cell = (!structure.cell.is_zero()).then(|| structure.cell.parameters());
    data.pbc = structure.pbc;
    data.energy = structure.energy;
}

pub fn atom_records(structure: &MolecularSystem) -> Vec<AtomRecord> {
    structure
        .atoms
        .iter()
        .map(|atom| AtomRecord {
            atomic_number: atom.atomic_number,
            mass: atom.mass,
            tag: atom.tag,
            position: atom.position.coords.into(),
            force: atom.force.map(Into::into),
            momentum: atom.momentum.into(),
            charge: atom.charge,
            magmom: atom.magmom,
            initial_magmom: atom.initial_magmom,
            initial_charge: atom.initial_charge,
        })
        .collect()
}

pub fn atom_from_record(record: &AtomRecord) -> Result<Atom, AtomError> {
    let mut atom = Atom::from_number(record.atomic_number, Point3::from(record.position))?;
    atom.mass = record.mass;
    atom.tag = record.tag;
    atom.force = record.force.map(Vector3::from);
    atom.momentum = Vector3::from(record.momentum);
    atom.charge = record.charge;
    atom.magmom = record.magmom;
    atom.initial_magmom = record.initial_magmom;
    atom.initial_charge = record.initial_charge;
    Ok(atom)
}

/// Rebuilds the structure stored as system `id`.
///
/// # Errors
///
/// [`RepoError::NotFound`] for an unknown id, [`RepoError::InvalidData`] when
/// a stored atomic number is not a known element.
pub fn structure_from_system(conn: &Connection, id: RecordId) -> RepoResult<MolecularSystem> {
    let repo = SqliteSystemRepository::new(conn);
    let record = repo.get_system(id)?;
    let atoms = repo
        .atoms(id)?
        .iter()
        .map(atom_from_record)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| RepoError::InvalidData(format!("system {id}: {e}")))?;

    let mut structure = MolecularSystem::from_atoms(atoms);
    let data = record.data;
    structure.cell = data.cell.map(Cell::from_parameters).unwrap_or_default();
    structure.pbc = data.pbc;
    structure.name = data.name;
    structure.topology = data.topology;
    structure.energy = data.energy;
    structure.info = data
        .notes
        .into_iter()
        .map(|(k, v)| (k, v.to_string()))
        .collect();
    Ok(structure)
}
