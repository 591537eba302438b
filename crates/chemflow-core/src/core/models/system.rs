use super::atom::Atom;
use super::cell::Cell;
use nalgebra::{Point3, Vector3};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SystemError {
    #[error("Expected {expected} positions but {found} were given")]
    LengthMismatch { expected: usize, found: usize },
    #[error("Atom index {index} is out of range for a system of {len} atoms")]
    IndexOutOfRange { index: usize, len: usize },
}

/// A molecular or crystalline structure: an ordered list of atoms in a cell.
///
/// This is the in-memory counterpart of a persisted system row. Atom order is
/// significant and is preserved by every operation that does not explicitly
/// reorder atoms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MolecularSystem {
    /// Atoms in their stored order.
    pub atoms: Vec<Atom>,
    /// Periodic cell; all-zero for isolated molecules.
    pub cell: Cell,
    /// Periodic boundary conditions along the three lattice vectors.
    pub pbc: [bool; 3],
    /// Human-readable identifier of the structure.
    pub name: Option<String>,
    /// Free-form topology code (e.g. a zeolite framework type).
    pub topology: Option<String>,
    /// Potential energy in eV, when known.
    pub energy: Option<f64>,
    /// Additional string metadata carried along with the structure.
    pub info: BTreeMap<String, String>,
}

impl MolecularSystem {
    /// Creates a new, empty system without a cell.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a system from a list of atoms without a cell.
    ///
    /// # Arguments
    ///
    /// * `atoms` - The atoms in the order they should be stored.
    pub fn from_atoms(atoms: Vec<Atom>) -> Self {
        Self {
            atoms,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn push(&mut self, atom: Atom) {
        self.atoms.push(atom);
    }

    /// Appends all atoms of `other`, keeping this system's cell and metadata.
    pub fn extend_from(&mut self, other: &MolecularSystem) {
        self.atoms.extend(other.atoms.iter().cloned());
    }

    /// Removes the atoms at the given indices.
    ///
    /// Indices that do not exist are ignored; duplicates are removed once.
    ///
    /// # Return
    ///
    /// The number of atoms actually removed.
    pub fn remove_atoms(&mut self, indices: &[usize]) -> usize {
        let doomed: HashSet<usize> = indices.iter().copied().collect();
        let before = self.atoms.len();
        let mut index = 0;
        self.atoms.retain(|_| {
            let keep = !doomed.contains(&index);
            index += 1;
            keep
        });
        before - self.atoms.len()
    }

    pub fn atom(&self, index: usize) -> Result<&Atom, SystemError> {
        let len = self.atoms.len();
        self.atoms
            .get(index)
            .ok_or(SystemError::IndexOutOfRange { index, len })
    }

    pub fn atom_mut(&mut self, index: usize) -> Result<&mut Atom, SystemError> {
        let len = self.atoms.len();
        self.atoms
            .get_mut(index)
            .ok_or(SystemError::IndexOutOfRange { index, len })
    }

    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.atoms.iter().map(|a| a.position).collect()
    }

    /// Replaces all atomic positions.
    ///
    /// # Errors
    ///
    /// Returns [`SystemError::LengthMismatch`] if the number of positions
    /// differs from the number of atoms.
    pub fn set_positions(&mut self, positions: &[Point3<f64>]) -> Result<(), SystemError> {
        if positions.len() != self.atoms.len() {
            return Err(SystemError::LengthMismatch {
                expected: self.atoms.len(),
                found: positions.len(),
            });
        }
        for (atom, position) in self.atoms.iter_mut().zip(positions) {
            atom.position = *position;
        }
        Ok(())
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.atoms.iter().map(|a| a.symbol.as_str()).collect()
    }

    /// Returns the forces of all atoms, or `None` if any atom lacks a force.
    pub fn forces(&self) -> Option<Vec<Vector3<f64>>> {
        self.atoms.iter().map(|a| a.force).collect()
    }

    pub fn is_periodic(&self) -> bool {
        self.pbc.iter().any(|&p| p)
    }

    /// Chemical formula in Hill notation.
    ///
    /// Carbon comes first, then hydrogen, then all other elements in
    /// alphabetical order. Without carbon every element, hydrogen included, is
    /// ordered alphabetically. Counts of one are omitted.
    pub fn chemical_formula(&self) -> String {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for atom in &self.atoms {
            *counts.entry(atom.symbol.as_str()).or_default() += 1;
        }

        let mut formula = String::new();
        let mut push = |symbol: &str, count: usize| {
            formula.push_str(symbol);
            if count > 1 {
                formula.push_str(&count.to_string());
            }
        };

        if let Some(carbon) = counts.remove("C") {
            push("C", carbon);
            if let Some(hydrogen) = counts.remove("H") {
                push("H", hydrogen);
            }
        }
        for (symbol, count) in counts {
            push(symbol, count);
        }
        formula
    }

    /// Mass-weighted center of the atoms.
    ///
    /// # Return
    ///
    /// `None` for an empty system or one whose total mass is zero.
    pub fn center_of_mass(&self) -> Option<Point3<f64>> {
        let total: f64 = self.atoms.iter().map(|a| a.mass).sum();
        if self.atoms.is_empty() || total == 0.0 {
            return None;
        }
        let weighted = self
            .atoms
            .iter()
            .fold(Vector3::zeros(), |acc, a| acc + a.position.coords * a.mass);
        Some(Point3::from(weighted / total))
    }

    pub fn translate(&mut self, displacement: &Vector3<f64>) {
        for atom in &mut self.atoms {
            atom.position += displacement;
        }
    }

    /// Axis-aligned bounding box of the atomic positions as `(min, max)`.
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = self.atoms.first()?.position;
        Some(self.atoms.iter().skip(1).fold((first, first), |(lo, hi), a| {
            (lo.inf(&a.position), hi.sup(&a.position))
        }))
    }

    /// Moves the atoms so that their bounding box is centered in the cell.
    ///
    /// For a zero (or singular) cell the bounding box is centered on the origin.
    pub fn center(&mut self) {
        let Some((lo, hi)) = self.bounding_box() else {
            return;
        };
        let middle = Point3::from((lo.coords + hi.coords) / 2.0);

        let target = if self.cell.is_zero() {
            Point3::origin()
        } else {
            self.cell.cartesian(&Vector3::new(0.5, 0.5, 0.5))
        };
        self.translate(&(target - middle));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(symbol: &str, x: f64, y: f64, z: f64) -> Atom {
        Atom::new(symbol, Point3::new(x, y, z)).unwrap()
    }

    fn ethanol() -> MolecularSystem {
        MolecularSystem::from_atoms(vec![
            atom("C", 0.0, 0.0, 0.0),
            atom("C", 1.5, 0.0, 0.0),
            atom("O", 2.0, 1.2, 0.0),
            atom("H", -0.5, 0.9, 0.0),
            atom("H", -0.5, -0.9, 0.0),
            atom("H", -0.4, 0.0, 1.0),
            atom("H", 1.9, -0.9, 0.3),
            atom("H", 1.9, -0.2, -1.0),
            atom("H", 2.9, 1.2, 0.0),
        ])
    }

    #[test]
    fn hill_formula_puts_carbon_and_hydrogen_first() {
        assert_eq!(ethanol().chemical_formula(), "C2H6O");
    }

    #[test]
    fn hill_formula_without_carbon_is_alphabetical() {
        let water = MolecularSystem::from_atoms(vec![
            atom("O", 0.0, 0.0, 0.0),
            atom("H", 0.76, 0.58, 0.0),
            atom("H", -0.76, 0.58, 0.0),
        ]);
        assert_eq!(water.chemical_formula(), "H2O");

        let zeolite = MolecularSystem::from_atoms(vec![
            atom("Si", 0.0, 0.0, 0.0),
            atom("O", 1.0, 0.0, 0.0),
            atom("O", 2.0, 0.0, 0.0),
            atom("Al", 3.0, 0.0, 0.0),
        ]);
        assert_eq!(zeolite.chemical_formula(), "AlO2Si");
    }

    #[test]
    fn center_of_mass_is_mass_weighted() {
        let co = MolecularSystem::from_atoms(vec![atom("C", 0.0, 0.0, 0.0), atom("O", 1.128, 0.0, 0.0)]);
        let com = co.center_of_mass().unwrap();
        let expected = 1.128 * 15.999 / (12.011 + 15.999);
        assert!((com.x - expected).abs() < 1e-12);
        assert!(MolecularSystem::new().center_of_mass().is_none());
    }

    #[test]
    fn set_positions_rejects_wrong_length() {
        let mut system = ethanol();
        let err = system.set_positions(&[Point3::origin()]).unwrap_err();
        assert_eq!(err, SystemError::LengthMismatch { expected: 9, found: 1 });
    }

    #[test]
    fn remove_atoms_ignores_missing_and_duplicate_indices() {
        let mut system = ethanol();
        assert_eq!(system.remove_atoms(&[0, 0, 2, 100]), 2);
        assert_eq!(system.len(), 7);
        assert_eq!(system.atoms[0].symbol, "C");
        assert_eq!(system.atoms[1].symbol, "H");
    }

    #[test]
    fn forces_are_none_unless_every_atom_has_one() {
        let mut system = ethanol();
        assert!(system.forces().is_none());
        for atom in &mut system.atoms {
            atom.force = Some(Vector3::new(0.1, 0.0, 0.0));
        }
        assert_eq!(system.forces().unwrap().len(), 9);
    }

    #[test]
    fn center_places_bounding_box_in_middle_of_cell() {
        let mut system =
            MolecularSystem::from_atoms(vec![atom("O", 0.0, 0.0, 0.0), atom("O", 2.0, 0.0, 0.0)]);
        system.cell = Cell::orthorhombic(10.0, 10.0, 10.0);
        system.center();
        assert!((system.atoms[0].position - Point3::new(4.0, 5.0, 5.0)).norm() < 1e-12);
        assert!((system.atoms[1].position - Point3::new(6.0, 5.0, 5.0)).norm() < 1e-12);
    }

    #[test]
    fn center_without_cell_uses_origin() {
        let mut system =
            MolecularSystem::from_atoms(vec![atom("H", 1.0, 1.0, 1.0), atom("H", 3.0, 1.0, 1.0)]);
        system.center();
        assert!((system.atoms[0].position - Point3::new(-1.0, 0.0, 0.0)).norm() < 1e-12);
    }
}
