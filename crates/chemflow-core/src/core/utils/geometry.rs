use crate::core::models::atom::{Atom, AtomError};
use crate::core::models::cell::Cell;
use crate::core::models::system::{MolecularSystem, SystemError};
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{Point3, Vector3};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Images differ in size: {first} vs {second} atoms")]
    ImageSizeMismatch { first: usize, second: usize },
    #[error("Forces are not available for this structure")]
    MissingForces,
    #[error("The structure contains no atoms")]
    EmptySystem,
    #[error("No Al atoms present, the Si/Al ratio is undefined")]
    NoAluminium,
    #[error("None of the species {0:?} are present in the structure")]
    NoMatchingSpecies(Vec<String>),
    #[error("Grid spacing must be positive, got {0}")]
    InvalidSpacing(f64),
    #[error(transparent)]
    System(#[from] SystemError),
    #[error(transparent)]
    Atom(#[from] AtomError),
}

/// Whether a symbol list selects the listed species or everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    #[default]
    Include,
    Exclude,
}

/// An atom found near a reference atom.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub symbol: String,
    pub distance: f64,
}

/// Linearly interpolates `n` intermediate images between two structures.
///
/// Each image is a copy of `first` with positions moved `k/(n+1)` of the way
/// towards `last`; the end points themselves are not included.
pub fn interpolate_positions(
    first: &MolecularSystem,
    last: &MolecularSystem,
    n: usize,
) -> Result<Vec<MolecularSystem>, GeometryError> {
    if first.len() != last.len() {
        return Err(GeometryError::ImageSizeMismatch {
            first: first.len(),
            second: last.len(),
        });
    }

    let steps: Vec<Vector3<f64>> = first
        .atoms
        .iter()
        .zip(&last.atoms)
        .map(|(a, b)| (b.position - a.position) / (n as f64 + 1.0))
        .collect();

    Ok((1..=n)
        .map(|k| {
            let mut image = first.clone();
            for (atom, step) in image.atoms.iter_mut().zip(&steps) {
                atom.position += step * k as f64;
            }
            image
        })
        .collect())
}

/// Length of the longest vector, or `None` for an empty slice.
pub fn max_vector_length(vectors: &[Vector3<f64>]) -> Option<f64> {
    vectors.iter().map(|v| v.norm()).reduce(f64::max)
}

pub fn max_force(system: &MolecularSystem) -> Result<f64, GeometryError> {
    let forces = system.forces().ok_or(GeometryError::MissingForces)?;
    max_vector_length(&forces).ok_or(GeometryError::EmptySystem)
}

pub fn swap_positions(system: &mut MolecularSystem, i: usize, j: usize) -> Result<(), GeometryError> {
    let pi = system.atom(i)?.position;
    let pj = system.atom(j)?.position;
    system.atom_mut(i)?.position = pj;
    system.atom_mut(j)?.position = pi;
    Ok(())
}

/// Swaps the species and positions of atoms `i` and `j`.
///
/// Other per-atom properties (tags, charges, moments) stay with their slot.
pub fn swap_atoms(system: &mut MolecularSystem, i: usize, j: usize) -> Result<(), GeometryError> {
    let ai = system.atom(i)?.clone();
    let aj = system.atom(j)?.clone();
    swap_positions(system, i, j)?;
    system.atom_mut(i)?.copy_species_from(&aj);
    system.atom_mut(j)?.copy_species_from(&ai);
    Ok(())
}

/// Returns a copy of the system with atom `i` moved to slot `j`.
pub fn move_atom(system: &MolecularSystem, i: usize, j: usize) -> Result<MolecularSystem, GeometryError> {
    system.atom(i)?;
    system.atom(j)?;
    let mut moved = system.clone();
    let atom = moved.atoms.remove(i);
    moved.atoms.insert(j, atom);
    Ok(moved)
}

pub fn indices_by_symbols(system: &MolecularSystem, symbols: &[&str], mode: SelectionMode) -> Vec<usize> {
    system
        .atoms
        .iter()
        .enumerate()
        .filter(|(_, atom)| {
            let listed = symbols.contains(&atom.symbol.as_str());
            match mode {
                SelectionMode::Include => listed,
                SelectionMode::Exclude => !listed,
            }
        })
        .map(|(i, _)| i)
        .collect()
}

/// Removes every atom whose species is listed, returning how many were removed.
pub fn remove_atoms_by_symbols(system: &mut MolecularSystem, symbols: &[&str]) -> usize {
    let indices = indices_by_symbols(system, symbols, SelectionMode::Include);
    system.remove_atoms(&indices)
}

/// Replaces species `from` by `to` everywhere, returning the number of atoms changed.
pub fn substitute_species(system: &mut MolecularSystem, from: &str, to: &str) -> Result<usize, GeometryError> {
    let indices = indices_by_symbols(system, &[from], SelectionMode::Include);
    for &i in &indices {
        system.atoms[i].set_species(to)?;
    }
    Ok(indices.len())
}

fn offset_in_xy_plane(anchor: &Point3<f64>, theta_deg: f64, r: f64) -> Point3<f64> {
    let t = theta_deg.to_radians();
    Point3::new(anchor.x + r * t.cos(), anchor.y + r * t.sin(), anchor.z)
}

/// Appends a new atom at distance `r` from atom `index`, at angle `theta_deg`
/// in the xy plane of the anchor.
///
/// # Return
///
/// The index of the new atom.
pub fn attach_atom(
    system: &mut MolecularSystem,
    index: usize,
    symbol: &str,
    theta_deg: f64,
    r: f64,
) -> Result<usize, GeometryError> {
    let anchor = system.atom(index)?.position;
    let atom = Atom::new(symbol, offset_in_xy_plane(&anchor, theta_deg, r))?;
    system.push(atom);
    Ok(system.len() - 1)
}

/// Appends `molecule` with its center of mass placed at distance `r` from
/// atom `index`, at angle `theta_deg` in the xy plane of the anchor.
///
/// The molecule is assumed to be already oriented as desired.
pub fn attach_molecule(
    system: &mut MolecularSystem,
    index: usize,
    molecule: &MolecularSystem,
    theta_deg: f64,
    r: f64,
) -> Result<(), GeometryError> {
    let anchor = system.atom(index)?.position;
    let com = molecule.center_of_mass().ok_or(GeometryError::EmptySystem)?;
    let target = offset_in_xy_plane(&anchor, theta_deg, r);

    let mut placed = molecule.clone();
    placed.translate(&(target - com));
    system.extend_from(&placed);
    Ok(())
}

/// Si/Al ratio rounded to one decimal place.
pub fn si_al_ratio(system: &MolecularSystem) -> Result<f64, GeometryError> {
    let count = |s: &str| system.atoms.iter().filter(|a| a.symbol == s).count();
    let al = count("Al");
    if al == 0 {
        return Err(GeometryError::NoAluminium);
    }
    let ratio = count("Si") as f64 / al as f64;
    Ok((ratio * 10.0).round() / 10.0)
}

/// Places the structure in an orthorhombic box with at least `vacuum` Å to
/// every wall and edge lengths that are whole multiples of four grid points
/// of `spacing` Å. Single atoms get a non-cubic box. Atoms end up centered.
pub fn smart_cell(system: &mut MolecularSystem, vacuum: f64, spacing: f64) -> Result<(), GeometryError> {
    if spacing <= 0.0 {
        return Err(GeometryError::InvalidSpacing(spacing));
    }
    let (lo, hi) = system.bounding_box().ok_or(GeometryError::EmptySystem)?;
    let extent = hi - lo;

    let mut lengths = [0.0; 3];
    for (length, span) in lengths.iter_mut().zip(extent.iter()) {
        let box_length = span + 2.0 * vacuum;
        let remainder = (box_length / spacing).rem_euclid(4.0);
        *length = box_length + (4.0 - remainder) * spacing;
    }
    if system.len() == 1 {
        lengths[1] += 4.0 * spacing;
        lengths[2] += 8.0 * spacing;
    }

    system.cell = Cell::orthorhombic(lengths[0], lengths[1], lengths[2]);
    system.center();
    Ok(())
}

/// Sets initial magnetic moments per species; all other atoms are reset to zero.
///
/// # Errors
///
/// Returns [`GeometryError::NoMatchingSpecies`] when `moments` is non-empty but
/// none of its species occur in the structure.
pub fn set_initial_magmoms(system: &mut MolecularSystem, moments: &[(&str, f64)]) -> Result<(), GeometryError> {
    let mut by_index = Vec::new();
    for &(symbol, moment) in moments {
        by_index.extend(
            indices_by_symbols(system, &[symbol], SelectionMode::Include)
                .into_iter()
                .map(|i| (i, moment)),
        );
    }
    if by_index.is_empty() && !moments.is_empty() {
        return Err(GeometryError::NoMatchingSpecies(
            moments.iter().map(|(s, _)| s.to_string()).collect(),
        ));
    }
    set_initial_magmoms_from_indices(system, &by_index)
}

/// Sets initial magnetic moments by atom index; unlisted atoms are reset to zero.
pub fn set_initial_magmoms_from_indices(
    system: &mut MolecularSystem,
    moments: &[(usize, f64)],
) -> Result<(), GeometryError> {
    for &(index, _) in moments {
        system.atom(index)?;
    }
    for atom in &mut system.atoms {
        atom.initial_magmom = 0.0;
    }
    for &(index, moment) in moments {
        system.atoms[index].initial_magmom = moment;
    }
    Ok(())
}

/// The `n` atoms closest to atom `reference`, nearest first.
///
/// The reference atom itself is never returned. When `symbol` is given only
/// atoms of that species are considered.
pub fn find_closest(
    system: &MolecularSystem,
    reference: usize,
    symbol: Option<&str>,
    n: usize,
) -> Result<Vec<Neighbor>, GeometryError> {
    let origin = system.atom(reference)?.position;
    let mut neighbors: Vec<Neighbor> = system
        .atoms
        .iter()
        .enumerate()
        .filter(|(i, atom)| *i != reference && symbol.is_none_or(|s| atom.symbol == s))
        .map(|(index, atom)| Neighbor {
            index,
            symbol: atom.symbol.clone(),
            distance: (atom.position - origin).norm(),
        })
        .collect();
    neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    neighbors.truncate(n);
    Ok(neighbors)
}

/// Values occurring more than once, each with the ascending indices where it occurs.
pub fn duplicate_indices<T: Ord + Clone>(values: &[T]) -> Vec<(T, Vec<usize>)> {
    let mut groups: BTreeMap<&T, Vec<usize>> = BTreeMap::new();
    for (i, value) in values.iter().enumerate() {
        groups.entry(value).or_default().push(i);
    }
    groups
        .into_iter()
        .filter(|(_, indices)| indices.len() > 1)
        .map(|(value, indices)| (value.clone(), indices))
        .collect()
}

/// Greedily pairs every point of `x` with a distinct point of `y`.
///
/// Points of `x` are processed in order; each takes the nearest of its `k`
/// nearest `y` points not claimed yet, or `None` if all of them are taken.
pub fn nearest_neighbors_unique(x: &[Point3<f64>], y: &[Point3<f64>], k: usize) -> Vec<Option<usize>> {
    if y.is_empty() || k == 0 {
        return vec![None; x.len()];
    }
    let coordinates: Vec<[f64; 3]> = y.iter().map(|q| [q.x, q.y, q.z]).collect();
    let tree: KdTree<f64, 3> = (&coordinates).into();

    let mut used = HashSet::new();
    x.iter()
        .map(|p| {
            let chosen = tree
                .nearest_n::<SquaredEuclidean>(&[p.x, p.y, p.z], k)
                .into_iter()
                .map(|neighbour| neighbour.item as usize)
                .find(|j| !used.contains(j));
            if let Some(j) = chosen {
                used.insert(j);
            }
            chosen
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(symbol: &str, x: f64, y: f64, z: f64) -> Atom {
        Atom::new(symbol, Point3::new(x, y, z)).unwrap()
    }

    fn line(symbols: &[&str]) -> MolecularSystem {
        MolecularSystem::from_atoms(
            symbols
                .iter()
                .enumerate()
                .map(|(i, s)| atom(s, i as f64, 0.0, 0.0))
                .collect(),
        )
    }

    fn assert_point(p: Point3<f64>, x: f64, y: f64, z: f64) {
        assert!((p - Point3::new(x, y, z)).norm() < 1e-10, "{p:?}");
    }

    #[test]
    fn interpolation_excludes_end_points() {
        let first = line(&["H", "H"]);
        let mut last = first.clone();
        last.translate(&Vector3::new(0.0, 3.0, 0.0));

        let images = interpolate_positions(&first, &last, 2).unwrap();
        assert_eq!(images.len(), 2);
        assert_point(images[0].atoms[0].position, 0.0, 1.0, 0.0);
        assert_point(images[1].atoms[1].position, 1.0, 2.0, 0.0);
    }

    #[test]
    fn interpolation_rejects_different_sizes() {
        let err = interpolate_positions(&line(&["H"]), &line(&["H", "H"]), 1).unwrap_err();
        assert_eq!(err, GeometryError::ImageSizeMismatch { first: 1, second: 2 });
    }

    #[test]
    fn max_force_requires_forces() {
        let mut system = line(&["O", "H"]);
        assert_eq!(max_force(&system), Err(GeometryError::MissingForces));
        system.atoms[0].force = Some(Vector3::new(3.0, 4.0, 0.0));
        system.atoms[1].force = Some(Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(max_force(&system), Ok(5.0));
        assert_eq!(max_vector_length(&[]), None);
    }

    #[test]
    fn swap_atoms_exchanges_species_and_positions() {
        let mut system = line(&["O", "H", "Si"]);
        system.atoms[0].tag = 7;
        swap_atoms(&mut system, 0, 2).unwrap();
        assert_eq!(system.symbols(), vec!["Si", "H", "O"]);
        assert_point(system.atoms[0].position, 2.0, 0.0, 0.0);
        assert_eq!(system.atoms[0].tag, 7);
        assert!(swap_atoms(&mut system, 0, 3).is_err());
    }

    #[test]
    fn move_atom_reorders_in_both_directions() {
        let system = line(&["C", "H", "O", "N"]);
        assert_eq!(move_atom(&system, 3, 1).unwrap().symbols(), vec!["C", "N", "H", "O"]);
        assert_eq!(move_atom(&system, 0, 2).unwrap().symbols(), vec!["H", "O", "C", "N"]);
        assert_eq!(system.symbols(), vec!["C", "H", "O", "N"]);
    }

    #[test]
    fn selection_modes_are_complementary() {
        let system = line(&["Si", "O", "Al", "O", "H"]);
        assert_eq!(indices_by_symbols(&system, &["O"], SelectionMode::Include), vec![1, 3]);
        assert_eq!(indices_by_symbols(&system, &["O", "H"], SelectionMode::Exclude), vec![0, 2]);
    }

    #[test]
    fn remove_and_substitute_species() {
        let mut system = line(&["Si", "O", "Si", "H"]);
        assert_eq!(remove_atoms_by_symbols(&mut system, &["H"]), 1);
        assert_eq!(substitute_species(&mut system, "Si", "Al").unwrap(), 2);
        assert_eq!(system.symbols(), vec!["Al", "O", "Al"]);
        assert!(substitute_species(&mut system, "O", "Xx").is_err());
    }

    #[test]
    fn attach_atom_places_it_in_the_xy_plane() {
        let mut system = line(&["O"]);
        let index = attach_atom(&mut system, 0, "H", 90.0, 1.5).unwrap();
        assert_eq!(index, 1);
        assert_point(system.atoms[1].position, 0.0, 1.5, 0.0);
    }

    #[test]
    fn attach_molecule_places_center_of_mass() {
        let mut system = line(&["Si"]);
        let h2 = MolecularSystem::from_atoms(vec![atom("H", 10.0, 0.0, 0.0), atom("H", 10.0, 0.0, 0.74)]);
        attach_molecule(&mut system, 0, &h2, 0.0, 2.5).unwrap();
        assert_eq!(system.len(), 3);
        let placed = MolecularSystem::from_atoms(system.atoms[1..].to_vec());
        assert_point(placed.center_of_mass().unwrap(), 2.5, 0.0, 0.0);
    }

    #[test]
    fn si_al_ratio_is_rounded_and_requires_aluminium() {
        let system = line(&["Si", "Si", "Si", "Al", "Al", "Al", "Si", "Si", "Si", "Si"]);
        assert_eq!(si_al_ratio(&system), Ok(2.3));
        assert_eq!(si_al_ratio(&line(&["Si"])), Err(GeometryError::NoAluminium));
    }

    #[test]
    fn smart_cell_lengths_are_multiples_of_four_grid_points() {
        let mut system = line(&["O", "H"]);
        smart_cell(&mut system, 5.0, 0.2).unwrap();
        for length in system.cell.lengths() {
            let points = length / 0.2;
            assert!((points / 4.0 - (points / 4.0).round()).abs() < 1e-6, "{length}");
            assert!(length >= 10.0);
        }
        let (lo, hi) = system.bounding_box().unwrap();
        let middle = (lo.coords + hi.coords) / 2.0;
        let [a, b, c] = system.cell.lengths();
        assert!((middle - Vector3::new(a, b, c) / 2.0).norm() < 1e-10);
    }

    #[test]
    fn smart_cell_breaks_symmetry_for_single_atoms() {
        let mut system = line(&["Ni"]);
        smart_cell(&mut system, 5.0, 0.2).unwrap();
        let [a, b, c] = system.cell.lengths();
        assert!((b - a - 0.8).abs() < 1e-9);
        assert!((c - a - 1.6).abs() < 1e-9);
        assert!(smart_cell(&mut system, 5.0, 0.0).is_err());
    }

    #[test]
    fn initial_magmoms_reset_unlisted_atoms() {
        let mut system = line(&["Ni", "O", "Ni"]);
        system.atoms[1].initial_magmom = 3.0;
        set_initial_magmoms(&mut system, &[("Ni", 1.0)]).unwrap();
        let moments: Vec<f64> = system.atoms.iter().map(|a| a.initial_magmom).collect();
        assert_eq!(moments, vec![1.0, 0.0, 1.0]);

        let err = set_initial_magmoms(&mut system, &[("Fe", 2.0)]).unwrap_err();
        assert_eq!(err, GeometryError::NoMatchingSpecies(vec!["Fe".into()]));
        assert!(set_initial_magmoms(&mut system, &[]).is_ok());
    }

    #[test]
    fn find_closest_sorts_and_filters() {
        let system = line(&["O", "H", "Si", "H"]);
        let closest = find_closest(&system, 2, None, 2).unwrap();
        assert_eq!(closest.len(), 2);
        assert!(closest.iter().all(|n| (n.distance - 1.0).abs() < 1e-12));
        assert!(closest.iter().all(|n| n.index != 2));

        let hydrogens = find_closest(&system, 0, Some("H"), 5).unwrap();
        let indices: Vec<usize> = hydrogens.iter().map(|n| n.index).collect();
        assert_eq!(indices, vec![1, 3]);
    }

    #[test]
    fn duplicates_are_grouped_by_value() {
        let groups = duplicate_indices(&[3, 1, 3, 2, 1, 3]);
        assert_eq!(groups, vec![(1, vec![1, 4]), (3, vec![0, 2, 5])]);
        assert!(duplicate_indices(&["a", "b"]).is_empty());
    }

    #[test]
    fn nearest_neighbors_are_claimed_once() {
        let x = [Point3::new(0.0, 0.0, 0.0), Point3::new(0.1, 0.0, 0.0), Point3::new(0.2, 0.0, 0.0)];
        let y = [Point3::new(0.0, 0.0, 0.0), Point3::new(5.0, 0.0, 0.0)];
        assert_eq!(nearest_neighbors_unique(&x, &y, 2), vec![Some(0), Some(1), None]);
        assert_eq!(nearest_neighbors_unique(&x, &y, 1), vec![Some(0), None, None]);
    }

    #[test]
    fn nearest_neighbors_pair_shuffled_copies() {
        let y: Vec<Point3<f64>> = (0..20)
            .map(|i| Point3::new(f64::from(i) * 1.5, f64::from(i % 3), f64::from(i % 5) * 0.5))
            .collect();
        let order = [7, 3, 19, 0, 12, 5, 16, 1, 9, 14, 2, 18, 6, 11, 4, 17, 8, 13, 10, 15];
        let x: Vec<Point3<f64>> = order.iter().map(|&j| y[j] + Vector3::new(0.01, -0.01, 0.0)).collect();
        let pairs = nearest_neighbors_unique(&x, &y, 3);
        let expected: Vec<Option<usize>> = order.iter().map(|&j| Some(j)).collect();
        assert_eq!(pairs, expected);
    }

    #[test]
    fn nearest_neighbors_without_candidates_are_none() {
        let x = [Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        assert_eq!(nearest_neighbors_unique(&x, &[], 3), vec![None, None]);
        assert_eq!(nearest_neighbors_unique(&x, &[Point3::origin()], 0), vec![None, None]);
    }
}
