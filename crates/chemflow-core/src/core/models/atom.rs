use super::elements::{self, Element};
use nalgebra::{Point3, Vector3};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AtomError {
    #[error("Unknown chemical symbol: '{0}'")]
    UnknownSymbol(String),
    #[error("Unknown atomic number: {0}")]
    UnknownAtomicNumber(u8),
}

/// A single atom of a structure together with its per-atom properties.
///
/// The set of properties mirrors what is persisted for every atom row in the
/// database: species, Cartesian position, mass, integer tag, momentum, charges
/// and magnetic moments. Forces are optional because they only exist after a
/// calculation has been carried out.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Chemical symbol (e.g. "Si", "O").
    pub symbol: String,
    /// Atomic number matching `symbol`.
    pub atomic_number: u8,
    /// Cartesian position in Angstroms.
    pub position: Point3<f64>,
    /// Atomic mass in atomic mass units.
    pub mass: f64,
    /// Free integer label, commonly used to mark symmetry-unique sites.
    pub tag: i64,
    pub momentum: Vector3<f64>,
    pub charge: f64,
    pub magmom: f64,
    pub initial_magmom: f64,
    pub initial_charge: f64,
    /// Force acting on the atom in eV/Angstrom, if it has been computed.
    pub force: Option<Vector3<f64>>,
}

impl Atom {
    /// Creates an atom of the given species at `position` with the standard
    /// mass of the element and all other properties zeroed.
    ///
    /// # Errors
    ///
    /// Returns [`AtomError::UnknownSymbol`] if the symbol is not a known element.
    pub fn new(symbol: &str, position: Point3<f64>) -> Result<Self, AtomError> {
        let element =
            elements::by_symbol(symbol).ok_or_else(|| AtomError::UnknownSymbol(symbol.into()))?;
        Ok(Self::from_element(element, position))
    }

    /// Creates an atom from its atomic number.
    ///
    /// # Errors
    ///
    /// Returns [`AtomError::UnknownAtomicNumber`] if no element has that number.
    pub fn from_number(number: u8, position: Point3<f64>) -> Result<Self, AtomError> {
        let element =
            elements::by_number(number).ok_or(AtomError::UnknownAtomicNumber(number))?;
        Ok(Self::from_element(element, position))
    }

    fn from_element(element: &Element, position: Point3<f64>) -> Self {
        Self {
            symbol: element.symbol.to_string(),
            atomic_number: element.number,
            position,
            mass: element.mass,
            tag: 0,
            momentum: Vector3::zeros(),
            charge: 0.0,
            magmom: 0.0,
            initial_magmom: 0.0,
            initial_charge: 0.0,
            force: None,
        }
    }

    /// Changes the species of the atom, updating symbol, atomic number and mass.
    pub fn set_species(&mut self, symbol: &str) -> Result<(), AtomError> {
        let element =
            elements::by_symbol(symbol).ok_or_else(|| AtomError::UnknownSymbol(symbol.into()))?;
        self.symbol = element.symbol.to_string();
        self.atomic_number = element.number;
        self.mass = element.mass;
        Ok(())
    }

    /// Copies species-related fields (symbol, number, mass) from another atom.
    pub fn copy_species_from(&mut self, other: &Atom) {
        self.symbol = other.symbol.clone();
        self.atomic_number = other.atomic_number;
        self.mass = other.mass;
    }
}
