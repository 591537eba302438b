//! # Core Models Module
//!
//! In-memory representation of atomistic structures.
//!
//! - [`atom`] - A single atom with species, position and per-atom properties
//! - [`cell`] - Periodic cell vectors and their conversion to/from cell parameters
//! - [`elements`] - Compile-time table of chemical elements
//! - [`system`] - An ordered collection of atoms with cell, periodicity and metadata
//!
//! ```ignore
//! use chemflow::core::models::{atom::Atom, system::MolecularSystem};
//! use nalgebra::Point3;
//!
//! let mut water = MolecularSystem::new();
//! water.push(Atom::new("O", Point3::new(0.0, 0.0, 0.119))?);
//! water.push(Atom::new("H", Point3::new(0.0, 0.763, -0.477))?);
//! water.push(Atom::new("H", Point3::new(0.0, -0.763, -0.477))?);
//! assert_eq!(water.chemical_formula(), "H2O");
//! ```

pub mod atom;
pub mod cell;
pub mod elements;
pub mod system;
