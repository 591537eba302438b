//! # Core Module
//!
//! Stateless building blocks shared by every other layer.
//!
//! - **Structures** ([`models`]) - Atoms, periodic cells and whole molecular systems
//! - **File I/O** ([`io`]) - Extended XYZ trajectories, BIOSYM `.car` output and PWscf log scraping
//! - **Helpers** ([`utils`]) - Geometry manipulation, unit conversion and name sanitizing
//! - **Input Scripts** ([`template`]) - Placeholder substitution for calculation inputs

pub mod io;
pub mod models;
pub mod template;
pub mod utils;
