//! Physical constants (CODATA 2018) and energy conversions.

/// Avogadro constant in mol^-1.
pub const AVOGADRO: f64 = 6.022_140_76e23;
/// Electron volt in joules.
pub const EV_TO_J: f64 = 1.602_176_634e-19;
/// Rydberg energy in electron volts.
pub const RY_TO_EV: f64 = 13.605_693_122_994;
/// Inverse meter expressed as energy in electron volts.
pub const INV_M_TO_EV: f64 = 1.239_841_984e-6;
/// Electron volt expressed as a wavenumber in inverse meters.
pub const EV_TO_INV_M: f64 = 8.065_543_937e5;

pub fn ev_to_kjmol(energy: f64) -> f64 {
    energy * EV_TO_J * AVOGADRO / 1000.0
}

pub fn kjmol_to_ev(energy: f64) -> f64 {
    energy * 1000.0 / (EV_TO_J * AVOGADRO)
}

pub fn ry_to_ev(energy: f64) -> f64 {
    energy * RY_TO_EV
}

/// Converts a wavenumber in cm^-1 to an energy in eV.
pub fn wavenumber_to_ev(wavenumber: f64) -> f64 {
    wavenumber * INV_M_TO_EV * 100.0
}

/// Converts an energy in eV to a wavenumber in cm^-1.
pub fn ev_to_wavenumber(energy: f64) -> f64 {
    energy * EV_TO_INV_M / 100.0
}
