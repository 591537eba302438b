//! Provides input/output functionality for structure file formats.
//!
//! Formats implement the [`traits::StructureFile`] trait. The free functions in
//! this module pick the format from a file extension so that callers can work
//! with paths alone.

pub mod car;
pub mod pwscf;
pub mod traits;
pub mod xyz;

use crate::core::models::system::MolecularSystem;
use car::{CarError, CarFile, CarOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use traits::StructureFile;
use xyz::{XyzError, XyzFile, XyzOptions};

#[derive(Debug, Error)]
pub enum StructureIoError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Xyz(#[from] XyzError),
    #[error(transparent)]
    Car(#[from] CarError),
    #[error("Unsupported structure format for '{path}' (supported extensions: xyz, extxyz, car)")]
    UnsupportedFormat { path: PathBuf },
    #[error("No structures found in '{path}'")]
    NoFrames { path: PathBuf },
    #[error("Frame index {index} is out of range for a file with {count} frames")]
    FrameOutOfRange { index: isize, count: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureFormat {
    Xyz,
    Car,
}

impl StructureFormat {
    /// Detects the format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self, StructureIoError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("xyz") | Some("extxyz") => Ok(Self::Xyz),
            Some("car") | Some("arc") => Ok(Self::Car),
            _ => Err(StructureIoError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Picks one frame, counting from the end for negative indices (`-1` is last).
pub fn select_frame(
    mut frames: Vec<MolecularSystem>,
    index: isize,
) -> Result<MolecularSystem, StructureIoError> {
    let count = frames.len();
    let resolved = if index < 0 {
        count.checked_sub(index.unsigned_abs())
    } else {
        Some(index.unsigned_abs()).filter(|&i| i < count)
    };
    match resolved {
        Some(i) => Ok(frames.swap_remove(i)),
        None => Err(StructureIoError::FrameOutOfRange { index, count }),
    }
}

/// Reads every frame of a structure file.
pub fn read_trajectory(path: impl AsRef<Path>) -> Result<Vec<MolecularSystem>, StructureIoError> {
    let path = path.as_ref();
    let frames = match StructureFormat::from_path(path)? {
        StructureFormat::Xyz => XyzFile::read_frames_from_path(path)?,
        StructureFormat::Car => CarFile::read_frames_from_path(path)?,
    };
    if frames.is_empty() {
        return Err(StructureIoError::NoFrames {
            path: path.to_path_buf(),
        });
    }
    Ok(frames)
}

/// Reads a single frame of a structure file.
pub fn read_structure(path: impl AsRef<Path>, index: isize) -> Result<MolecularSystem, StructureIoError> {
    let path = path.as_ref();
    let frames = read_trajectory(path)?;
    tracing::debug!(path = %path.display(), frames = frames.len(), index, "Read structure file");
    select_frame(frames, index)
}

pub fn write_trajectory(path: impl AsRef<Path>, frames: &[MolecularSystem]) -> Result<(), StructureIoError> {
    let path = path.as_ref();
    match StructureFormat::from_path(path)? {
        StructureFormat::Xyz => XyzFile::write_frames_to_path(frames, &XyzOptions::default(), path)?,
        StructureFormat::Car => CarFile::write_frames_to_path(frames, &CarOptions::default(), path)?,
    }
    tracing::debug!(path = %path.display(), frames = frames.len(), "Wrote structure file");
    Ok(())
}

pub fn write_structure(path: impl AsRef<Path>, system: &MolecularSystem) -> Result<(), StructureIoError> {
    write_trajectory(path, std::slice::from_ref(system))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use nalgebra::Point3;

    fn frames(n: usize) -> Vec<MolecularSystem> {
        (0..n)
            .map(|i| {
                MolecularSystem::from_atoms(vec![
                    Atom::new("H", Point3::new(i as f64, 0.0, 0.0)).unwrap(),
                ])
            })
            .collect()
    }

    #[test]
    fn format_is_detected_from_extension() {
        assert_eq!(StructureFormat::from_path(Path::new("a/b.XYZ")).unwrap(), StructureFormat::Xyz);
        assert_eq!(StructureFormat::from_path(Path::new("b.car")).unwrap(), StructureFormat::Car);
        assert!(matches!(
            StructureFormat::from_path(Path::new("relaxed.traj")),
            Err(StructureIoError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn negative_indices_count_from_the_end() {
        let last = select_frame(frames(3), -1).unwrap();
        assert_eq!(last.atoms[0].position.x, 2.0);
        let first = select_frame(frames(3), -3).unwrap();
        assert_eq!(first.atoms[0].position.x, 0.0);
        let second = select_frame(frames(3), 1).unwrap();
        assert_eq!(second.atoms[0].position.x, 1.0);
    }

    #[test]
    fn out_of_range_frames_are_rejected() {
        assert!(matches!(
            select_frame(frames(2), 2),
            Err(StructureIoError::FrameOutOfRange { index: 2, count: 2 })
        ));
        assert!(matches!(
            select_frame(frames(2), -3),
            Err(StructureIoError::FrameOutOfRange { index: -3, count: 2 })
        ));
    }

    #[test]
    fn files_round_trip_through_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traj.xyz");
        write_trajectory(&path, &frames(4)).unwrap();
        assert_eq!(read_trajectory(&path).unwrap().len(), 4);
        let third = read_structure(&path, 2).unwrap();
        assert_eq!(third.atoms[0].position.x, 2.0);

        let car = dir.path().join("out.car");
        write_structure(&car, &third).unwrap();
        assert_eq!(read_structure(&car, -1).unwrap().symbols(), vec!["H"]);
    }
}
