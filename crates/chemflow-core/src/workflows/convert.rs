use super::WorkflowError;
use crate::core::io::car::{CarFile, CarOptions};
use crate::core::io::traits::StructureFile;
use crate::core::io::{read_structure, read_trajectory, write_structure, write_trajectory};
use std::path::Path;
use tracing::info;

/// Rewrites every frame of `input` in the format of `output`. Returns the
/// number of frames written.
pub fn convert(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<usize, WorkflowError> {
    let frames = read_trajectory(input.as_ref())?;
    write_trajectory(output.as_ref(), &frames)?;
    info!(input = %input.as_ref().display(), output = %output.as_ref().display(), frames = frames.len(), "Converted structure file");
    Ok(frames.len())
}

/// Saves frame `index` of a trajectory to its own file.
pub fn extract(trajectory: impl AsRef<Path>, index: isize, output: impl AsRef<Path>) -> Result<(), WorkflowError> {
    let frame = read_structure(trajectory.as_ref(), index)?;
    write_structure(output.as_ref(), &frame)?;
    info!(trajectory = %trajectory.as_ref().display(), index, output = %output.as_ref().display(), "Extracted frame");
    Ok(())
}

/// Writes the last frame of `input` as a BIOSYM archive titled with the
/// source file name.
pub fn to_car(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<(), WorkflowError> {
    let input = input.as_ref();
    let frame = read_structure(input, -1)?;
    let options = CarOptions {
        title: format!("converted from: {}", input.display()),
        ..CarOptions::default()
    };
    CarFile::write_frames_to_path(std::slice::from_ref(&frame), &options, output.as_ref())?;
    info!(input = %input.display(), output = %output.as_ref().display(), "Wrote BIOSYM archive");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::system::MolecularSystem;
    use nalgebra::Point3;
    use std::fs;

    fn trajectory(path: &Path, n: usize) {
        let frames: Vec<MolecularSystem> = (0..n)
            .map(|i| MolecularSystem::from_atoms(vec![Atom::new("Ar", Point3::new(i as f64, 0.0, 0.0)).unwrap()]))
            .collect();
        write_trajectory(path, &frames).unwrap();
    }

    #[test]
    fn convert_keeps_all_frames() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("traj.xyz");
        trajectory(&input, 3);
        let output = dir.path().join("traj.car");
        assert_eq!(convert(&input, &output).unwrap(), 3);
        assert_eq!(read_trajectory(&output).unwrap().len(), 3);
    }

    #[test]
    fn extract_picks_one_frame() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("traj.xyz");
        trajectory(&input, 3);
        let output = dir.path().join("second.xyz");
        extract(&input, 1, &output).unwrap();
        let frames = read_trajectory(&output).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].atoms[0].position.x, 1.0);
    }

    #[test]
    fn to_car_titles_with_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("traj.xyz");
        trajectory(&input, 2);
        let output = dir.path().join("output.car");
        to_car(&input, &output).unwrap();

        let text = fs::read_to_string(&output).unwrap();
        let title = text.lines().nth(2).unwrap();
        assert!(title.starts_with(&format!("converted from: {}", input.display())));
        assert!(text.contains("Ar       1.000000000"));
    }

    #[test]
    fn unknown_output_format_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("traj.xyz");
        trajectory(&input, 1);
        assert!(matches!(
            convert(&input, dir.path().join("traj.pdb")),
            Err(WorkflowError::Structure(_))
        ));
    }
}
