use crate::core::models::system::MolecularSystem;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Defines the interface for reading and writing structure file formats.
///
/// Every format is treated as a trajectory: a file holds one or more frames,
/// each of which is a complete [`MolecularSystem`]. Single-structure files are
/// simply trajectories of length one.
pub trait StructureFile {
    /// Format-specific writer options (titles, dates, precision).
    type Options: Default;

    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads every frame from a buffered reader.
    ///
    /// # Arguments
    ///
    /// * `reader` - The buffered reader to read from.
    ///
    /// # Return
    ///
    /// Returns the frames in file order. An empty input yields an empty vector.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or I/O operations encounter issues.
    fn read_frames(reader: &mut impl BufRead) -> Result<Vec<MolecularSystem>, Self::Error>;

    /// Writes a sequence of frames to a writer.
    ///
    /// # Arguments
    ///
    /// * `frames` - The structures to write, in order.
    /// * `options` - Format-specific options.
    /// * `writer` - The writer to output to.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_frames(
        frames: &[MolecularSystem],
        options: &Self::Options,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error>;

    /// Writes a single structure to a writer.
    fn write_to(
        system: &MolecularSystem,
        options: &Self::Options,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        Self::write_frames(std::slice::from_ref(system), options, writer)
    }

    /// Reads every frame from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_frames_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<MolecularSystem>, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_frames(&mut reader)
    }

    /// Writes frames to a file path, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or writing fails.
    fn write_frames_to_path<P: AsRef<Path>>(
        frames: &[MolecularSystem],
        options: &Self::Options,
        path: P,
    ) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_frames(frames, options, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
