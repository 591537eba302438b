use crate::core::io::traits::StructureFile;
use crate::core::models::atom::Atom;
use crate::core::models::cell::Cell;
use crate::core::models::system::MolecularSystem;
use chrono::{DateTime, Local};
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use thiserror::Error;

const HEADER: &str = "!BIOSYM archive 3";
const TITLE_WIDTH: usize = 65;

#[derive(Debug, Error)]
pub enum CarError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Missing required record: {0}")]
    MissingRecord(String),
}

/// Options for writing BIOSYM archive files.
#[derive(Debug, Clone, Default)]
pub struct CarOptions {
    /// Title written above every frame; the system name is used when empty.
    pub title: String,
    /// Timestamp for the `!DATE` record; the current local time when `None`.
    pub date: Option<DateTime<Local>>,
    /// Space group label written on the cell record.
    pub space_group: Option<String>,
}

/// BIOSYM archive 3 (`.car`) structure files.
pub struct CarFile;

fn parse_error(line: usize, message: impl Into<String>) -> CarError {
    CarError::Parse {
        line,
        message: message.into(),
    }
}

fn parse_f64(token: &str, line: usize) -> Result<f64, CarError> {
    token
        .parse()
        .map_err(|_| parse_error(line, format!("invalid number '{token}'")))
}

fn element_from_name(name: &str) -> String {
    name.chars().take_while(|c| c.is_ascii_alphabetic()).collect()
}

impl StructureFile for CarFile {
    type Options = CarOptions;
    type Error = CarError;

    fn read_frames(reader: &mut impl BufRead) -> Result<Vec<MolecularSystem>, Self::Error> {
        let mut lines = Vec::new();
        for line in reader.lines() {
            lines.push(line?);
        }
        let mut cursor = lines
            .iter()
            .position(|l| !l.trim().is_empty())
            .unwrap_or(lines.len());
        if cursor == lines.len() {
            return Ok(Vec::new());
        }
        if !lines[cursor].starts_with("!BIOSYM") {
            return Err(CarError::MissingRecord(HEADER.to_string()));
        }
        cursor += 1;

        let periodic = match lines.get(cursor).map(|l| l.trim()) {
            Some("PBC=ON") => true,
            Some("PBC=OFF") => false,
            _ => return Err(CarError::MissingRecord("PBC=ON|OFF".to_string())),
        };
        cursor += 1;

        let mut frames = Vec::new();
        while cursor < lines.len() {
            let title_line = &lines[cursor];
            if title_line.trim() == "end" || title_line.trim().is_empty() {
                cursor += 1;
                continue;
            }

            let mut system = MolecularSystem::new();
            let split = title_line
                .char_indices()
                .nth(TITLE_WIDTH)
                .map_or(title_line.len(), |(i, _)| i);
            let (title, energy) = title_line.split_at(split);
            let title = title.trim();
            if !title.is_empty() {
                system.name = Some(title.to_string());
            }
            let energy = energy.trim();
            if !energy.is_empty() {
                system.energy = Some(parse_f64(energy, cursor + 1)?);
            }
            cursor += 1;

            if lines.get(cursor).is_some_and(|l| l.starts_with("!DATE")) {
                cursor += 1;
            }

            if let Some(cell_line) = lines.get(cursor).filter(|l| l.starts_with("PBC")) {
                let numbers: Vec<f64> = cell_line[3..]
                    .split_whitespace()
                    .take(6)
                    .map(|t| parse_f64(t, cursor + 1))
                    .collect::<Result<_, _>>()?;
                let parameters: [f64; 6] = numbers
                    .try_into()
                    .map_err(|_| parse_error(cursor + 1, "cell record needs six numbers"))?;
                if periodic {
                    system.cell = Cell::from_parameters(parameters);
                    system.pbc = [true; 3];
                }
                cursor += 1;
            }

            loop {
                let line_num = cursor + 1;
                let Some(line) = lines.get(cursor) else {
                    return Err(CarError::MissingRecord("end".to_string()));
                };
                cursor += 1;
                if line.trim() == "end" {
                    break;
                }
                let tokens: Vec<&str> = line.split_whitespace().collect();
                if tokens.len() < 4 {
                    return Err(parse_error(line_num, "atom record needs a name and three coordinates"));
                }
                let position = Point3::new(
                    parse_f64(tokens[1], line_num)?,
                    parse_f64(tokens[2], line_num)?,
                    parse_f64(tokens[3], line_num)?,
                );
                let symbol = tokens
                    .get(7)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| element_from_name(tokens[0]));
                let atom = Atom::new(&symbol, position)
                    .map_err(|e| parse_error(line_num, e.to_string()))?;
                system.push(atom);
            }
            frames.push(system);
        }
        Ok(frames)
    }

    fn write_frames(
        frames: &[MolecularSystem],
        options: &Self::Options,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        let periodic = frames.iter().any(|s| s.is_periodic());
        let date = options.date.unwrap_or_else(Local::now);
        let space_group = options.space_group.as_deref().unwrap_or("(P1)");

        writeln!(writer, "{HEADER}")?;
        writeln!(writer, "PBC={}", if periodic { "ON" } else { "OFF" })?;

        for system in frames {
            let title = if options.title.is_empty() {
                system.name.as_deref().unwrap_or("")
            } else {
                options.title.as_str()
            };
            writeln!(
                writer,
                "{:<width$}{:>15.7}",
                title,
                system.energy.unwrap_or(0.0),
                width = TITLE_WIDTH
            )?;
            writeln!(writer, "!DATE {}", date.format("%a %b %d %H:%M:%S %Y"))?;

            let parameters: String = system
                .cell
                .parameters()
                .iter()
                .map(|p| format!("{p:10.5}"))
                .collect();
            writeln!(writer, "PBC{parameters} {space_group:<7}")?;

            for atom in &system.atoms {
                let p = atom.position;
                writeln!(
                    writer,
                    "{:<5} {:14.9} {:14.9} {:14.9} XXXX {:<7}{:<7} {:<2} {:6.3}",
                    atom.symbol,
                    p.x,
                    p.y,
                    p.z,
                    "1",
                    atom.symbol,
                    atom.symbol,
                    f64::from(atom.atomic_number)
                )?;
            }
            writeln!(writer, "end")?;
        }
        writeln!(writer, "end")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Cursor;

    fn options() -> CarOptions {
        CarOptions {
            title: "converted from: test.xyz".into(),
            date: Local.with_ymd_and_hms(2016, 3, 1, 12, 30, 5).single(),
            space_group: None,
        }
    }

    fn quartz_fragment() -> MolecularSystem {
        let mut system = MolecularSystem::from_atoms(vec![
            Atom::new("Si", Point3::new(0.0, 0.0, 0.0)).unwrap(),
            Atom::new("O", Point3::new(1.6, 0.0, 0.0)).unwrap(),
        ]);
        system.cell = Cell::orthorhombic(5.0, 5.0, 5.0);
        system.pbc = [true; 3];
        system.energy = Some(-123.4567891);
        system
    }

    #[test]
    fn writes_biosym_layout() {
        let mut buffer = Vec::new();
        CarFile::write_to(&quartz_fragment(), &options(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "!BIOSYM archive 3");
        assert_eq!(lines[1], "PBC=ON");
        assert_eq!(lines[2].len(), 80);
        assert!(lines[2].starts_with("converted from: test.xyz "));
        assert!(lines[2].ends_with("   -123.4567891"));
        assert_eq!(lines[3], "!DATE Tue Mar 01 12:30:05 2016");
        assert_eq!(
            lines[4],
            "PBC   5.00000   5.00000   5.00000  90.00000  90.00000  90.00000 (P1)   "
        );
        assert_eq!(
            lines[5],
            "Si       0.000000000    0.000000000    0.000000000 XXXX 1      Si      Si 14.000"
        );
        assert_eq!(&lines[7..], &["end", "end"]);
    }

    #[test]
    fn molecule_is_written_with_pbc_off_and_zero_energy() {
        let mut system = quartz_fragment();
        system.pbc = [false; 3];
        system.energy = None;
        let mut buffer = Vec::new();
        CarFile::write_to(&system, &options(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("PBC=OFF\n"));
        assert!(text.lines().nth(2).unwrap().ends_with("      0.0000000"));
    }

    #[test]
    fn reads_back_written_frames() {
        let mut buffer = Vec::new();
        let frames = vec![quartz_fragment(), quartz_fragment()];
        CarFile::write_frames(&frames, &options(), &mut buffer).unwrap();

        let back = CarFile::read_frames(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].symbols(), vec!["Si", "O"]);
        assert_eq!(back[0].name.as_deref(), Some("converted from: test.xyz"));
        assert_eq!(back[0].energy, Some(-123.4567891));
        assert_eq!(back[1].pbc, [true; 3]);
        assert!((back[1].cell.lengths()[0] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn missing_header_is_an_error() {
        let err = CarFile::read_frames(&mut Cursor::new("PBC=ON\n")).unwrap_err();
        assert!(matches!(err, CarError::MissingRecord(_)));
    }
}
