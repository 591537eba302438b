use crate::core::io::traits::StructureFile;
use crate::core::models::atom::Atom;
use crate::core::models::cell::Cell;
use crate::core::models::system::MolecularSystem;
use nalgebra::{Matrix3, Point3, Vector3};
use regex::Regex;
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::sync::LazyLock;
use thiserror::Error;

static KEY_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_][A-Za-z0-9_]*)=(?:"([^"]*)"|(\S+))"#).expect("key=value pattern is valid")
});

#[derive(Debug, Error)]
pub enum XyzError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: XyzParseErrorKind },
}

#[derive(Debug, Error, PartialEq)]
pub enum XyzParseErrorKind {
    #[error("Invalid atom count '{0}'")]
    InvalidAtomCount(String),
    #[error("Missing comment line")]
    MissingComment,
    #[error("Expected {expected} atoms but the file ended after {found}")]
    TruncatedFrame { expected: usize, found: usize },
    #[error("Expected at least {expected} columns, found {found}")]
    TooFewColumns { expected: usize, found: usize },
    #[error("Invalid number '{0}'")]
    InvalidFloat(String),
    #[error("Unknown species '{0}'")]
    UnknownSpecies(String),
    #[error("Lattice must contain 9 numbers, got '{0}'")]
    InvalidLattice(String),
    #[error("Invalid pbc specification '{0}'")]
    InvalidPbc(String),
    #[error("Malformed Properties specification '{0}'")]
    InvalidProperties(String),
}

/// Options controlling extended XYZ output.
#[derive(Debug, Clone)]
pub struct XyzOptions {
    /// Number of decimals written for coordinates, lattice vectors and forces.
    pub precision: usize,
    /// Write a force block when every atom of a frame carries a force.
    pub write_forces: bool,
}

impl Default for XyzOptions {
    fn default() -> Self {
        Self {
            precision: 8,
            write_forces: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Column {
    Species,
    Position,
    Force,
    Skip(usize),
}

impl Column {
    fn width(self) -> usize {
        match self {
            Column::Species => 1,
            Column::Position | Column::Force => 3,
            Column::Skip(n) => n,
        }
    }
}

#[derive(Debug, Default)]
struct FrameHeader {
    cell: Option<Cell>,
    pbc: Option<[bool; 3]>,
    energy: Option<f64>,
    name: Option<String>,
    topology: Option<String>,
    info: BTreeMap<String, String>,
    columns: Vec<Column>,
}

fn parse_float(token: &str, line: usize) -> Result<f64, XyzError> {
    token.parse().map_err(|_| XyzError::Parse {
        line,
        kind: XyzParseErrorKind::InvalidFloat(token.to_string()),
    })
}

fn parse_flag(token: &str) -> Option<bool> {
    match token {
        "T" | "t" | "True" | "true" | "1" => Some(true),
        "F" | "f" | "False" | "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_properties(value: &str, line: usize) -> Result<Vec<Column>, XyzError> {
    let invalid = || XyzError::Parse {
        line,
        kind: XyzParseErrorKind::InvalidProperties(value.to_string()),
    };
    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() % 3 != 0 {
        return Err(invalid());
    }
    parts
        .chunks(3)
        .map(|chunk| {
            let width: usize = chunk[2].parse().map_err(|_| invalid())?;
            Ok(match (chunk[0], width) {
                ("species", 1) => Column::Species,
                ("pos", 3) => Column::Position,
                ("forces", 3) | ("force", 3) => Column::Force,
                (_, n) => Column::Skip(n),
            })
        })
        .collect()
}

fn parse_comment(comment: &str, line: usize) -> Result<FrameHeader, XyzError> {
    let mut header = FrameHeader::default();

    for captures in KEY_VALUE.captures_iter(comment) {
        let key = &captures[1];
        let value = captures
            .get(2)
            .or_else(|| captures.get(3))
            .map_or("", |m| m.as_str());

        match key.to_ascii_lowercase().as_str() {
            "lattice" => {
                let numbers = value
                    .split_whitespace()
                    .map(|t| parse_float(t, line))
                    .collect::<Result<Vec<_>, _>>()?;
                if numbers.len() != 9 {
                    return Err(XyzError::Parse {
                        line,
                        kind: XyzParseErrorKind::InvalidLattice(value.to_string()),
                    });
                }
                header.cell = Some(Cell::new(Matrix3::from_row_slice(&numbers)));
            }
            "pbc" => {
                let flags: Option<Vec<bool>> = value.split_whitespace().map(parse_flag).collect();
                match flags.as_deref() {
                    Some(&[a, b, c]) => header.pbc = Some([a, b, c]),
                    _ => {
                        return Err(XyzError::Parse {
                            line,
                            kind: XyzParseErrorKind::InvalidPbc(value.to_string()),
                        });
                    }
                }
            }
            "properties" => header.columns = parse_properties(value, line)?,
            "energy" => header.energy = Some(parse_float(value, line)?),
            "name" => header.name = Some(value.to_string()),
            "topology" => header.topology = Some(value.to_string()),
            _ => {
                header.info.insert(key.to_string(), value.to_string());
            }
        }
    }

    if header.columns.is_empty() {
        header.columns = vec![Column::Species, Column::Position];
    }
    Ok(header)
}

fn parse_atom(line_text: &str, columns: &[Column], line: usize) -> Result<Atom, XyzError> {
    let tokens: Vec<&str> = line_text.split_whitespace().collect();
    let expected: usize = columns.iter().map(|c| c.width()).sum();
    if tokens.len() < expected {
        return Err(XyzError::Parse {
            line,
            kind: XyzParseErrorKind::TooFewColumns {
                expected,
                found: tokens.len(),
            },
        });
    }

    let mut species = None;
    let mut position = Point3::origin();
    let mut force = None;
    let mut cursor = 0;

    for column in columns {
        let fields = &tokens[cursor..cursor + column.width()];
        match column {
            Column::Species => species = Some(fields[0]),
            Column::Position | Column::Force => {
                let v = Vector3::new(
                    parse_float(fields[0], line)?,
                    parse_float(fields[1], line)?,
                    parse_float(fields[2], line)?,
                );
                if *column == Column::Position {
                    position = Point3::from(v);
                } else {
                    force = Some(v);
                }
            }
            Column::Skip(_) => {}
        }
        cursor += column.width();
    }

    let species = species.unwrap_or_default();
    let atom = match species.parse::<u8>() {
        Ok(number) => Atom::from_number(number, position),
        Err(_) => Atom::new(species, position),
    };
    let mut atom = atom.map_err(|_| XyzError::Parse {
        line,
        kind: XyzParseErrorKind::UnknownSpecies(species.to_string()),
    })?;
    atom.force = force;
    Ok(atom)
}

/// Extended XYZ reader and writer.
///
/// Understands the `Lattice`, `pbc`, `Properties`, `energy`, `name` and
/// `topology` keys of the comment line; any other key is kept in
/// [`MolecularSystem::info`].
pub struct XyzFile;

impl StructureFile for XyzFile {
    type Options = XyzOptions;
    type Error = XyzError;

    fn read_frames(reader: &mut impl BufRead) -> Result<Vec<MolecularSystem>, Self::Error> {
        let mut lines = reader.lines().enumerate().map(|(i, l)| (i + 1, l));
        let mut frames = Vec::new();

        loop {
            let mut count_line = None;
            for (line_num, line) in lines.by_ref() {
                let line = line?;
                if !line.trim().is_empty() {
                    count_line = Some((line_num, line));
                    break;
                }
            }
            let Some((line_num, count_text)) = count_line else {
                break;
            };

            let count: usize = count_text.trim().parse().map_err(|_| XyzError::Parse {
                line: line_num,
                kind: XyzParseErrorKind::InvalidAtomCount(count_text.trim().to_string()),
            })?;

            let (comment_num, comment) = match lines.next() {
                Some((n, line)) => (n, line?),
                None => {
                    return Err(XyzError::Parse {
                        line: line_num + 1,
                        kind: XyzParseErrorKind::MissingComment,
                    });
                }
            };
            let header = parse_comment(&comment, comment_num)?;

            let mut system = MolecularSystem::new();
            for found in 0..count {
                let (atom_num, atom_line) = match lines.next() {
                    Some((n, line)) => (n, line?),
                    None => {
                        return Err(XyzError::Parse {
                            line: comment_num + found + 1,
                            kind: XyzParseErrorKind::TruncatedFrame {
                                expected: count,
                                found,
                            },
                        });
                    }
                };
                system.push(parse_atom(&atom_line, &header.columns, atom_num)?);
            }

            if let Some(cell) = header.cell {
                system.cell = cell;
                system.pbc = header.pbc.unwrap_or([true; 3]);
            } else if let Some(pbc) = header.pbc {
                system.pbc = pbc;
            }
            system.energy = header.energy;
            system.name = header.name;
            system.topology = header.topology;
            system.info = header.info;
            frames.push(system);
        }

        Ok(frames)
    }

    fn write_frames(
        frames: &[MolecularSystem],
        options: &Self::Options,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        let p = options.precision;
        for system in frames {
            let forces = if options.write_forces {
                system.forces().filter(|f| !f.is_empty())
            } else {
                None
            };

            writeln!(writer, "{}", system.len())?;

            let mut comment = Vec::new();
            if !system.cell.is_zero() {
                let lattice: Vec<String> = system
                    .cell
                    .vectors()
                    .transpose()
                    .iter()
                    .map(|v| format!("{v:.p$}"))
                    .collect();
                comment.push(format!("Lattice=\"{}\"", lattice.join(" ")));
            }
            let mut properties = String::from("species:S:1:pos:R:3");
            if forces.is_some() {
                properties.push_str(":forces:R:3");
            }
            comment.push(format!("Properties={properties}"));
            if let Some(energy) = system.energy {
                comment.push(format!("energy={energy}"));
            }
            let flags: Vec<&str> = system.pbc.iter().map(|&b| if b { "T" } else { "F" }).collect();
            comment.push(format!("pbc=\"{}\"", flags.join(" ")));
            if let Some(name) = &system.name {
                comment.push(format!("name=\"{}\"", name.replace('"', "'")));
            }
            if let Some(topology) = &system.topology {
                comment.push(format!("topology=\"{}\"", topology.replace('"', "'")));
            }
            for (key, value) in &system.info {
                comment.push(format!("{key}=\"{}\"", value.replace('"', "'")));
            }
            writeln!(writer, "{}", comment.join(" "))?;

            for (i, atom) in system.atoms.iter().enumerate() {
                let pos = atom.position;
                write!(
                    writer,
                    "{:<2} {:>w$.p$} {:>w$.p$} {:>w$.p$}",
                    atom.symbol,
                    pos.x,
                    pos.y,
                    pos.z,
                    w = p + 7
                )?;
                if let Some(forces) = &forces {
                    let f = forces[i];
                    write!(writer, " {:>w$.p$} {:>w$.p$} {:>w$.p$}", f.x, f.y, f.z, w = p + 7)?;
                }
                writeln!(writer)?;
            }
        }
        Ok(())
    }
}
