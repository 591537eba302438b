//! System repository: `systems` rows, their atoms and their notes.

use super::properties::SYSTEM_PROPERTIES;
use super::{RepoError, RepoResult, exactly_one};
use crate::db::models::{AtomRecord, NewSystem, PropertyValue, RecordId, SystemData, SystemRecord};
use crate::db::with_savepoint;
use rusqlite::{Connection, Row, params};

const SYSTEM_SELECT_SQL: &str = "SELECT
    id,
    timestamp,
    name,
    topology,
    formula,
    username,
    cell_a,
    cell_b,
    cell_c,
    cell_alpha,
    cell_beta,
    cell_gamma,
    pbc_a,
    pbc_b,
    pbc_c,
    energy,
    free_energy,
    enthalpy,
    entropy,
    internal_energy,
    thermo,
    magnetic_moment,
    absolute_magnetization,
    total_magnetization,
    articledoi
FROM systems";

const SYSTEM_INSERT_SQL: &str = "INSERT INTO systems (
    id, name, topology, formula, username,
    cell_a, cell_b, cell_c, cell_alpha, cell_beta, cell_gamma,
    pbc_a, pbc_b, pbc_c,
    energy, free_energy, enthalpy, entropy, internal_energy, thermo,
    magnetic_moment, absolute_magnetization, total_magnetization, articledoi
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
          ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24);";

const SYSTEM_UPDATE_SQL: &str = "UPDATE systems SET
    name = ?2, topology = ?3, formula = ?4, username = ?5,
    cell_a = ?6, cell_b = ?7, cell_c = ?8, cell_alpha = ?9, cell_beta = ?10, cell_gamma = ?11,
    pbc_a = ?12, pbc_b = ?13, pbc_c = ?14,
    energy = ?15, free_energy = ?16, enthalpy = ?17, entropy = ?18, internal_energy = ?19, thermo = ?20,
    magnetic_moment = ?21, absolute_magnetization = ?22, total_magnetization = ?23, articledoi = ?24
WHERE id = ?1;";

const ATOM_SELECT_SQL: &str = "SELECT
    atomic_number, mass, tag, x, y, z, force_x, force_y, force_z,
    momentum_x, momentum_y, momentum_z, charge, magmom, initial_magmom, initial_charge
FROM atoms WHERE system_id = ?1 ORDER BY id;";

const ATOM_INSERT_SQL: &str = "INSERT INTO atoms (
    system_id, atomic_number, mass, tag, x, y, z, force_x, force_y, force_z,
    momentum_x, momentum_y, momentum_z, charge, magmom, initial_magmom, initial_charge
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17);";

/// Filters for listing systems; `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct SystemQuery {
    pub name: Option<String>,
    pub topology: Option<String>,
    pub username: Option<String>,
    pub limit: Option<u32>,
}

pub trait SystemRepository {
    /// Inserts the system row, its notes and its atoms as one unit.
    fn create_system(&self, system: &NewSystem) -> RepoResult<RecordId>;
    fn get_system(&self, id: RecordId) -> RepoResult<SystemRecord>;
    /// Looks a system up by name; the name must match exactly one row.
    fn find_system_by_name(&self, name: &str) -> RepoResult<SystemRecord>;
    fn list_systems(&self, query: &SystemQuery) -> RepoResult<Vec<SystemRecord>>;
    /// Overwrites the scalar columns and the notes of a system.
    fn update_system(&self, id: RecordId, data: &SystemData) -> RepoResult<()>;
    fn set_note(&self, id: RecordId, key: &str, value: &PropertyValue) -> RepoResult<()>;
    fn atoms(&self, system_id: RecordId) -> RepoResult<Vec<AtomRecord>>;
    fn replace_atoms(&self, system_id: RecordId, atoms: &[AtomRecord]) -> RepoResult<()>;
    /// Deletes a system; atoms, notes, jobs and vibration sets cascade.
    fn delete_system(&self, id: RecordId) -> RepoResult<()>;
}

pub struct SqliteSystemRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSystemRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn write_row(&self, sql: &str, id: Option<RecordId>, data: &SystemData) -> RepoResult<usize> {
        let [a, b, c, alpha, beta, gamma] = match data.cell {
            Some(parameters) => parameters.map(Some),
            None => [None; 6],
        };
        let changed = self.conn.execute(
            sql,
            params![
                id,
                data.name,
                data.topology,
                data.formula,
                data.username,
                a,
                b,
                c,
                alpha,
                beta,
                gamma,
                data.pbc[0],
                data.pbc[1],
                data.pbc[2],
                data.energy,
                data.free_energy,
                data.enthalpy,
                data.entropy,
                data.internal_energy,
                data.thermo,
                data.magnetic_moment,
                data.absolute_magnetization,
                data.total_magnetization,
                data.articledoi,
            ],
        )?;
        Ok(changed)
    }

    fn insert_atoms(&self, system_id: RecordId, atoms: &[AtomRecord]) -> RepoResult<()> {
        let mut stmt = self.conn.prepare_cached(ATOM_INSERT_SQL)?;
        for atom in atoms {
            let [x, y, z] = atom.position;
            let [fx, fy, fz] = match atom.force {
                Some(force) => force.map(Some),
                None => [None; 3],
            };
            let [px, py, pz] = atom.momentum;
            stmt.execute(params![
                system_id,
                atom.atomic_number,
                atom.mass,
                atom.tag,
                x,
                y,
                z,
                fx,
                fy,
                fz,
                px,
                py,
                pz,
                atom.charge,
                atom.magmom,
                atom.initial_magmom,
                atom.initial_charge,
            ])?;
        }
        Ok(())
    }

    fn with_notes(&self, mut record: SystemRecord) -> RepoResult<SystemRecord> {
        record.data.notes = SYSTEM_PROPERTIES.load(self.conn, record.id)?;
        Ok(record)
    }

    fn ensure_exists(&self, id: RecordId) -> RepoResult<()> {
        let exists: bool = self
            .conn
            .query_row("SELECT EXISTS(SELECT 1 FROM systems WHERE id = ?1);", [id], |row| row.get(0))?;
        if exists { Ok(()) } else { Err(RepoError::not_found("system", id)) }
    }
}

impl SystemRepository for SqliteSystemRepository<'_> {
    fn create_system(&self, system: &NewSystem) -> RepoResult<RecordId> {
        let id = with_savepoint(self.conn, "create_system", || {
            self.write_row(SYSTEM_INSERT_SQL, None, &system.data)?;
            let id = self.conn.last_insert_rowid();
            SYSTEM_PROPERTIES.store_all(self.conn, id, &system.data.notes)?;
            self.insert_atoms(id, &system.atoms)?;
            Ok::<_, RepoError>(id)
        })?;
        tracing::debug!(id, name = ?system.data.name, atoms = system.atoms.len(), "Inserted system");
        Ok(id)
    }

    fn get_system(&self, id: RecordId) -> RepoResult<SystemRecord> {
        let sql = format!("{SYSTEM_SELECT_SQL} WHERE id = ?1;");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => self.with_notes(parse_system_row(row)?),
            None => Err(RepoError::not_found("system", id)),
        }
    }

    fn find_system_by_name(&self, name: &str) -> RepoResult<SystemRecord> {
        let records = self.list_systems(&SystemQuery {
            name: Some(name.to_string()),
            ..SystemQuery::default()
        })?;
        exactly_one(records, "system", name)
    }

    fn list_systems(&self, query: &SystemQuery) -> RepoResult<Vec<SystemRecord>> {
        let sql = format!(
            "{SYSTEM_SELECT_SQL}
             WHERE (?1 IS NULL OR name = ?1)
               AND (?2 IS NULL OR topology = ?2)
               AND (?3 IS NULL OR username = ?3)
             ORDER BY id
             LIMIT ?4;"
        );
        let limit = query.limit.map_or(-1, i64::from);
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(
                params![query.name, query.topology, query.username, limit],
                parse_system_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        records.into_iter().map(|r| self.with_notes(r)).collect()
    }

    fn update_system(&self, id: RecordId, data: &SystemData) -> RepoResult<()> {
        with_savepoint(self.conn, "update_system", || {
            if self.write_row(SYSTEM_UPDATE_SQL, Some(id), data)? == 0 {
                return Err(RepoError::not_found("system", id));
            }
            SYSTEM_PROPERTIES.replace_all(self.conn, id, &data.notes)
        })
    }

    fn set_note(&self, id: RecordId, key: &str, value: &PropertyValue) -> RepoResult<()> {
        self.ensure_exists(id)?;
        SYSTEM_PROPERTIES.store(self.conn, id, key, value)
    }

    fn atoms(&self, system_id: RecordId) -> RepoResult<Vec<AtomRecord>> {
        let mut stmt = self.conn.prepare_cached(ATOM_SELECT_SQL)?;
        let atoms = stmt
            .query_map([system_id], parse_atom_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(atoms)
    }

    fn replace_atoms(&self, system_id: RecordId, atoms: &[AtomRecord]) -> RepoResult<()> {
        self.ensure_exists(system_id)?;
        with_savepoint(self.conn, "replace_atoms", || {
            self.conn.execute("DELETE FROM atoms WHERE system_id = ?1;", [system_id])?;
            self.insert_atoms(system_id, atoms)
        })
    }

    fn delete_system(&self, id: RecordId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM systems WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("system", id));
        }
        tracing::debug!(id, "Deleted system");
        Ok(())
    }
}

fn parse_system_row(row: &Row<'_>) -> rusqlite::Result<SystemRecord> {
    let cell: [Option<f64>; 6] = [row.get(6)?, row.get(7)?, row.get(8)?, row.get(9)?, row.get(10)?, row.get(11)?];
    let cell = match cell {
        [Some(a), Some(b), Some(c), Some(alpha), Some(beta), Some(gamma)] => Some([a, b, c, alpha, beta, gamma]),
        _ => None,
    };
    Ok(SystemRecord {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        data: SystemData {
            name: row.get(2)?,
            topology: row.get(3)?,
            formula: row.get(4)?,
            username: row.get(5)?,
            cell,
            pbc: [row.get(12)?, row.get(13)?, row.get(14)?],
            energy: row.get(15)?,
            free_energy: row.get(16)?,
            enthalpy: row.get(17)?,
            entropy: row.get(18)?,
            internal_energy: row.get(19)?,
            thermo: row.get(20)?,
            magnetic_moment: row.get(21)?,
            absolute_magnetization: row.get(22)?,
            total_magnetization: row.get(23)?,
            articledoi: row.get(24)?,
            notes: Default::default(),
        },
    })
}

fn parse_atom_row(row: &Row<'_>) -> rusqlite::Result<AtomRecord> {
    let force: [Option<f64>; 3] = [row.get(6)?, row.get(7)?, row.get(8)?];
    let force = match force {
        [Some(x), Some(y), Some(z)] => Some([x, y, z]),
        _ => None,
    };
    Ok(AtomRecord {
        atomic_number: row.get(0)?,
        mass: row.get(1)?,
        tag: row.get(2)?,
        position: [row.get(3)?, row.get(4)?, row.get(5)?],
        force,
        momentum: [row.get(9)?, row.get(10)?, row.get(11)?],
        charge: row.get(12)?,
        magmom: row.get(13)?,
        initial_magmom: row.get(14)?,
        initial_charge: row.get(15)?,
    })
}
