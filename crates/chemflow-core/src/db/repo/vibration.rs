//! Vibration repository: named sets of normal-mode energies per system.

use super::{RepoError, RepoResult};
use crate::db::models::{NewVibrationSet, RecordId, Vibration, VibrationSetRecord};
use crate::db::with_savepoint;
use rusqlite::{Connection, params};

pub trait VibrationRepository {
    fn create_vibration_set(&self, set: &NewVibrationSet) -> RepoResult<RecordId>;
    fn get_vibration_set(&self, id: RecordId) -> RepoResult<VibrationSetRecord>;
    /// All vibration sets of a system, oldest first.
    fn vibration_sets(&self, system_id: RecordId) -> RepoResult<Vec<VibrationSetRecord>>;
    fn delete_vibration_set(&self, id: RecordId) -> RepoResult<()>;
}

pub struct SqliteVibrationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteVibrationRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn vibrations(&self, set_id: RecordId) -> RepoResult<Vec<Vibration>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT energy_real, energy_imag FROM vibrations WHERE vibration_set_id = ?1 ORDER BY id;",
        )?;
        let vibrations = stmt
            .query_map([set_id], |row| {
                Ok(Vibration {
                    energy_real: row.get(0)?,
                    energy_imag: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(vibrations)
    }

    fn load_sets(&self, sql: &str, key: RecordId) -> RepoResult<Vec<VibrationSetRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([key], |row| {
                Ok((
                    row.get::<_, RecordId>(0)?,
                    row.get::<_, RecordId>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, system_id, name, atom_ids)| {
                Ok(VibrationSetRecord {
                    id,
                    system_id,
                    name,
                    atom_ids: atom_ids.as_deref().map(parse_atom_ids).transpose()?,
                    vibrations: self.vibrations(id)?,
                })
            })
            .collect()
    }
}

impl VibrationRepository for SqliteVibrationRepository<'_> {
    fn create_vibration_set(&self, set: &NewVibrationSet) -> RepoResult<RecordId> {
        let atom_ids = set.atom_ids.as_deref().map(format_atom_ids);
        let id = with_savepoint(self.conn, "create_vibration_set", || {
            self.conn.execute(
                "INSERT INTO vibration_sets (system_id, name, atom_ids) VALUES (?1, ?2, ?3);",
                params![set.system_id, set.name, atom_ids],
            )?;
            let id = self.conn.last_insert_rowid();
            let mut stmt = self.conn.prepare_cached(
                "INSERT INTO vibrations (vibration_set_id, energy_real, energy_imag) VALUES (?1, ?2, ?3);",
            )?;
            for vibration in &set.vibrations {
                stmt.execute(params![id, vibration.energy_real, vibration.energy_imag])?;
            }
            Ok::<_, RepoError>(id)
        })?;
        tracing::debug!(id, system_id = set.system_id, modes = set.vibrations.len(), "Inserted vibration set");
        Ok(id)
    }

    fn get_vibration_set(&self, id: RecordId) -> RepoResult<VibrationSetRecord> {
        self.load_sets(
            "SELECT id, system_id, name, atom_ids FROM vibration_sets WHERE id = ?1;",
            id,
        )?
        .pop()
        .ok_or_else(|| RepoError::not_found("vibration set", id))
    }

    fn vibration_sets(&self, system_id: RecordId) -> RepoResult<Vec<VibrationSetRecord>> {
        self.load_sets(
            "SELECT id, system_id, name, atom_ids FROM vibration_sets WHERE system_id = ?1 ORDER BY id;",
            system_id,
        )
    }

    fn delete_vibration_set(&self, id: RecordId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM vibration_sets WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("vibration set", id));
        }
        Ok(())
    }
}

fn format_atom_ids(ids: &[usize]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
}

fn parse_atom_ids(text: &str) -> RepoResult<Vec<usize>> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|_| RepoError::InvalidData(format!("invalid atom index '{s}' in vibration set")))
        })
        .collect()
}
