//! Calculator repository. Calculator settings live in the vertical
//! `calculator_attributes` table so any code's parameters can be stored.

use super::properties::CALCULATOR_ATTRIBUTES;
use super::{RepoError, RepoResult, exactly_one};
use crate::db::models::{CalculatorRecord, NewCalculator, PropertyValue, RecordId};
use crate::db::with_savepoint;
use rusqlite::{Connection, Row, params};

const CALCULATOR_SELECT_SQL: &str = "SELECT id, name, version, description FROM calculators";

pub trait CalculatorRepository {
    fn create_calculator(&self, calculator: &NewCalculator) -> RepoResult<RecordId>;
    fn get_calculator(&self, id: RecordId) -> RepoResult<CalculatorRecord>;
    fn find_calculator_by_name(&self, name: &str) -> RepoResult<CalculatorRecord>;
    fn list_calculators(&self) -> RepoResult<Vec<CalculatorRecord>>;
    fn set_attribute(&self, id: RecordId, key: &str, value: &PropertyValue) -> RepoResult<()>;
    fn delete_calculator(&self, id: RecordId) -> RepoResult<()>;
}

pub struct SqliteCalculatorRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCalculatorRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn load(&self, sql: &str, params: impl rusqlite::Params) -> RepoResult<Vec<CalculatorRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let records = stmt.query_map(params, parse_calculator_row)?.collect::<Result<Vec<_>, _>>()?;
        records
            .into_iter()
            .map(|mut record| {
                record.attributes = CALCULATOR_ATTRIBUTES.load(self.conn, record.id)?;
                Ok(record)
            })
            .collect()
    }
}

impl CalculatorRepository for SqliteCalculatorRepository<'_> {
    fn create_calculator(&self, calculator: &NewCalculator) -> RepoResult<RecordId> {
        let id = with_savepoint(self.conn, "create_calculator", || {
            self.conn.execute(
                "INSERT INTO calculators (name, version, description) VALUES (?1, ?2, ?3);",
                params![calculator.name, calculator.version, calculator.description],
            )?;
            let id = self.conn.last_insert_rowid();
            CALCULATOR_ATTRIBUTES.store_all(self.conn, id, &calculator.attributes)?;
            Ok::<_, RepoError>(id)
        })?;
        tracing::debug!(id, name = %calculator.name, attributes = calculator.attributes.len(), "Inserted calculator");
        Ok(id)
    }

    fn get_calculator(&self, id: RecordId) -> RepoResult<CalculatorRecord> {
        self.load(&format!("{CALCULATOR_SELECT_SQL} WHERE id = ?1;"), [id])?
            .pop()
            .ok_or_else(|| RepoError::not_found("calculator", id))
    }

    fn find_calculator_by_name(&self, name: &str) -> RepoResult<CalculatorRecord> {
        let records = self.load(&format!("{CALCULATOR_SELECT_SQL} WHERE name = ?1 ORDER BY id;"), [name])?;
        exactly_one(records, "calculator", name)
    }

    fn list_calculators(&self) -> RepoResult<Vec<CalculatorRecord>> {
        self.load(&format!("{CALCULATOR_SELECT_SQL} ORDER BY id;"), [])
    }

    fn set_attribute(&self, id: RecordId, key: &str, value: &PropertyValue) -> RepoResult<()> {
        self.get_calculator(id)?;
        CALCULATOR_ATTRIBUTES.store(self.conn, id, key, value)
    }

    fn delete_calculator(&self, id: RecordId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM calculators WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("calculator", id));
        }
        Ok(())
    }
}

fn parse_calculator_row(row: &Row<'_>) -> rusqlite::Result<CalculatorRecord> {
    Ok(CalculatorRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        version: row.get(2)?,
        description: row.get(3)?,
        attributes: Default::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_db_in_memory;

    fn espresso() -> NewCalculator {
        NewCalculator {
            name: "espresso".into(),
            version: Some("6.8".into()),
            description: None,
            attributes: [
                ("pw".to_string(), PropertyValue::Int(500)),
                ("xc".to_string(), PropertyValue::Text("PBE".into())),
                ("kpts".to_string(), PropertyValue::Text("(4, 4, 4)".into())),
                ("spinpol".to_string(), PropertyValue::Bool(false)),
                ("sigma".to_string(), PropertyValue::Float(0.1)),
            ]
            .into(),
        }
    }

    #[test]
    fn attributes_keep_their_types() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteCalculatorRepository::new(&conn);
        let id = repo.create_calculator(&espresso()).unwrap();
        let record = repo.get_calculator(id).unwrap();
        assert_eq!(record.attributes, espresso().attributes);
        assert_eq!(record.version.as_deref(), Some("6.8"));
    }

    #[test]
    fn set_attribute_overwrites_in_place() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteCalculatorRepository::new(&conn);
        let id = repo.create_calculator(&espresso()).unwrap();
        repo.set_attribute(id, "pw", &PropertyValue::Float(450.5)).unwrap();
        repo.set_attribute(id, "dw", &PropertyValue::Int(5000)).unwrap();

        let attributes = repo.find_calculator_by_name("espresso").unwrap().attributes;
        assert_eq!(attributes["pw"], PropertyValue::Float(450.5));
        assert_eq!(attributes["dw"], PropertyValue::Int(5000));
        assert_eq!(attributes.len(), 6);
        assert!(repo.set_attribute(99, "pw", &PropertyValue::Null).is_err());
    }

    #[test]
    fn deleting_removes_attributes() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteCalculatorRepository::new(&conn);
        let id = repo.create_calculator(&espresso()).unwrap();
        repo.delete_calculator(id).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM calculator_attributes;", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
        assert!(repo.list_calculators().unwrap().is_empty());
    }
}
