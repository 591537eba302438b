use super::{RepoError, RepoResult};
use crate::db::models::{PropertyValue, RecordId};
use rusqlite::{Connection, params};
use std::collections::BTreeMap;

/// A vertical key/value table hanging off an owner row.
pub(crate) struct PropertyTable {
    table: &'static str,
    owner_column: &'static str,
}

pub(crate) const SYSTEM_PROPERTIES: PropertyTable = PropertyTable {
    table: "system_properties",
    owner_column: "system_id",
};

pub(crate) const CALCULATOR_ATTRIBUTES: PropertyTable = PropertyTable {
    table: "calculator_attributes",
    owner_column: "calculator_id",
};

impl PropertyTable {
    pub(crate) fn load(&self, conn: &Connection, owner_id: RecordId) -> RepoResult<BTreeMap<String, PropertyValue>> {
        let sql = format!(
            "SELECT key, kind, int_value, float_value, text_value, bool_value
             FROM {} WHERE {} = ?1 ORDER BY key;",
            self.table, self.owner_column
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([owner_id])?;
        let mut values = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let key: String = row.get(0)?;
            let kind: String = row.get(1)?;
            let value = PropertyValue::from_columns(&kind, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?)
                .ok_or_else(|| {
                    RepoError::InvalidData(format!(
                        "{} row '{key}' of owner {owner_id} has kind '{kind}' without a matching value",
                        self.table
                    ))
                })?;
            values.insert(key, value);
        }
        Ok(values)
    }

    /// Inserts or replaces one property. Non-finite floats are refused since
    /// SQLite would store them as NULL.
    pub(crate) fn store(&self, conn: &Connection, owner_id: RecordId, key: &str, value: &PropertyValue) -> RepoResult<()> {
        let (int_value, float_value, text_value, bool_value) = match value {
            PropertyValue::Float(x) if !x.is_finite() => {
                return Err(RepoError::InvalidData(format!(
                    "{} value '{key}' of owner {owner_id} is not a finite number ({x})",
                    self.table
                )));
            }
            PropertyValue::Int(i) => (Some(*i), None, None, None),
            PropertyValue::Float(x) => (None, Some(*x), None, None),
            PropertyValue::Text(s) => (None, None, Some(s.as_str()), None),
            PropertyValue::Bool(b) => (None, None, None, Some(*b)),
            PropertyValue::Null => (None, None, None, None),
        };
        let sql = format!(
            "INSERT INTO {table} ({owner}, key, kind, int_value, float_value, text_value, bool_value)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT ({owner}, key) DO UPDATE SET
                kind = excluded.kind,
                int_value = excluded.int_value,
                float_value = excluded.float_value,
                text_value = excluded.text_value,
                bool_value = excluded.bool_value;",
            table = self.table,
            owner = self.owner_column
        );
        conn.execute(
            &sql,
            params![owner_id, key, value.kind(), int_value, float_value, text_value, bool_value],
        )?;
        Ok(())
    }

    pub(crate) fn store_all(
        &self,
        conn: &Connection,
        owner_id: RecordId,
        values: &BTreeMap<String, PropertyValue>,
    ) -> RepoResult<()> {
        for (key, value) in values {
            self.store(conn, owner_id, key, value)?;
        }
        Ok(())
    }

    /// Replaces the whole property set of an owner.
    pub(crate) fn replace_all(
        &self,
        conn: &Connection,
        owner_id: RecordId,
        values: &BTreeMap<String, PropertyValue>,
    ) -> RepoResult<()> {
        let sql = format!("DELETE FROM {} WHERE {} = ?1;", self.table, self.owner_column);
        conn.execute(&sql, [owner_id])?;
        self.store_all(conn, owner_id, values)
    }
}
