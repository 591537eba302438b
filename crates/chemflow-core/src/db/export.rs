//! CSV export of whole tables.

use rusqlite::Connection;
use rusqlite::types::ValueRef;
use std::io::Write;
use thiserror::Error;

/// Tables that may be exported, in schema order.
pub const EXPORTABLE_TABLES: &[&str] = &[
    "systems",
    "system_properties",
    "atoms",
    "calculators",
    "calculator_attributes",
    "templates",
    "jobs",
    "vibration_sets",
    "vibrations",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Unknown table '{name}', expected one of: {}", EXPORTABLE_TABLES.join(", "))]
    UnknownTable { name: String },
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Writes every row of `table` as CSV with a header line, returning the number
/// of rows written. NULL columns are written as empty fields.
pub fn export_table(conn: &Connection, table: &str, writer: impl Write) -> Result<usize, ExportError> {
    if !EXPORTABLE_TABLES.contains(&table) {
        return Err(ExportError::UnknownTable { name: table.to_string() });
    }

    let mut stmt = conn.prepare(&format!("SELECT * FROM {table} ORDER BY id;"))?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(&columns)?;

    let mut rows = stmt.query([])?;
    let mut count = 0;
    while let Some(row) = rows.next()? {
        let mut record = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            record.push(match row.get_ref(i)? {
                ValueRef::Null => String::new(),
                ValueRef::Integer(i) => i.to_string(),
                ValueRef::Real(x) => x.to_string(),
                ValueRef::Text(t) | ValueRef::Blob(t) => String::from_utf8_lossy(t).into_owned(),
            });
        }
        csv.write_record(&record)?;
        count += 1;
    }
    csv.flush().map_err(csv::Error::from)?;
    tracing::debug!(table, rows = count, "Exported table");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_db_in_memory;
    use crate::db::repo::{SqliteTemplateRepository, TemplateRepository};

    #[test]
    fn exports_header_and_rows() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteTemplateRepository::new(&conn);
        repo.create_template("a.py", "x = %x").unwrap();
        repo.create_template("b.py", "y = 1,\n2").unwrap();

        let mut out = Vec::new();
        assert_eq!(export_table(&conn, "templates", &mut out).unwrap(), 2);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("id,name,template\n1,a.py,x = %x\n"));
        assert!(text.contains("\"y = 1,\n2\""));
    }

    #[test]
    fn unknown_tables_are_rejected() {
        let conn = open_db_in_memory().unwrap();
        let err = export_table(&conn, "sqlite_master", Vec::new()).unwrap_err();
        assert!(err.to_string().contains("systems, system_properties"));
    }
}
