//! Template repository.

use super::{RepoError, RepoResult};
use crate::db::models::{RecordId, TemplateRecord};
use rusqlite::{Connection, Row, params};

const TEMPLATE_SELECT_SQL: &str = "SELECT id, name, template FROM templates";

pub trait TemplateRepository {
    /// Stores a template under a unique name.
    fn create_template(&self, name: &str, template: &str) -> RepoResult<RecordId>;
    fn get_template(&self, id: RecordId) -> RepoResult<TemplateRecord>;
    fn find_template_by_name(&self, name: &str) -> RepoResult<TemplateRecord>;
    fn list_templates(&self) -> RepoResult<Vec<TemplateRecord>>;
    fn update_template(&self, id: RecordId, template: &str) -> RepoResult<()>;
    fn delete_template(&self, id: RecordId) -> RepoResult<()>;
}

pub struct SqliteTemplateRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTemplateRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_one(&self, sql: &str, params: impl rusqlite::Params, key: impl ToString) -> RepoResult<TemplateRecord> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        match rows.next()? {
            Some(row) => Ok(parse_template_row(row)?),
            None => Err(RepoError::not_found("template", key)),
        }
    }
}

impl TemplateRepository for SqliteTemplateRepository<'_> {
    fn create_template(&self, name: &str, template: &str) -> RepoResult<RecordId> {
        self.conn.execute(
            "INSERT INTO templates (name, template) VALUES (?1, ?2);",
            params![name, template],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(id, name, "Inserted template");
        Ok(id)
    }

    fn get_template(&self, id: RecordId) -> RepoResult<TemplateRecord> {
        self.query_one(&format!("{TEMPLATE_SELECT_SQL} WHERE id = ?1;"), [id], id)
    }

    fn find_template_by_name(&self, name: &str) -> RepoResult<TemplateRecord> {
        self.query_one(&format!("{TEMPLATE_SELECT_SQL} WHERE name = ?1;"), [name], name)
    }

    fn list_templates(&self) -> RepoResult<Vec<TemplateRecord>> {
        let mut stmt = self.conn.prepare(&format!("{TEMPLATE_SELECT_SQL} ORDER BY name;"))?;
        let records = stmt.query_map([], parse_template_row)?.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn update_template(&self, id: RecordId, template: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("UPDATE templates SET template = ?2 WHERE id = ?1;", params![id, template])?;
        if changed == 0 {
            return Err(RepoError::not_found("template", id));
        }
        Ok(())
    }

    fn delete_template(&self, id: RecordId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM templates WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("template", id));
        }
        Ok(())
    }
}

fn parse_template_row(row: &Row<'_>) -> rusqlite::Result<TemplateRecord> {
    Ok(TemplateRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        template: row.get(2)?,
    })
}
