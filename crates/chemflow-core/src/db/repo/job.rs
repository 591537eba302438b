//! Job repository.

use super::{RepoError, RepoResult};
use crate::db::models::{JobRecord, JobStatus, NewJob, RecordId};
use rusqlite::{Connection, Row, params};
use std::path::PathBuf;

const JOB_SELECT_SQL: &str = "SELECT
    id,
    system_id,
    name,
    abspath,
    inpname,
    outname,
    status,
    hostname,
    username,
    jobscript,
    calculator_id,
    template_id
FROM jobs";

#[derive(Debug, Clone, Default)]
pub struct JobQuery {
    pub system_id: Option<RecordId>,
    pub name: Option<String>,
    pub status: Option<JobStatus>,
}

pub trait JobRepository {
    fn create_job(&self, job: &NewJob) -> RepoResult<RecordId>;
    fn get_job(&self, id: RecordId) -> RepoResult<JobRecord>;
    /// The job called `name` attached to a system.
    fn find_job(&self, system_id: RecordId, name: &str) -> RepoResult<JobRecord>;
    fn list_jobs(&self, query: &JobQuery) -> RepoResult<Vec<JobRecord>>;
    /// Writes back every mutable column of `job`.
    fn update_job(&self, job: &JobRecord) -> RepoResult<()>;
    fn set_status(&self, id: RecordId, status: JobStatus) -> RepoResult<()>;
    fn delete_job(&self, id: RecordId) -> RepoResult<()>;
}

pub struct SqliteJobRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteJobRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_one(&self, sql: &str, params: impl rusqlite::Params, key: impl ToString) -> RepoResult<JobRecord> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        match rows.next()? {
            Some(row) => parse_job_row(row),
            None => Err(RepoError::not_found("job", key)),
        }
    }
}

impl JobRepository for SqliteJobRepository<'_> {
    fn create_job(&self, job: &NewJob) -> RepoResult<RecordId> {
        self.conn.execute(
            "INSERT INTO jobs (
                system_id, name, abspath, inpname, outname, status,
                hostname, username, calculator_id, template_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                job.system_id,
                job.name,
                job.abspath.to_string_lossy(),
                job.inpname,
                job.outname,
                job.status.as_str(),
                job.hostname,
                job.username,
                job.calculator_id,
                job.template_id,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(id, system_id = job.system_id, name = %job.name, "Inserted job");
        Ok(id)
    }

    fn get_job(&self, id: RecordId) -> RepoResult<JobRecord> {
        self.query_one(&format!("{JOB_SELECT_SQL} WHERE id = ?1;"), [id], id)
    }

    fn find_job(&self, system_id: RecordId, name: &str) -> RepoResult<JobRecord> {
        self.query_one(
            &format!("{JOB_SELECT_SQL} WHERE system_id = ?1 AND name = ?2;"),
            params![system_id, name],
            format!("'{name}' of system {system_id}"),
        )
    }

    fn list_jobs(&self, query: &JobQuery) -> RepoResult<Vec<JobRecord>> {
        let sql = format!(
            "{JOB_SELECT_SQL}
             WHERE (?1 IS NULL OR system_id = ?1)
               AND (?2 IS NULL OR name = ?2)
               AND (?3 IS NULL OR status = ?3)
             ORDER BY id;"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![query.system_id, query.name, query.status.map(|s| s.as_str())])?;
        let mut jobs = Vec::new();
        while let Some(row) = rows.next()? {
            jobs.push(parse_job_row(row)?);
        }
        Ok(jobs)
    }

    fn update_job(&self, job: &JobRecord) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE jobs SET
                name = ?2, abspath = ?3, inpname = ?4, outname = ?5, status = ?6,
                hostname = ?7, username = ?8, jobscript = ?9, calculator_id = ?10, template_id = ?11
             WHERE id = ?1;",
            params![
                job.id,
                job.name,
                job.abspath.to_string_lossy(),
                job.inpname,
                job.outname,
                job.status.as_str(),
                job.hostname,
                job.username,
                job.jobscript,
                job.calculator_id,
                job.template_id,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("job", job.id));
        }
        Ok(())
    }

    fn set_status(&self, id: RecordId, status: JobStatus) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("UPDATE jobs SET status = ?2 WHERE id = ?1;", params![id, status.as_str()])?;
        if changed == 0 {
            return Err(RepoError::not_found("job", id));
        }
        Ok(())
    }

    fn delete_job(&self, id: RecordId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM jobs WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("job", id));
        }
        Ok(())
    }
}

fn parse_job_row(row: &Row<'_>) -> RepoResult<JobRecord> {
    let status: String = row.get(6)?;
    let status = status.parse::<JobStatus>().map_err(RepoError::InvalidData)?;
    Ok(JobRecord {
        id: row.get(0)?,
        system_id: row.get(1)?,
        name: row.get(2)?,
        abspath: PathBuf::from(row.get::<_, String>(3)?),
        inpname: row.get(4)?,
        outname: row.get(5)?,
        status,
        hostname: row.get(7)?,
        username: row.get(8)?,
        jobscript: row.get(9)?,
        calculator_id: row.get(10)?,
        template_id: row.get(11)?,
    })
}
