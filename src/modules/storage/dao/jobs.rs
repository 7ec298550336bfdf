use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::modules::error::{code::ErrorCode, AppResult};
use crate::modules::jobs::model::{Job, JobFilter, JobStatus};
use crate::raise_error;

fn row_to_job(row: &Row) -> rusqlite::Result<Job> {
    let request_params: String = row.get("request_params")?;
    let results: Option<String> = row.get("results")?;
    let status: String = row.get("status")?;
    Ok(Job {
        job_id: row.get("job_id")?,
        user_id: row.get("user_id")?,
        job_type: row.get("job_type")?,
        status: JobStatus::parse(&status),
        request_params: serde_json::from_str(&request_params).unwrap_or(serde_json::Value::Null),
        progress: row.get("progress")?,
        results: results.and_then(|s| serde_json::from_str(&s).ok()),
        error_details: row.get("error_details")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub fn insert_job(conn: &Connection, job: &Job) -> AppResult<()> {
    conn.execute(
        "INSERT INTO jobs (job_id, user_id, job_type, status, request_params, progress, results, error_details, created_at, updated_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
        params![
            job.job_id,
            job.user_id,
            job.job_type,
            job.status.as_str(),
            serde_json::to_string(&job.request_params).unwrap_or_default(),
            job.progress,
            job.results.as_ref().map(|r| serde_json::to_string(r).unwrap_or_default()),
            job.error_details,
            job.created_at,
            job.updated_at,
        ],
    )
    .map_err(|e| raise_error!(format!("insert_job failed: {e}"), ErrorCode::InternalError))?;
    Ok(())
}

pub fn update_job(conn: &Connection, job: &Job) -> AppResult<()> {
    conn.execute(
        "UPDATE jobs SET status=?2, progress=?3, results=?4, error_details=?5, updated_at=?6 WHERE job_id=?1",
        params![
            job.job_id,
            job.status.as_str(),
            job.progress,
            job.results.as_ref().map(|r| serde_json::to_string(r).unwrap_or_default()),
            job.error_details,
            job.updated_at,
        ],
    )
    .map_err(|e| raise_error!(format!("update_job failed: {e}"), ErrorCode::InternalError))?;
    Ok(())
}

pub fn get_job(conn: &Connection, job_id: &str) -> AppResult<Option<Job>> {
    conn.query_row("SELECT * FROM jobs WHERE job_id = ?1", params![job_id], row_to_job)
        .optional()
        .map_err(|e| raise_error!(format!("get_job failed: {e}"), ErrorCode::InternalError))
}

pub fn list_jobs(conn: &Connection, filter: &JobFilter) -> AppResult<Vec<Job>> {
    let mut clauses = Vec::new();
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(user_id) = &filter.user_id {
        clauses.push("user_id = ?".to_string());
        args.push(Box::new(user_id.clone()));
    }
    if let Some(job_type) = &filter.job_type {
        clauses.push("job_type = ?".to_string());
        args.push(Box::new(job_type.clone()));
    }
    if let Some(status) = filter.status {
        clauses.push("status = ?".to_string());
        args.push(Box::new(status.as_str().to_string()));
    }
    let where_clause = if clauses.is_empty() { "1=1".to_string() } else { clauses.join(" AND ") };
    let limit = filter.limit.unwrap_or(50).min(1000);
    let offset = filter.offset.unwrap_or(0);

    let sql = format!("SELECT * FROM jobs WHERE {where_clause} ORDER BY created_at DESC LIMIT {limit} OFFSET {offset}");
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| raise_error!(format!("list_jobs prepare failed: {e}"), ErrorCode::InternalError))?;
    let refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
    let rows = stmt
        .query_map(refs.as_slice(), row_to_job)
        .map_err(|e| raise_error!(format!("list_jobs query failed: {e}"), ErrorCode::InternalError))?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| raise_error!(format!("row decode failed: {e}"), ErrorCode::InternalError))?);
    }
    Ok(out)
}

/// Single-flight check: is there already an `in_progress` job of this type
/// for this user?
pub fn has_in_progress(conn: &Connection, user_id: Option<&str>, job_type: &str) -> AppResult<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM jobs WHERE job_type = ?1 AND status = 'in_progress'
             AND ((?2 IS NULL AND user_id IS NULL) OR user_id = ?2)",
            params![job_type, user_id],
            |row| row.get(0),
        )
        .map_err(|e| raise_error!(format!("has_in_progress failed: {e}"), ErrorCode::InternalError))?;
    Ok(count > 0)
}

/// Claims a pending job by flipping it to `in_progress` in one statement;
/// returns whether this call was the one that made the transition.
pub fn claim_job(conn: &Connection, job_id: &str, now: i64) -> AppResult<bool> {
    let affected = conn
        .execute(
            "UPDATE jobs SET status = 'in_progress', updated_at = ?2 WHERE job_id = ?1 AND status = 'pending'",
            params![job_id, now],
        )
        .map_err(|e| raise_error!(format!("claim_job failed: {e}"), ErrorCode::InternalError))?;
    Ok(affected == 1)
}

pub fn delete_job(conn: &Connection, job_id: &str) -> AppResult<()> {
    conn.execute("DELETE FROM jobs WHERE job_id = ?1", params![job_id])
        .map_err(|e| raise_error!(format!("delete_job failed: {e}"), ErrorCode::InternalError))?;
    Ok(())
}

pub fn delete_jobs_older_than(conn: &Connection, cutoff: i64) -> AppResult<u64> {
    let affected = conn
        .execute(
            "DELETE FROM jobs WHERE created_at < ?1 AND status IN ('completed','failed','cancelled')",
            params![cutoff],
        )
        .map_err(|e| raise_error!(format!("delete_jobs_older_than failed: {e}"), ErrorCode::InternalError))?;
    Ok(affected as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::storage::migrations::migrate_user_db;

    fn fixture_conn() -> (tempfile::NamedTempFile, Connection) {
        let file = tempfile::NamedTempFile::new().expect("temp db file");
        let conn = Connection::open(file.path()).expect("open temp db");
        migrate_user_db(&conn).expect("run migrations");
        (file, conn)
    }

    fn pending_job(job_id: &str) -> Job {
        Job {
            job_id: job_id.into(),
            user_id: Some("u1".into()),
            job_type: "categorize_emails".into(),
            status: JobStatus::Pending,
            request_params: serde_json::Value::Null,
            progress: 0.0,
            results: None,
            error_details: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Invariant 2: single-flight. Only the first of two concurrent claim
    /// attempts against the same pending job succeeds.
    #[test]
    fn only_one_claim_succeeds() {
        let (_file, conn) = fixture_conn();
        let job = pending_job("j1");
        insert_job(&conn, &job).unwrap();

        assert!(claim_job(&conn, "j1", 100).unwrap());
        assert!(!claim_job(&conn, "j1", 200).unwrap());

        let stored = get_job(&conn, "j1").unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::InProgress);
        assert_eq!(stored.updated_at, 100);
    }

    #[test]
    fn has_in_progress_reflects_claim_state() {
        let (_file, conn) = fixture_conn();
        let job = pending_job("j2");
        insert_job(&conn, &job).unwrap();

        assert!(!has_in_progress(&conn, Some("u1"), "categorize_emails").unwrap());
        assert!(claim_job(&conn, "j2", 50).unwrap());
        assert!(has_in_progress(&conn, Some("u1"), "categorize_emails").unwrap());
    }
}
