use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};

use crate::modules::error::{code::ErrorCode, AppResult};
use crate::modules::jobs::model::{Job, JobFilter, JobStatus};
use crate::modules::storage::dao;
use crate::modules::storage::factory::StorageFactory;
use crate::raise_error;

/// Routes a job_id to the database it actually lives in: a per-user job
/// lives in that user's own database (isolation), a system job (no
/// `user_id`) lives in `system.db`'s own `jobs` table. The `job_index`
/// table in `system.db` is the persisted map from job_id to owner, so a
/// bare `get(job_id)` never has to scan every user's database to find it.
pub struct JobQueue {
    storage: Arc<StorageFactory>,
    system_pool: Pool<SqliteConnectionManager>,
    cancel_flags: DashMap<String, Arc<AtomicBool>>,
}

impl JobQueue {
    pub fn new(storage: Arc<StorageFactory>) -> Self {
        let system_pool = storage.system_pool();
        Self { storage, system_pool, cancel_flags: DashMap::new() }
    }

    fn index_owner(&self, job_id: &str) -> AppResult<Option<Option<String>>> {
        let conn = self.system_pool.get()?;
        conn.query_row("SELECT user_id FROM job_index WHERE job_id = ?1", params![job_id], |row| row.get::<_, Option<String>>(0))
            .optional()
            .map_err(|e| raise_error!(format!("job_index lookup failed: {e}"), ErrorCode::InternalError))
    }

    fn record_index(&self, job_id: &str, user_id: Option<&str>) -> AppResult<()> {
        let conn = self.system_pool.get()?;
        conn.execute(
            "INSERT INTO job_index (job_id, user_id) VALUES (?1, ?2)",
            params![job_id, user_id],
        )
        .map_err(|e| raise_error!(format!("job_index insert failed: {e}"), ErrorCode::InternalError))?;
        Ok(())
    }

    /// Enqueues a new job, pending, and records its routing entry.
    pub fn enqueue(&self, job: Job) -> AppResult<Job> {
        match &job.user_id {
            Some(user_id) => {
                let handle = self.storage.handle_for(user_id)?;
                handle.insert_job(&job)?;
            }
            None => {
                let conn = self.system_pool.get()?;
                dao::jobs::insert_job(&conn, &job)?;
            }
        }
        self.record_index(&job.job_id, job.user_id.as_deref())?;
        Ok(job)
    }

    /// Looks up a job by id. If `requesting_user_id` is set and the job
    /// belongs to a different user, this returns `NotFound` rather than
    /// leaking existence across the user boundary. System jobs (no owner)
    /// are visible to any requester.
    pub fn get(&self, job_id: &str, requesting_user_id: Option<&str>) -> AppResult<Job> {
        let not_found = || raise_error!(format!("job not found: {job_id}"), ErrorCode::ResourceNotFound);

        let owner = self.index_owner(job_id)?.ok_or_else(not_found)?;
        if let (Some(owner), Some(requester)) = (&owner, requesting_user_id) {
            if owner != requester {
                return Err(not_found());
            }
        }

        let job = match &owner {
            Some(user_id) => {
                let handle = self.storage.handle_for(user_id)?;
                handle.get_job(job_id)?
            }
            None => {
                let conn = self.system_pool.get()?;
                dao::jobs::get_job(&conn, job_id)?
            }
        };
        job.ok_or_else(not_found)
    }

    /// Cancels a job if it exists and is owned by `requesting_user_id` (or
    /// is a system job). Cancelling a terminal job is a no-op; cancelling a
    /// pending job marks it cancelled immediately; cancelling an in-progress
    /// job flips its cooperative cancel flag for the worker to observe at
    /// its next checkpoint.
    pub fn cancel(&self, job_id: &str, requesting_user_id: Option<&str>) -> AppResult<Job> {
        let mut job = self.get(job_id, requesting_user_id)?;
        if job.status.is_terminal() {
            return Ok(job);
        }
        if job.status == JobStatus::InProgress {
            if let Some(flag) = self.cancel_flags.get(job_id) {
                flag.store(true, Ordering::SeqCst);
            }
        }
        job.status = JobStatus::Cancelled;
        job.updated_at = crate::utc_now!();
        self.persist(&job)?;
        Ok(job)
    }

    /// Lists jobs. A `user_id` filter scopes the read to that user's own
    /// database; with no `user_id`, lists system jobs only - there is no
    /// cross-user listing path.
    pub fn list(&self, filter: &JobFilter) -> AppResult<Vec<Job>> {
        match &filter.user_id {
            Some(user_id) => {
                let handle = self.storage.handle_for(user_id)?;
                handle.list_jobs(filter)
            }
            None => {
                let conn = self.system_pool.get()?;
                dao::jobs::list_jobs(&conn, filter)
            }
        }
    }

    /// Atomically claims a pending job for execution: flips it to
    /// `in_progress` only if it is still `pending`. Returns `false` if
    /// another worker (or `cancel`) got there first, so callers never start
    /// the same job twice.
    pub fn try_claim(&self, job_id: &str, user_id: Option<&str>) -> AppResult<bool> {
        let now = crate::utc_now!();
        let affected = match user_id {
            Some(user_id) => {
                let handle = self.storage.handle_for(user_id)?;
                handle.claim_job(job_id, now)?
            }
            None => {
                let conn = self.system_pool.get()?;
                dao::jobs::claim_job(&conn, job_id, now)?
            }
        };
        Ok(affected)
    }

    /// Persists a job's current state back to its owning database.
    pub fn persist(&self, job: &Job) -> AppResult<()> {
        match &job.user_id {
            Some(user_id) => {
                let handle = self.storage.handle_for(user_id)?;
                handle.update_job(job)
            }
            None => {
                let conn = self.system_pool.get()?;
                dao::jobs::update_job(&conn, job)
            }
        }
    }

    /// Single-flight check scoped to one user's jobs of one type.
    pub fn has_in_progress(&self, user_id: Option<&str>, job_type: &str) -> AppResult<bool> {
        match user_id {
            Some(user_id) => self.storage.handle_for(user_id)?.has_in_progress(job_type),
            None => {
                let conn = self.system_pool.get()?;
                dao::jobs::has_in_progress(&conn, None, job_type)
            }
        }
    }

    /// Registers a fresh cancel flag for a job transitioning to in-progress.
    /// Workers poll this flag at batch boundaries.
    pub fn cancel_flag(&self, job_id: &str) -> Arc<AtomicBool> {
        self.cancel_flags.entry(job_id.to_string()).or_insert_with(|| Arc::new(AtomicBool::new(false))).clone()
    }

    pub fn clear_cancel_flag(&self, job_id: &str) {
        self.cancel_flags.remove(job_id);
    }
}
