use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::modules::cleanup::policy::CleanupPolicy;
use crate::modules::cleanup::rules::{ArchiveRecord, ArchiveRule};
use crate::modules::error::AppResult;
use crate::modules::files::model::{FileAccessPermission, FileMetadata};
use crate::modules::jobs::model::{Job, JobFilter};
use crate::modules::mail::access::AccessSummary;
use crate::modules::mail::message::{MessageIndex, SearchCriteria};
use crate::modules::storage::dao;
use crate::modules::user::audit::AuditEntry;

/// A handle scoped to exactly one user. Every method threads `user_id`
/// through to the DAO layer itself - there is no code path in this type
/// that can read or write another user's rows, because the pool underneath
/// points at that user's own database file.
pub struct UserStorageHandle {
    user_id: String,
    pool: Pool<SqliteConnectionManager>,
}

impl UserStorageHandle {
    pub fn new(user_id: String, pool: Pool<SqliteConnectionManager>) -> Self {
        Self { user_id, pool }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn conn(&self) -> AppResult<r2d2::PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    pub fn upsert_message(&self, msg: &MessageIndex) -> AppResult<()> {
        dao::messages::upsert_message(&self.conn()?, &self.user_id, msg)
    }

    pub fn get_message(&self, message_id: &str) -> AppResult<Option<MessageIndex>> {
        dao::messages::get_message(&self.conn()?, &self.user_id, message_id)
    }

    pub fn search_messages(&self, criteria: &SearchCriteria) -> AppResult<Vec<MessageIndex>> {
        dao::messages::search_messages(&self.conn()?, &self.user_id, criteria)
    }

    pub fn get_messages_for_cleanup(&self, policy: &CleanupPolicy, limit: u32) -> AppResult<Vec<MessageIndex>> {
        dao::messages::get_messages_for_cleanup(&self.conn()?, &self.user_id, policy, limit)
    }

    pub fn delete_message(&self, message_id: &str) -> AppResult<()> {
        dao::messages::delete_message(&self.conn()?, &self.user_id, message_id)
    }

    pub fn get_access_summary(&self, message_id: &str) -> AppResult<AccessSummary> {
        dao::messages::get_access_summary(&self.conn()?, &self.user_id, message_id)
    }

    pub fn put_access_summary(&self, summary: &AccessSummary) -> AppResult<()> {
        dao::messages::put_access_summary(&self.conn()?, &self.user_id, summary)
    }

    pub fn insert_job(&self, job: &Job) -> AppResult<()> {
        dao::jobs::insert_job(&self.conn()?, job)
    }

    pub fn update_job(&self, job: &Job) -> AppResult<()> {
        dao::jobs::update_job(&self.conn()?, job)
    }

    pub fn get_job(&self, job_id: &str) -> AppResult<Option<Job>> {
        dao::jobs::get_job(&self.conn()?, job_id)
    }

    pub fn list_jobs(&self, filter: &JobFilter) -> AppResult<Vec<Job>> {
        dao::jobs::list_jobs(&self.conn()?, filter)
    }

    pub fn claim_job(&self, job_id: &str, now: i64) -> AppResult<bool> {
        dao::jobs::claim_job(&self.conn()?, job_id, now)
    }

    pub fn has_in_progress(&self, job_type: &str) -> AppResult<bool> {
        dao::jobs::has_in_progress(&self.conn()?, Some(&self.user_id), job_type)
    }

    pub fn delete_job(&self, job_id: &str) -> AppResult<()> {
        dao::jobs::delete_job(&self.conn()?, job_id)
    }

    pub fn delete_jobs_older_than(&self, cutoff: i64) -> AppResult<u64> {
        dao::jobs::delete_jobs_older_than(&self.conn()?, cutoff)
    }

    pub fn insert_policy(&self, policy: &CleanupPolicy) -> AppResult<()> {
        dao::policies::insert_policy(&self.conn()?, &self.user_id, policy)
    }

    pub fn update_policy(&self, policy: &CleanupPolicy) -> AppResult<()> {
        dao::policies::update_policy(&self.conn()?, &self.user_id, policy)
    }

    pub fn get_policy(&self, policy_id: &str) -> AppResult<Option<CleanupPolicy>> {
        dao::policies::get_policy(&self.conn()?, &self.user_id, policy_id)
    }

    pub fn list_policies(&self) -> AppResult<Vec<CleanupPolicy>> {
        dao::policies::list_policies(&self.conn()?, &self.user_id)
    }

    pub fn delete_policy(&self, policy_id: &str) -> AppResult<()> {
        dao::policies::delete_policy(&self.conn()?, &self.user_id, policy_id)
    }

    pub fn insert_file(&self, file: &FileMetadata, permissions: &[FileAccessPermission]) -> AppResult<()> {
        dao::files::insert_file(&self.conn()?, file, permissions)
    }

    pub fn get_file(&self, file_id: &str) -> AppResult<Option<FileMetadata>> {
        dao::files::get_file(&self.conn()?, &self.user_id, file_id)
    }

    pub fn list_file_permissions(&self, file_id: &str) -> AppResult<Vec<FileAccessPermission>> {
        dao::files::list_permissions(&self.conn()?, file_id)
    }

    pub fn list_expired_files(&self, now: i64) -> AppResult<Vec<FileMetadata>> {
        dao::files::list_expired(&self.conn()?, now)
    }

    pub fn delete_file(&self, file_id: &str) -> AppResult<()> {
        dao::files::delete_file(&self.conn()?, file_id)
    }

    pub fn insert_archive_record(&self, record: &ArchiveRecord) -> AppResult<()> {
        dao::archive::insert_record(&self.conn()?, &self.user_id, record)
    }

    pub fn list_archive_records(&self, limit: u32) -> AppResult<Vec<ArchiveRecord>> {
        dao::archive::list_records(&self.conn()?, &self.user_id, limit)
    }

    pub fn count_deletions_since(&self, since: i64) -> AppResult<u32> {
        dao::archive::count_deletions_since(&self.conn()?, &self.user_id, since)
    }

    pub fn insert_archive_rule(&self, rule: &ArchiveRule) -> AppResult<()> {
        dao::archive::insert_rule(&self.conn()?, &self.user_id, rule)
    }

    pub fn list_archive_rules(&self) -> AppResult<Vec<ArchiveRule>> {
        dao::archive::list_rules(&self.conn()?, &self.user_id)
    }

    pub fn get_archive_rule(&self, rule_id: &str) -> AppResult<Option<ArchiveRule>> {
        dao::archive::get_rule(&self.conn()?, &self.user_id, rule_id)
    }

    pub fn insert_audit(&self, entry: &AuditEntry) -> AppResult<()> {
        dao::audit::insert_audit(&self.conn()?, "audit_log", entry)
    }

    pub fn save_search(&self, name: &str, criteria: &SearchCriteria) -> AppResult<()> {
        dao::searches::save_search(&self.conn()?, &self.user_id, name, criteria)
    }

    pub fn list_saved_searches(&self) -> AppResult<Vec<(String, SearchCriteria)>> {
        dao::searches::list_saved_searches(&self.conn()?, &self.user_id)
    }

    pub fn message_counts(&self) -> AppResult<(i64, i64)> {
        dao::messages::message_counts(&self.conn()?, &self.user_id)
    }

    pub fn get_automation_state(&self, key: &str) -> AppResult<Option<serde_json::Value>> {
        dao::automation::get_state(&self.conn()?, key)
    }

    pub fn put_automation_state(&self, key: &str, value: &serde_json::Value) -> AppResult<()> {
        dao::automation::put_state(&self.conn()?, key, value)
    }
}
