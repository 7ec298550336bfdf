use rusqlite::Connection;

use crate::modules::error::{code::ErrorCode, AppResult};
use crate::raise_error;

/// Synthetic owner assigned to rows carried over from a schema that
/// predates the `user_id` column (design notes, open question).
pub const LEGACY_USER_ID: &str = "legacy";

/// Forward-only migrations for one user's database. Each step is additive;
/// nothing here ever drops a column or a row. Failure here must stop the
/// factory from handing out a handle at all.
pub fn migrate_user_db(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA foreign_keys=ON;

         CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);

         CREATE TABLE IF NOT EXISTS messages (
             user_id TEXT NOT NULL DEFAULT 'legacy',
             message_id TEXT NOT NULL,
             thread_id TEXT,
             subject TEXT,
             sender TEXT,
             recipients TEXT NOT NULL DEFAULT '[]',
             date INTEGER,
             year INTEGER,
             size_bytes INTEGER NOT NULL DEFAULT 0,
             has_attachments INTEGER NOT NULL DEFAULT 0,
             labels TEXT NOT NULL DEFAULT '[]',
             snippet TEXT,
             archived INTEGER NOT NULL DEFAULT 0,
             archive_date INTEGER,
             archive_location TEXT,
             importance_json TEXT,
             date_size_json TEXT,
             label_classifier_json TEXT,
             analysis_version INTEGER NOT NULL DEFAULT 0,
             analysis_timestamp INTEGER,
             PRIMARY KEY (user_id, message_id)
         );

         CREATE INDEX IF NOT EXISTS idx_messages_date ON messages(user_id, date DESC);
         CREATE INDEX IF NOT EXISTS idx_messages_archived ON messages(user_id, archived);

         CREATE TABLE IF NOT EXISTS access_summaries (
             user_id TEXT NOT NULL DEFAULT 'legacy',
             message_id TEXT NOT NULL,
             total_accesses INTEGER NOT NULL DEFAULT 0,
             last_accessed INTEGER,
             search_appearances INTEGER NOT NULL DEFAULT 0,
             search_interactions INTEGER NOT NULL DEFAULT 0,
             access_score REAL NOT NULL DEFAULT 1.0,
             PRIMARY KEY (user_id, message_id)
         );

         CREATE TABLE IF NOT EXISTS jobs (
             job_id TEXT PRIMARY KEY,
             user_id TEXT,
             job_type TEXT NOT NULL,
             status TEXT NOT NULL,
             request_params TEXT,
             progress REAL NOT NULL DEFAULT 0,
             results TEXT,
             error_details TEXT,
             created_at INTEGER NOT NULL,
             updated_at INTEGER NOT NULL
         );
         CREATE INDEX IF NOT EXISTS idx_jobs_user_type_status ON jobs(user_id, job_type, status);

         CREATE TABLE IF NOT EXISTS cleanup_policies (
             id TEXT PRIMARY KEY,
             user_id TEXT NOT NULL DEFAULT 'legacy',
             name TEXT NOT NULL,
             enabled INTEGER NOT NULL DEFAULT 1,
             priority INTEGER NOT NULL DEFAULT 0,
             criteria_json TEXT NOT NULL,
             action_json TEXT NOT NULL,
             safety_json TEXT NOT NULL,
             schedule_json TEXT,
             created_at INTEGER NOT NULL
         );

         CREATE TABLE IF NOT EXISTS archive_rules (
             id TEXT PRIMARY KEY,
             user_id TEXT NOT NULL DEFAULT 'legacy',
             selector_json TEXT NOT NULL,
             action_json TEXT NOT NULL,
             schedule_json TEXT,
             created_at INTEGER NOT NULL
         );

         CREATE TABLE IF NOT EXISTS archive_records (
             id TEXT PRIMARY KEY,
             user_id TEXT NOT NULL DEFAULT 'legacy',
             rule_id TEXT,
             message_ids_json TEXT NOT NULL,
             method TEXT NOT NULL,
             location TEXT,
             size_bytes INTEGER NOT NULL DEFAULT 0,
             restorable INTEGER NOT NULL DEFAULT 1,
             created_at INTEGER NOT NULL
         );

         CREATE TABLE IF NOT EXISTS file_metadata (
             id TEXT PRIMARY KEY,
             user_id TEXT NOT NULL,
             file_path TEXT NOT NULL,
             original_filename TEXT NOT NULL,
             file_type TEXT NOT NULL,
             size_bytes INTEGER NOT NULL,
             checksum_sha256 TEXT NOT NULL,
             created_at INTEGER NOT NULL,
             updated_at INTEGER NOT NULL,
             expires_at INTEGER
         );

         CREATE TABLE IF NOT EXISTS file_access_permissions (
             file_id TEXT NOT NULL,
             principal TEXT NOT NULL,
             grant TEXT NOT NULL,
             PRIMARY KEY (file_id, principal, grant)
         );

         CREATE TABLE IF NOT EXISTS saved_searches (
             name TEXT NOT NULL,
             user_id TEXT NOT NULL DEFAULT 'legacy',
             criteria_json TEXT NOT NULL,
             created_at INTEGER NOT NULL,
             PRIMARY KEY (user_id, name)
         );

         CREATE TABLE IF NOT EXISTS audit_log (
             id TEXT PRIMARY KEY,
             user_id TEXT,
             action TEXT NOT NULL,
             resource_type TEXT NOT NULL,
             resource_id TEXT,
             success INTEGER NOT NULL,
             ip TEXT,
             agent TEXT,
             created_at INTEGER NOT NULL
         );

         CREATE TABLE IF NOT EXISTS automation_state (
             key TEXT PRIMARY KEY,
             value_json TEXT NOT NULL,
             updated_at INTEGER NOT NULL
         );",
    )
    .map_err(|e| raise_error!(format!("user db migration failed: {e}"), ErrorCode::InternalError))?;

    Ok(())
}
