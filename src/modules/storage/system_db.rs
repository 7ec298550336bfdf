use rusqlite::Connection;

use crate::modules::error::{code::ErrorCode, AppResult};
use crate::raise_error;

/// Migrates the shared `system.db`: user registry, sessions, system-wide
/// audit. Kept separate from per-user schemas since it is never addressed
/// through the per-user factory.
pub fn migrate_system_db(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;

         CREATE TABLE IF NOT EXISTS users (
             user_id TEXT PRIMARY KEY,
             email TEXT NOT NULL UNIQUE,
             display_name TEXT,
             role TEXT NOT NULL,
             created_at INTEGER NOT NULL
         );

         CREATE TABLE IF NOT EXISTS sessions (
             session_id TEXT PRIMARY KEY,
             user_id TEXT NOT NULL,
             created_at INTEGER NOT NULL,
             expires_at INTEGER NOT NULL,
             last_accessed INTEGER NOT NULL,
             ip TEXT,
             agent TEXT
         );
         CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);

         CREATE TABLE IF NOT EXISTS system_audit_log (
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

         CREATE TABLE IF NOT EXISTS oauth_tokens (
             user_id TEXT PRIMARY KEY,
             encrypted_token TEXT NOT NULL,
             updated_at INTEGER NOT NULL
         );

         -- System-owned jobs (user_id IS NULL); same shape as the per-user
         -- `jobs` table so the jobs DAO can operate on either connection.
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

         -- Routes a job_id to its owning user (NULL = system job) without
         -- requiring every lookup to fan out across all per-user databases.
         CREATE TABLE IF NOT EXISTS job_index (
             job_id TEXT PRIMARY KEY,
             user_id TEXT
         );",
    )
    .map_err(|e| raise_error!(format!("system db migration failed: {e}"), ErrorCode::InternalError))?;
    Ok(())
}
