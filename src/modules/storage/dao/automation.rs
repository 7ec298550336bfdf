use rusqlite::{params, Connection, OptionalExtension};

use crate::modules::error::{code::ErrorCode, AppResult};
use crate::raise_error;

/// Per-user key/value state for the automation engine: per-policy
/// "last fired" instants and the continuous-loop token bucket, keyed by an
/// opaque string so new state kinds don't need a migration.
pub fn get_state(conn: &Connection, key: &str) -> AppResult<Option<serde_json::Value>> {
    conn.query_row("SELECT value_json FROM automation_state WHERE key = ?1", params![key], |row| row.get::<_, String>(0))
        .optional()
        .map_err(|e| raise_error!(format!("automation_state read failed: {e}"), ErrorCode::InternalError))
        .map(|opt| opt.and_then(|s| serde_json::from_str(&s).ok()))
}

pub fn put_state(conn: &Connection, key: &str, value: &serde_json::Value) -> AppResult<()> {
    let now = crate::utc_now!();
    conn.execute(
        "INSERT INTO automation_state (key, value_json, updated_at) VALUES (?1,?2,?3)
         ON CONFLICT(key) DO UPDATE SET value_json=excluded.value_json, updated_at=excluded.updated_at",
        params![key, serde_json::to_string(value).unwrap_or_default(), now],
    )
    .map_err(|e| raise_error!(format!("automation_state write failed: {e}"), ErrorCode::InternalError))?;
    Ok(())
}
