use rusqlite::{params, Connection};

use crate::modules::error::{code::ErrorCode, AppResult};
use crate::modules::user::audit::AuditEntry;
use crate::raise_error;

pub fn insert_audit(conn: &Connection, table: &str, entry: &AuditEntry) -> AppResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO {table} (id, user_id, action, resource_type, resource_id, success, ip, agent, created_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)"
        ),
        params![
            entry.id,
            entry.user_id,
            entry.action,
            entry.resource_type,
            entry.resource_id,
            entry.success as i64,
            entry.ip,
            entry.agent,
            entry.created_at,
        ],
    )
    .map_err(|e| raise_error!(format!("insert_audit failed: {e}"), ErrorCode::InternalError))?;
    Ok(())
}
