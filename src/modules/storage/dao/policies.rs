use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::modules::cleanup::policy::CleanupPolicy;
use crate::modules::error::{code::ErrorCode, AppResult};
use crate::raise_error;

fn row_to_policy(row: &Row) -> rusqlite::Result<CleanupPolicy> {
    let criteria_json: String = row.get("criteria_json")?;
    let action_json: String = row.get("action_json")?;
    let safety_json: String = row.get("safety_json")?;
    let schedule_json: Option<String> = row.get("schedule_json")?;
    Ok(CleanupPolicy {
        id: row.get("id")?,
        name: row.get("name")?,
        enabled: row.get::<_, i64>("enabled")? != 0,
        priority: row.get::<_, i64>("priority")? as u8,
        criteria: serde_json::from_str(&criteria_json).unwrap_or_default(),
        action: serde_json::from_str(&action_json).expect("action_json always valid"),
        safety: serde_json::from_str(&safety_json).unwrap_or_default(),
        schedule: schedule_json.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: row.get("created_at")?,
    })
}

pub fn insert_policy(conn: &Connection, user_id: &str, policy: &CleanupPolicy) -> AppResult<()> {
    conn.execute(
        "INSERT INTO cleanup_policies (id, user_id, name, enabled, priority, criteria_json, action_json, safety_json, schedule_json, created_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
        params![
            policy.id,
            user_id,
            policy.name,
            policy.enabled as i64,
            policy.priority as i64,
            serde_json::to_string(&policy.criteria).unwrap_or_default(),
            serde_json::to_string(&policy.action).unwrap_or_default(),
            serde_json::to_string(&policy.safety).unwrap_or_default(),
            policy.schedule.as_ref().map(|s| serde_json::to_string(s).unwrap_or_default()),
            policy.created_at,
        ],
    )
    .map_err(|e| raise_error!(format!("insert_policy failed: {e}"), ErrorCode::InternalError))?;
    Ok(())
}

pub fn update_policy(conn: &Connection, user_id: &str, policy: &CleanupPolicy) -> AppResult<()> {
    let affected = conn
        .execute(
            "UPDATE cleanup_policies SET name=?3, enabled=?4, priority=?5, criteria_json=?6, action_json=?7, safety_json=?8, schedule_json=?9
             WHERE id=?1 AND user_id=?2",
            params![
                policy.id,
                user_id,
                policy.name,
                policy.enabled as i64,
                policy.priority as i64,
                serde_json::to_string(&policy.criteria).unwrap_or_default(),
                serde_json::to_string(&policy.action).unwrap_or_default(),
                serde_json::to_string(&policy.safety).unwrap_or_default(),
                policy.schedule.as_ref().map(|s| serde_json::to_string(s).unwrap_or_default()),
            ],
        )
        .map_err(|e| raise_error!(format!("update_policy failed: {e}"), ErrorCode::InternalError))?;
    if affected == 0 {
        return Err(raise_error!(format!("policy not found: {}", policy.id), ErrorCode::ResourceNotFound));
    }
    Ok(())
}

pub fn get_policy(conn: &Connection, user_id: &str, policy_id: &str) -> AppResult<Option<CleanupPolicy>> {
    conn.query_row(
        "SELECT * FROM cleanup_policies WHERE id = ?1 AND user_id = ?2",
        params![policy_id, user_id],
        row_to_policy,
    )
    .optional()
    .map_err(|e| raise_error!(format!("get_policy failed: {e}"), ErrorCode::InternalError))
}

/// Ordered by priority descending, then creation time ascending - matching
/// `policy_order_key` so callers never need to re-sort.
pub fn list_policies(conn: &Connection, user_id: &str) -> AppResult<Vec<CleanupPolicy>> {
    let mut stmt = conn
        .prepare("SELECT * FROM cleanup_policies WHERE user_id = ?1 ORDER BY priority DESC, created_at ASC")
        .map_err(|e| raise_error!(format!("list_policies prepare failed: {e}"), ErrorCode::InternalError))?;
    let rows = stmt
        .query_map(params![user_id], row_to_policy)
        .map_err(|e| raise_error!(format!("list_policies query failed: {e}"), ErrorCode::InternalError))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| raise_error!(format!("row decode failed: {e}"), ErrorCode::InternalError))?);
    }
    Ok(out)
}

pub fn delete_policy(conn: &Connection, user_id: &str, policy_id: &str) -> AppResult<()> {
    let affected = conn
        .execute(
            "DELETE FROM cleanup_policies WHERE id = ?1 AND user_id = ?2",
            params![policy_id, user_id],
        )
        .map_err(|e| raise_error!(format!("delete_policy failed: {e}"), ErrorCode::InternalError))?;
    if affected == 0 {
        return Err(raise_error!(format!("policy not found: {policy_id}"), ErrorCode::ResourceNotFound));
    }
    Ok(())
}
