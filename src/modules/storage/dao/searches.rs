use rusqlite::{params, Connection};

use crate::modules::error::{code::ErrorCode, AppResult};
use crate::modules::mail::message::SearchCriteria;
use crate::raise_error;

pub fn save_search(conn: &Connection, user_id: &str, name: &str, criteria: &SearchCriteria) -> AppResult<()> {
    conn.execute(
        "INSERT INTO saved_searches (name, user_id, criteria_json, created_at) VALUES (?1,?2,?3,?4)
         ON CONFLICT(user_id, name) DO UPDATE SET criteria_json=excluded.criteria_json",
        params![name, user_id, serde_json::to_string(criteria).unwrap_or_default(), crate::utc_now!()],
    )
    .map_err(|e| raise_error!(format!("save_search failed: {e}"), ErrorCode::InternalError))?;
    Ok(())
}

pub fn list_saved_searches(conn: &Connection, user_id: &str) -> AppResult<Vec<(String, SearchCriteria)>> {
    let mut stmt = conn
        .prepare("SELECT name, criteria_json FROM saved_searches WHERE user_id = ?1 ORDER BY created_at DESC")
        .map_err(|e| raise_error!(format!("list_saved_searches prepare failed: {e}"), ErrorCode::InternalError))?;
    let rows = stmt
        .query_map(params![user_id], |row| {
            let name: String = row.get(0)?;
            let criteria_json: String = row.get(1)?;
            Ok((name, criteria_json))
        })
        .map_err(|e| raise_error!(format!("list_saved_searches query failed: {e}"), ErrorCode::InternalError))?;
    let mut out = Vec::new();
    for row in rows {
        let (name, criteria_json) = row.map_err(|e| raise_error!(format!("row decode failed: {e}"), ErrorCode::InternalError))?;
        let criteria = serde_json::from_str(&criteria_json).unwrap_or_default();
        out.push((name, criteria));
    }
    Ok(out)
}
