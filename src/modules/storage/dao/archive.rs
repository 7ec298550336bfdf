use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::modules::cleanup::rules::{ArchiveRecord, ArchiveRule};
use crate::modules::error::{code::ErrorCode, AppResult};
use crate::raise_error;

fn row_to_record(row: &Row) -> rusqlite::Result<ArchiveRecord> {
    let message_ids_json: String = row.get("message_ids_json")?;
    Ok(ArchiveRecord {
        id: row.get("id")?,
        rule_id: row.get("rule_id")?,
        message_ids: serde_json::from_str(&message_ids_json).unwrap_or_default(),
        method: row.get("method")?,
        location: row.get("location")?,
        size_bytes: row.get("size_bytes")?,
        restorable: row.get::<_, i64>("restorable")? != 0,
        created_at: row.get("created_at")?,
    })
}

pub fn insert_record(conn: &Connection, user_id: &str, record: &ArchiveRecord) -> AppResult<()> {
    conn.execute(
        "INSERT INTO archive_records (id, user_id, rule_id, message_ids_json, method, location, size_bytes, restorable, created_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
        params![
            record.id,
            user_id,
            record.rule_id,
            serde_json::to_string(&record.message_ids).unwrap_or_default(),
            record.method,
            record.location,
            record.size_bytes,
            record.restorable as i64,
            record.created_at,
        ],
    )
    .map_err(|e| raise_error!(format!("insert_record failed: {e}"), ErrorCode::InternalError))?;
    Ok(())
}

pub fn list_records(conn: &Connection, user_id: &str, limit: u32) -> AppResult<Vec<ArchiveRecord>> {
    let mut stmt = conn
        .prepare("SELECT * FROM archive_records WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2")
        .map_err(|e| raise_error!(format!("list_records prepare failed: {e}"), ErrorCode::InternalError))?;
    let rows = stmt
        .query_map(params![user_id, limit], row_to_record)
        .map_err(|e| raise_error!(format!("list_records query failed: {e}"), ErrorCode::InternalError))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| raise_error!(format!("row decode failed: {e}"), ErrorCode::InternalError))?);
    }
    Ok(out)
}

/// Sums the sizes of `message_ids_json` arrays across delete-method
/// archive records created at or after `since`, i.e. how many messages
/// this user has had deleted in the trailing window. Counted in Rust
/// rather than via `json_array_length` so the query doesn't depend on
/// SQLite's JSON1 extension being compiled in.
pub fn count_deletions_since(conn: &Connection, user_id: &str, since: i64) -> AppResult<u32> {
    let mut stmt = conn
        .prepare("SELECT message_ids_json FROM archive_records WHERE user_id = ?1 AND method = 'delete' AND created_at >= ?2")
        .map_err(|e| raise_error!(format!("count_deletions_since prepare failed: {e}"), ErrorCode::InternalError))?;
    let rows = stmt
        .query_map(params![user_id, since], |row| row.get::<_, String>(0))
        .map_err(|e| raise_error!(format!("count_deletions_since query failed: {e}"), ErrorCode::InternalError))?;
    let mut total = 0u32;
    for row in rows {
        let json = row.map_err(|e| raise_error!(format!("row decode failed: {e}"), ErrorCode::InternalError))?;
        let ids: Vec<String> = serde_json::from_str(&json).unwrap_or_default();
        total += ids.len() as u32;
    }
    Ok(total)
}

fn row_to_rule(row: &Row) -> rusqlite::Result<ArchiveRule> {
    let selector_json: String = row.get("selector_json")?;
    let action_json: String = row.get("action_json")?;
    let schedule_json: Option<String> = row.get("schedule_json")?;
    Ok(ArchiveRule {
        id: row.get("id")?,
        selector: serde_json::from_str(&selector_json).unwrap_or_default(),
        action: serde_json::from_str(&action_json).expect("action_json always valid"),
        schedule: schedule_json.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: row.get("created_at")?,
    })
}

pub fn insert_rule(conn: &Connection, user_id: &str, rule: &ArchiveRule) -> AppResult<()> {
    conn.execute(
        "INSERT INTO archive_rules (id, user_id, selector_json, action_json, schedule_json, created_at) VALUES (?1,?2,?3,?4,?5,?6)",
        params![
            rule.id,
            user_id,
            serde_json::to_string(&rule.selector).unwrap_or_default(),
            serde_json::to_string(&rule.action).unwrap_or_default(),
            rule.schedule.as_ref().map(|s| serde_json::to_string(s).unwrap_or_default()),
            rule.created_at,
        ],
    )
    .map_err(|e| raise_error!(format!("insert_rule failed: {e}"), ErrorCode::InternalError))?;
    Ok(())
}

pub fn list_rules(conn: &Connection, user_id: &str) -> AppResult<Vec<ArchiveRule>> {
    let mut stmt = conn
        .prepare("SELECT * FROM archive_rules WHERE user_id = ?1 ORDER BY created_at DESC")
        .map_err(|e| raise_error!(format!("list_rules prepare failed: {e}"), ErrorCode::InternalError))?;
    let rows = stmt
        .query_map(params![user_id], row_to_rule)
        .map_err(|e| raise_error!(format!("list_rules query failed: {e}"), ErrorCode::InternalError))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| raise_error!(format!("row decode failed: {e}"), ErrorCode::InternalError))?);
    }
    Ok(out)
}

pub fn get_rule(conn: &Connection, user_id: &str, rule_id: &str) -> AppResult<Option<ArchiveRule>> {
    conn.query_row("SELECT * FROM archive_rules WHERE id = ?1 AND user_id = ?2", params![rule_id, user_id], row_to_rule)
        .optional()
        .map_err(|e| raise_error!(format!("get_rule failed: {e}"), ErrorCode::InternalError))
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

    fn delete_record(id: &str, message_ids: Vec<String>, created_at: i64) -> ArchiveRecord {
        ArchiveRecord { id: id.into(), rule_id: None, message_ids, method: "delete".into(), location: None, size_bytes: 0, restorable: false, created_at }
    }

    #[test]
    fn counts_only_deletes_in_window_for_this_user() {
        let (_file, conn) = fixture_conn();
        insert_record(&conn, "u1", &delete_record("r1", vec!["m1".into(), "m2".into()], 1_000)).unwrap();
        insert_record(&conn, "u1", &delete_record("r2", vec!["m3".into()], 500_000)).unwrap();
        insert_record(&conn, "u2", &delete_record("r3", vec!["m4".into()], 1_000)).unwrap();
        insert_record(
            &conn,
            "u1",
            &ArchiveRecord { id: "r4".into(), rule_id: None, message_ids: vec!["m5".into()], method: "provider".into(), location: None, size_bytes: 0, restorable: true, created_at: 1_000 },
        )
        .unwrap();

        assert_eq!(count_deletions_since(&conn, "u1", 0).unwrap(), 3);
        assert_eq!(count_deletions_since(&conn, "u1", 600_000).unwrap(), 0);
        assert_eq!(count_deletions_since(&conn, "u2", 0).unwrap(), 1);
    }
}
