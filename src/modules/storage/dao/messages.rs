use std::collections::BTreeSet;

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::modules::cleanup::policy::CleanupPolicy;
use crate::modules::error::{code::ErrorCode, AppResult};
use crate::modules::mail::access::AccessSummary;
use crate::modules::mail::message::{MessageIndex, SearchCriteria};
use crate::raise_error;

fn row_to_message(row: &Row) -> rusqlite::Result<MessageIndex> {
    let recipients: String = row.get("recipients")?;
    let labels: String = row.get("labels")?;
    let importance_json: Option<String> = row.get("importance_json")?;
    let date_size_json: Option<String> = row.get("date_size_json")?;
    let label_classifier_json: Option<String> = row.get("label_classifier_json")?;
    let analysis_version: i64 = row.get("analysis_version")?;

    Ok(MessageIndex {
        message_id: row.get("message_id")?,
        thread_id: row.get("thread_id")?,
        subject: row.get("subject")?,
        sender: row.get("sender")?,
        recipients: serde_json::from_str(&recipients).unwrap_or_default(),
        date: row.get("date")?,
        year: row.get("year")?,
        size_bytes: row.get("size_bytes")?,
        has_attachments: row.get::<_, i64>("has_attachments")? != 0,
        labels: serde_json::from_str::<BTreeSet<String>>(&labels).unwrap_or_default(),
        snippet: row.get("snippet")?,
        archived: row.get::<_, i64>("archived")? != 0,
        archive_date: row.get("archive_date")?,
        archive_location: row.get("archive_location")?,
        importance: importance_json.and_then(|s| serde_json::from_str(&s).ok()),
        date_size: date_size_json.and_then(|s| serde_json::from_str(&s).ok()),
        label_classifier: label_classifier_json.and_then(|s| serde_json::from_str(&s).ok()),
        analysis_version: if analysis_version > 0 { Some(analysis_version as u32) } else { None },
        analysis_timestamp: row.get("analysis_timestamp")?,
    })
}

/// Upserts by `(user_id, message_id)`. Analyzer fields are preserved when
/// the caller's `msg` has them unset - ingestion never clobbers an
/// already-computed analysis.
pub fn upsert_message(conn: &Connection, user_id: &str, msg: &MessageIndex) -> AppResult<()> {
    let existing = get_message(conn, user_id, &msg.message_id)?;

    let importance_json = msg
        .importance
        .as_ref()
        .or(existing.as_ref().and_then(|e| e.importance.as_ref()))
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| raise_error!(format!("serialize importance: {e}"), ErrorCode::InternalError))?;
    let date_size_json = msg
        .date_size
        .as_ref()
        .or(existing.as_ref().and_then(|e| e.date_size.as_ref()))
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| raise_error!(format!("serialize date_size: {e}"), ErrorCode::InternalError))?;
    let label_classifier_json = msg
        .label_classifier
        .as_ref()
        .or(existing.as_ref().and_then(|e| e.label_classifier.as_ref()))
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| raise_error!(format!("serialize label_classifier: {e}"), ErrorCode::InternalError))?;
    let analysis_version = msg
        .analysis_version
        .or(existing.as_ref().and_then(|e| e.analysis_version))
        .unwrap_or(0);
    let analysis_timestamp = msg
        .analysis_timestamp
        .or(existing.as_ref().and_then(|e| e.analysis_timestamp));

    conn.execute(
        "INSERT INTO messages (
            user_id, message_id, thread_id, subject, sender, recipients, date, year,
            size_bytes, has_attachments, labels, snippet, archived, archive_date,
            archive_location, importance_json, date_size_json, label_classifier_json,
            analysis_version, analysis_timestamp
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20)
        ON CONFLICT(user_id, message_id) DO UPDATE SET
            thread_id=excluded.thread_id, subject=excluded.subject, sender=excluded.sender,
            recipients=excluded.recipients, date=excluded.date, year=excluded.year,
            size_bytes=excluded.size_bytes, has_attachments=excluded.has_attachments,
            labels=excluded.labels, snippet=excluded.snippet, archived=excluded.archived,
            archive_date=excluded.archive_date, archive_location=excluded.archive_location,
            importance_json=excluded.importance_json, date_size_json=excluded.date_size_json,
            label_classifier_json=excluded.label_classifier_json,
            analysis_version=excluded.analysis_version, analysis_timestamp=excluded.analysis_timestamp",
        params![
            user_id,
            msg.message_id,
            msg.thread_id,
            msg.subject,
            msg.sender,
            serde_json::to_string(&msg.recipients).unwrap_or_default(),
            msg.date,
            msg.year,
            msg.size_bytes,
            msg.has_attachments as i64,
            serde_json::to_string(&msg.labels).unwrap_or_default(),
            msg.snippet,
            msg.archived as i64,
            msg.archive_date,
            msg.archive_location,
            importance_json,
            date_size_json,
            label_classifier_json,
            analysis_version as i64,
            analysis_timestamp,
        ],
    )
    .map_err(|e| raise_error!(format!("upsert_message failed: {e}"), ErrorCode::InternalError))?;
    Ok(())
}

pub fn get_message(conn: &Connection, user_id: &str, message_id: &str) -> AppResult<Option<MessageIndex>> {
    conn.query_row(
        "SELECT * FROM messages WHERE user_id = ?1 AND message_id = ?2",
        params![user_id, message_id],
        row_to_message,
    )
    .optional()
    .map_err(|e| raise_error!(format!("get_message failed: {e}"), ErrorCode::InternalError))
}

/// Builds the conjunctive WHERE clause shared by search and cleanup
/// prefiltering; both route through here so the two never drift apart.
fn build_filter(criteria: &SearchCriteria, user_id: &str) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
    let mut clauses = vec!["user_id = ?".to_string()];
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id.to_string())];

    if let Some(q) = &criteria.query {
        clauses.push("(subject LIKE ? OR sender LIKE ? OR snippet LIKE ?)".into());
        let pattern = format!("%{q}%");
        args.push(Box::new(pattern.clone()));
        args.push(Box::new(pattern.clone()));
        args.push(Box::new(pattern));
    }
    if let Some(year) = criteria.year {
        clauses.push("year = ?".into());
        args.push(Box::new(year));
    }
    if let Some(min) = criteria.year_min {
        clauses.push("year >= ?".into());
        args.push(Box::new(min));
    }
    if let Some(max) = criteria.year_max {
        clauses.push("year <= ?".into());
        args.push(Box::new(max));
    }
    if let Some(min) = criteria.size_min {
        clauses.push("size_bytes >= ?".into());
        args.push(Box::new(min));
    }
    if let Some(max) = criteria.size_max {
        clauses.push("size_bytes <= ?".into());
        args.push(Box::new(max));
    }
    if let Some(sender) = &criteria.sender {
        clauses.push("sender = ?".into());
        args.push(Box::new(sender.clone()));
    }
    if let Some(has_attachments) = criteria.has_attachments {
        clauses.push("has_attachments = ?".into());
        args.push(Box::new(has_attachments as i64));
    }
    if let Some(archived) = criteria.archived {
        clauses.push("archived = ?".into());
        args.push(Box::new(archived as i64));
    }
    if !criteria.labels_any_of.is_empty() {
        let mut label_clauses = Vec::new();
        for label in &criteria.labels_any_of {
            label_clauses.push("labels LIKE ?".to_string());
            args.push(Box::new(format!("%\"{label}\"%")));
        }
        clauses.push(format!("({})", label_clauses.join(" OR ")));
    }
    if !criteria.ids_any_of.is_empty() {
        let placeholders = criteria.ids_any_of.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        clauses.push(format!("message_id IN ({placeholders})"));
        for id in &criteria.ids_any_of {
            args.push(Box::new(id.clone()));
        }
    }

    (clauses.join(" AND "), args)
}

/// Ordered by `date` descending unless the caller's criteria says otherwise
/// (the contract only specifies the default; no override field exists yet).
pub fn search_messages(conn: &Connection, user_id: &str, criteria: &SearchCriteria) -> AppResult<Vec<MessageIndex>> {
    let (where_clause, args) = build_filter(criteria, user_id);
    let limit = criteria.limit.unwrap_or(50).min(1000);
    let offset = criteria.offset.unwrap_or(0);

    let sql = format!(
        "SELECT * FROM messages WHERE {where_clause} ORDER BY date DESC LIMIT {limit} OFFSET {offset}"
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| raise_error!(format!("search_messages prepare failed: {e}"), ErrorCode::InternalError))?;
    let refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
    let rows = stmt
        .query_map(refs.as_slice(), row_to_message)
        .map_err(|e| raise_error!(format!("search_messages query failed: {e}"), ErrorCode::InternalError))?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row.map_err(|e| raise_error!(format!("row decode failed: {e}"), ErrorCode::InternalError))?);
    }
    Ok(results)
}

/// Storage-level prefilter for a policy's criteria. This narrows candidates
/// for efficiency only - it MUST NOT be treated as a substitute for the
/// safety checklist, which still runs on every row returned here.
pub fn get_messages_for_cleanup(conn: &Connection, user_id: &str, policy: &CleanupPolicy, limit: u32) -> AppResult<Vec<MessageIndex>> {
    let mut criteria = SearchCriteria {
        archived: Some(false),
        limit: Some(limit),
        ..Default::default()
    };
    if let Some(size_min) = policy.criteria.size_threshold_min {
        criteria.size_min = Some(size_min as i64);
    }
    search_messages(conn, user_id, &criteria)
}

/// Total row count and the count received in the last 24h, used by
/// `AutomationEngine`'s volume trigger and storage-usage estimate.
pub fn message_counts(conn: &Connection, user_id: &str) -> AppResult<(i64, i64)> {
    let total: i64 = conn
        .query_row("SELECT COUNT(*) FROM messages WHERE user_id = ?1", params![user_id], |row| row.get(0))
        .map_err(|e| raise_error!(format!("message_counts total failed: {e}"), ErrorCode::InternalError))?;
    let cutoff = crate::utc_now!() - 86_400_000;
    let recent: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM messages WHERE user_id = ?1 AND date >= ?2",
            params![user_id, cutoff],
            |row| row.get(0),
        )
        .map_err(|e| raise_error!(format!("message_counts recent failed: {e}"), ErrorCode::InternalError))?;
    Ok((total, recent))
}

pub fn delete_message(conn: &Connection, user_id: &str, message_id: &str) -> AppResult<()> {
    conn.execute(
        "DELETE FROM messages WHERE user_id = ?1 AND message_id = ?2",
        params![user_id, message_id],
    )
    .map_err(|e| raise_error!(format!("delete_message failed: {e}"), ErrorCode::InternalError))?;
    Ok(())
}

pub fn get_access_summary(conn: &Connection, user_id: &str, message_id: &str) -> AppResult<AccessSummary> {
    conn.query_row(
        "SELECT message_id, total_accesses, last_accessed, search_appearances, search_interactions, access_score
         FROM access_summaries WHERE user_id = ?1 AND message_id = ?2",
        params![user_id, message_id],
        |row| {
            Ok(AccessSummary {
                message_id: row.get(0)?,
                total_accesses: row.get::<_, i64>(1)? as u64,
                last_accessed: row.get(2)?,
                search_appearances: row.get::<_, i64>(3)? as u64,
                search_interactions: row.get::<_, i64>(4)? as u64,
                access_score: row.get(5)?,
            })
        },
    )
    .optional()
    .map_err(|e| raise_error!(format!("get_access_summary failed: {e}"), ErrorCode::InternalError))?
    .map(Ok)
    .unwrap_or_else(|| Ok(AccessSummary::empty(message_id)))
}

pub fn put_access_summary(conn: &Connection, user_id: &str, summary: &AccessSummary) -> AppResult<()> {
    conn.execute(
        "INSERT INTO access_summaries (
            user_id, message_id, total_accesses, last_accessed, search_appearances,
            search_interactions, access_score
        ) VALUES (?1,?2,?3,?4,?5,?6,?7)
        ON CONFLICT(user_id, message_id) DO UPDATE SET
            total_accesses=excluded.total_accesses, last_accessed=excluded.last_accessed,
            search_appearances=excluded.search_appearances,
            search_interactions=excluded.search_interactions, access_score=excluded.access_score",
        params![
            user_id,
            summary.message_id,
            summary.total_accesses as i64,
            summary.last_accessed,
            summary.search_appearances as i64,
            summary.search_interactions as i64,
            summary.access_score,
        ],
    )
    .map_err(|e| raise_error!(format!("put_access_summary failed: {e}"), ErrorCode::InternalError))?;
    Ok(())
}
