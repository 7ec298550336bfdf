use std::io::Write;
use std::sync::Arc;

use chrono::TimeZone;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::modules::error::{code::ErrorCode, AppResult};
use crate::modules::files::access_control::FileAccessControlManager;
use crate::modules::files::model::FileMetadata;
use crate::modules::mail::message::MessageIndex;
use crate::modules::storage::handle::UserStorageHandle;
use crate::raise_error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Json,
    Mbox,
    Csv,
}

#[derive(Serialize)]
struct JsonExport<'a> {
    #[serde(rename = "exportDate")]
    export_date: String,
    #[serde(rename = "emailCount")]
    email_count: usize,
    emails: &'a [MessageIndex],
}

fn render_json(messages: &[MessageIndex]) -> Vec<u8> {
    let export_date = chrono::Utc::now().to_rfc3339();
    let payload = JsonExport { export_date, email_count: messages.len(), emails: messages };
    serde_json::to_vec_pretty(&payload).unwrap_or_default()
}

/// RFC 4155 stub: one entry per message, a `From ` separator line, and the
/// canonical headers available on the index - not a full MIME re-render.
fn render_mbox(messages: &[MessageIndex]) -> Vec<u8> {
    let mut buf = Vec::new();
    for msg in messages {
        let date = msg
            .date
            .and_then(|ts| chrono::Utc.timestamp_millis_opt(ts).single())
            .map(|dt| dt.to_rfc2822())
            .unwrap_or_else(|| "Thu Jan  1 00:00:00 1970".to_string());
        let _ = writeln!(buf, "From {} {}", msg.sender, date);
        let _ = writeln!(buf, "Subject: {}", msg.subject);
        let _ = writeln!(buf, "From: {}", msg.sender);
        let _ = writeln!(buf, "To: {}", msg.recipients.join(", "));
        let _ = writeln!(buf, "Date: {date}");
        let _ = writeln!(buf);
        let _ = writeln!(buf, "{}", msg.snippet);
        let _ = writeln!(buf);
    }
    buf
}

fn render_csv(messages: &[MessageIndex]) -> AppResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["id", "thread_id", "subject", "sender", "recipients", "date", "year", "size", "labels", "archived"])
        .map_err(|e| raise_error!(format!("csv header write failed: {e}"), ErrorCode::InternalError))?;
    for msg in messages {
        writer
            .write_record([
                msg.message_id.clone(),
                msg.thread_id.clone(),
                msg.subject.clone(),
                msg.sender.clone(),
                msg.recipients.join(";"),
                msg.date.map(|d| d.to_string()).unwrap_or_default(),
                msg.year.map(|y| y.to_string()).unwrap_or_default(),
                msg.size_bytes.to_string(),
                msg.labels.iter().cloned().collect::<Vec<_>>().join(";"),
                msg.archived.to_string(),
            ])
            .map_err(|e| raise_error!(format!("csv row write failed: {e}"), ErrorCode::InternalError))?;
    }
    writer
        .into_inner()
        .map_err(|e| raise_error!(format!("csv flush failed: {e}"), ErrorCode::InternalError))
}

pub fn export_messages(
    storage: &Arc<UserStorageHandle>,
    user_id: &str,
    messages: &[MessageIndex],
    format: ExportFormat,
    filename: &str,
) -> AppResult<FileMetadata> {
    let (contents, extension) = match format {
        ExportFormat::Json => (render_json(messages), "json"),
        ExportFormat::Mbox => (render_mbox(messages), "mbox"),
        ExportFormat::Csv => (render_csv(messages)?, "csv"),
    };
    let name = if filename.ends_with(&format!(".{extension}")) {
        filename.to_string()
    } else {
        format!("{filename}.{extension}")
    };
    FileAccessControlManager::write_export(storage, user_id, &name, &contents, "email_export", None)
}
