use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::modules::error::{code::ErrorCode, AppResult};
use crate::modules::files::model::{FileAccessPermission, FileMetadata, FilePermissionGrant};
use crate::raise_error;

fn row_to_file(row: &Row) -> rusqlite::Result<FileMetadata> {
    Ok(FileMetadata {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        file_path: row.get("file_path")?,
        original_filename: row.get("original_filename")?,
        file_type: row.get("file_type")?,
        size_bytes: row.get("size_bytes")?,
        checksum_sha256: row.get("checksum_sha256")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        expires_at: row.get("expires_at")?,
    })
}

pub fn insert_file(conn: &Connection, file: &FileMetadata, permissions: &[FileAccessPermission]) -> AppResult<()> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| raise_error!(format!("begin tx failed: {e}"), ErrorCode::InternalError))?;
    tx.execute(
        "INSERT INTO file_metadata (id, user_id, file_path, original_filename, file_type, size_bytes, checksum_sha256, created_at, updated_at, expires_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
        params![
            file.id,
            file.user_id,
            file.file_path,
            file.original_filename,
            file.file_type,
            file.size_bytes,
            file.checksum_sha256,
            file.created_at,
            file.updated_at,
            file.expires_at,
        ],
    )
    .map_err(|e| raise_error!(format!("insert_file failed: {e}"), ErrorCode::InternalError))?;

    for permission in permissions {
        tx.execute(
            "INSERT OR IGNORE INTO file_access_permissions (file_id, principal, grant) VALUES (?1,?2,?3)",
            params![permission.file_id, permission.principal, permission.grant.as_str()],
        )
        .map_err(|e| raise_error!(format!("insert_file_permission failed: {e}"), ErrorCode::InternalError))?;
    }

    tx.commit()
        .map_err(|e| raise_error!(format!("commit failed: {e}"), ErrorCode::InternalError))?;
    Ok(())
}

pub fn get_file(conn: &Connection, user_id: &str, file_id: &str) -> AppResult<Option<FileMetadata>> {
    conn.query_row(
        "SELECT * FROM file_metadata WHERE id = ?1 AND user_id = ?2",
        params![file_id, user_id],
        row_to_file,
    )
    .optional()
    .map_err(|e| raise_error!(format!("get_file failed: {e}"), ErrorCode::InternalError))
}

pub fn list_permissions(conn: &Connection, file_id: &str) -> AppResult<Vec<FileAccessPermission>> {
    let mut stmt = conn
        .prepare("SELECT file_id, principal, grant FROM file_access_permissions WHERE file_id = ?1")
        .map_err(|e| raise_error!(format!("list_permissions prepare failed: {e}"), ErrorCode::InternalError))?;
    let rows = stmt
        .query_map(params![file_id], |row| {
            let grant: String = row.get(2)?;
            Ok(FileAccessPermission {
                file_id: row.get(0)?,
                principal: row.get(1)?,
                grant: if grant == "delete" { FilePermissionGrant::Delete } else { FilePermissionGrant::Read },
            })
        })
        .map_err(|e| raise_error!(format!("list_permissions query failed: {e}"), ErrorCode::InternalError))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| raise_error!(format!("row decode failed: {e}"), ErrorCode::InternalError))?);
    }
    Ok(out)
}

/// Expired rows are selected first so the caller can remove the on-disk
/// files before the metadata rows disappear; best-effort on the file,
/// strict on the row (§4.L).
pub fn list_expired(conn: &Connection, now: i64) -> AppResult<Vec<FileMetadata>> {
    let mut stmt = conn
        .prepare("SELECT * FROM file_metadata WHERE expires_at IS NOT NULL AND expires_at <= ?1")
        .map_err(|e| raise_error!(format!("list_expired prepare failed: {e}"), ErrorCode::InternalError))?;
    let rows = stmt
        .query_map(params![now], row_to_file)
        .map_err(|e| raise_error!(format!("list_expired query failed: {e}"), ErrorCode::InternalError))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| raise_error!(format!("row decode failed: {e}"), ErrorCode::InternalError))?);
    }
    Ok(out)
}

pub fn delete_file(conn: &Connection, file_id: &str) -> AppResult<()> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| raise_error!(format!("begin tx failed: {e}"), ErrorCode::InternalError))?;
    tx.execute("DELETE FROM file_access_permissions WHERE file_id = ?1", params![file_id])
        .map_err(|e| raise_error!(format!("delete permissions failed: {e}"), ErrorCode::InternalError))?;
    tx.execute("DELETE FROM file_metadata WHERE id = ?1", params![file_id])
        .map_err(|e| raise_error!(format!("delete file row failed: {e}"), ErrorCode::InternalError))?;
    tx.commit()
        .map_err(|e| raise_error!(format!("commit failed: {e}"), ErrorCode::InternalError))?;
    Ok(())
}
