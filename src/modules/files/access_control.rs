use std::sync::Arc;

use crate::modules::error::{code::ErrorCode, AppResult};
use crate::modules::files::model::{FileAccessPermission, FileMetadata, FilePermissionGrant};
use crate::modules::settings::dir::DATA_DIR_MANAGER;
use crate::modules::storage::handle::UserStorageHandle;
use crate::modules::user::audit::AuditEntry;
use crate::modules::utils::sha256_hex;
use crate::raise_error;

/// Every exported file is written under `<archive_root>/user_<user_id>/...`;
/// the path prefix is computed here, never by the caller, so nothing
/// upstream can smuggle a path outside the user's own export directory.
pub struct FileAccessControlManager;

impl FileAccessControlManager {
    pub fn write_export(
        storage: &Arc<UserStorageHandle>,
        user_id: &str,
        filename: &str,
        contents: &[u8],
        file_type: &str,
        expires_at: Option<i64>,
    ) -> AppResult<FileMetadata> {
        let dir = DATA_DIR_MANAGER.user_archive_dir(user_id);
        std::fs::create_dir_all(&dir).map_err(|e| raise_error!(format!("create export dir failed: {e}"), ErrorCode::InternalError))?;
        let path = dir.join(filename);
        std::fs::write(&path, contents).map_err(|e| raise_error!(format!("write export file failed: {e}"), ErrorCode::InternalError))?;

        let now = crate::utc_now!();
        let metadata = FileMetadata {
            id: crate::new_id!(),
            user_id: user_id.to_string(),
            file_path: path.to_string_lossy().to_string(),
            original_filename: filename.to_string(),
            file_type: file_type.to_string(),
            size_bytes: contents.len() as i64,
            checksum_sha256: sha256_hex(contents),
            created_at: now,
            updated_at: now,
            expires_at,
        };
        let permissions = vec![
            FileAccessPermission { file_id: metadata.id.clone(), principal: user_id.to_string(), grant: FilePermissionGrant::Read },
            FileAccessPermission { file_id: metadata.id.clone(), principal: user_id.to_string(), grant: FilePermissionGrant::Delete },
        ];
        storage.insert_file(&metadata, &permissions)?;

        let audit = AuditEntry::new(Some(user_id.to_string()), "file_create", "archive", Some(metadata.id.clone()), true);
        storage.insert_audit(&audit)?;

        Ok(metadata)
    }

    /// Best-effort on the underlying file - a missing file is tolerated.
    /// The metadata row is not: failing to remove it is a real error.
    pub fn delete_file(storage: &Arc<UserStorageHandle>, user_id: &str, file_id: &str) -> AppResult<()> {
        let file = storage
            .get_file(file_id)?
            .ok_or_else(|| raise_error!(format!("file not found: {file_id}"), ErrorCode::ResourceNotFound))?;
        if file.user_id != user_id {
            return Err(raise_error!(format!("file not found: {file_id}"), ErrorCode::ResourceNotFound));
        }
        if let Err(e) = std::fs::remove_file(&file.file_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(file_id, "failed to remove export file: {e}");
            }
        }
        storage.delete_file(file_id)?;
        let audit = AuditEntry::new(Some(user_id.to_string()), "file_delete", "archive", Some(file_id.to_string()), true);
        storage.insert_audit(&audit)?;
        Ok(())
    }

    /// Sweeps every file whose `expires_at <= now`. Missing files on disk
    /// are tolerated; missing metadata rows are not, since the row is the
    /// source of truth for ownership.
    pub fn cleanup_expired_files(storage: &Arc<UserStorageHandle>, user_id: &str) -> AppResult<u32> {
        let now = crate::utc_now!();
        let expired = storage.list_expired_files(now)?;
        let mut removed = 0;
        for file in expired {
            if let Err(e) = std::fs::remove_file(&file.file_path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(file_id = %file.id, "failed to remove expired file: {e}");
                }
            }
            storage.delete_file(&file.id)?;
            let audit = AuditEntry::new(Some(user_id.to_string()), "file_expire", "archive", Some(file.id.clone()), true);
            storage.insert_audit(&audit)?;
            removed += 1;
        }
        Ok(removed)
    }
}
