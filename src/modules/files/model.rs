use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FileMetadata {
    pub id: String,
    pub user_id: String,
    pub file_path: String,
    pub original_filename: String,
    pub file_type: String,
    pub size_bytes: i64,
    pub checksum_sha256: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FilePermissionGrant {
    Read,
    Delete,
}

impl FilePermissionGrant {
    pub fn as_str(self) -> &'static str {
        match self {
            FilePermissionGrant::Read => "read",
            FilePermissionGrant::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FileAccessPermission {
    pub file_id: String,
    pub principal: String,
    pub grant: FilePermissionGrant,
}
