use crate::modules::error::{code::ErrorCode, AppError};
use crate::modules::utils::generate_id;
use serde::Serialize;

/// Shape returned to MCP tool callers. `reason` is stable across releases;
/// `request_id` is opaque and only useful for correlating with server logs.
#[derive(Debug, Clone, Serialize)]
pub struct McpError {
    pub reason: &'static str,
    pub message: String,
    pub request_id: String,
}

impl From<AppError> for McpError {
    fn from(error: AppError) -> Self {
        let request_id = generate_id();
        match error.code() {
            ErrorCode::InternalError | ErrorCode::ConnectionPoolTimeout => {
                tracing::error!(request_id, code = ?error.code(), "internal error: {}", error.message());
            }
            ErrorCode::Unauthenticated | ErrorCode::SessionExpired | ErrorCode::PermissionDenied => {
                tracing::warn!(request_id, code = ?error.code(), "auth error: {}", error.message());
            }
            _ => {
                tracing::debug!(request_id, code = ?error.code(), "{}", error.message());
            }
        }
        McpError {
            reason: error.code().reason(),
            message: error.message().to_string(),
            request_id,
        }
    }
}
