use std::sync::Arc;

use rmcp::model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo};
use rmcp::transport::stdio;
use rmcp::{tool, ServerHandler, ServiceExt};

use crate::modules::context::app::AppContext;
use crate::modules::error::{code::ErrorCode, AppResult};
use crate::modules::mcp::tools::GmailCuratorServer;
use crate::raise_error;

#[tool(tool_box)]
impl ServerHandler for GmailCuratorServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "inbox-curator".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(
                "Gmail categorization, cleanup, and archiving over per-user isolated storage. \
                 Call authenticate first to obtain a session_id; every other tool requires it."
                    .to_string(),
            ),
        }
    }
}

/// Serves the tool surface over stdio, the transport the MCP client spawns
/// this process with. Runs until the client closes the connection.
pub async fn serve(ctx: Arc<AppContext>) -> AppResult<()> {
    let server = GmailCuratorServer::new(ctx);
    let running = server
        .serve(stdio())
        .await
        .map_err(|e| raise_error!(format!("mcp server failed to start: {e}"), ErrorCode::InternalError))?;
    running
        .waiting()
        .await
        .map_err(|e| raise_error!(format!("mcp server exited with error: {e}"), ErrorCode::InternalError))?;
    Ok(())
}
