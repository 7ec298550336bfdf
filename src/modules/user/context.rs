use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::modules::user::entity::Role;

/// Carried on every operation; the unit of isolation. Constructed once per
/// request by the MCP handler layer after session validation, never
/// reconstructed ad hoc deeper in the stack.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UserContext {
    pub user_id: String,
    pub session_id: String,
    pub roles: Vec<Role>,
    pub permissions: Vec<String>,
    pub ip: Option<String>,
    pub agent: Option<String>,
}

impl UserContext {
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| matches!(r, Role::Admin))
    }
}
