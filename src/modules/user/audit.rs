use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AuditEntry {
    pub id: String,
    /// `None` represents the `system` principal.
    pub user_id: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub success: bool,
    pub ip: Option<String>,
    pub agent: Option<String>,
    pub created_at: i64,
}

impl AuditEntry {
    pub fn new(
        user_id: Option<String>,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: Option<String>,
        success: bool,
    ) -> Self {
        Self {
            id: crate::new_id!(),
            user_id,
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id,
            success,
            ip: None,
            agent: None,
            created_at: crate::utc_now!(),
        }
    }

    pub fn with_origin(mut self, ip: Option<String>, agent: Option<String>) -> Self {
        self.ip = ip;
        self.agent = agent;
        self
    }
}
