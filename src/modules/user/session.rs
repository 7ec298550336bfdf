use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UserSession {
    pub session_id: String,
    pub user_id: String,
    pub created: i64,
    pub expires: i64,
    pub last_accessed: i64,
    pub ip: Option<String>,
    pub agent: Option<String>,
}

impl UserSession {
    pub fn is_valid(&self, now: i64) -> bool {
        now < self.expires
    }
}
