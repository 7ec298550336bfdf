use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::modules::cleanup::policy::{CleanupAction, CleanupSchedule};
use crate::modules::mail::message::SearchCriteria;

/// A standing selector + action a user can apply on demand or on a
/// schedule, distinct from a `CleanupPolicy` in that it carries no safety
/// overrides of its own - it runs through the same checklist as everything
/// else.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ArchiveRule {
    pub id: String,
    pub selector: SearchCriteria,
    pub action: CleanupAction,
    pub schedule: Option<CleanupSchedule>,
    pub created_at: i64,
}

/// A concrete invocation of an archive or delete action: what happened,
/// not what might happen.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ArchiveRecord {
    pub id: String,
    pub rule_id: Option<String>,
    pub message_ids: Vec<String>,
    pub method: String,
    pub location: Option<String>,
    pub size_bytes: i64,
    pub restorable: bool,
    pub created_at: i64,
}
