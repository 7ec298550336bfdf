use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::modules::error::AppResult;
use crate::modules::storage::dao;
use crate::modules::user::audit::AuditEntry;
use crate::modules::user::context::UserContext;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AccessDecision {
    Allow,
    Deny,
}

/// Validates that `ctx` may perform `operation` on `resource_type`/`resource_id`,
/// and always appends an audit entry - allowed or denied - to the system
/// audit log, per §4.L.
pub fn validate_access(
    system_pool: &Pool<SqliteConnectionManager>,
    ctx: &UserContext,
    resource_type: &str,
    resource_id: Option<&str>,
    operation: &str,
    owner_id: Option<&str>,
) -> AppResult<AccessDecision> {
    let mut decision = AccessDecision::Allow;
    let mut reason = "allowed";

    if let Some(owner) = owner_id {
        if owner != ctx.user_id {
            decision = AccessDecision::Deny;
            reason = "owner mismatch";
        }
    }
    if resource_type == "system_config" && !ctx.is_admin() {
        decision = AccessDecision::Deny;
        reason = "system_config requires admin role";
    }

    let entry = AuditEntry::new(
        Some(ctx.user_id.clone()),
        format!("access_check:{operation}"),
        resource_type.to_string(),
        resource_id.map(str::to_string),
        decision == AccessDecision::Allow,
    )
    .with_origin(ctx.ip.clone(), ctx.agent.clone());

    let conn = system_pool.get()?;
    dao::audit::insert_audit(&conn, "system_audit_log", &entry)?;

    tracing::debug!(operation, resource_type, reason, "access check");
    Ok(decision)
}
