use std::sync::Arc;

use rmcp::model::{CallToolResult, Content};
use rmcp::{tool, Error as RmcpError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::modules::categorization::engine::DEFAULT_BATCH_SIZE;
use crate::modules::cleanup::evaluate::evaluate_emails_for_cleanup;
use crate::modules::cleanup::executor::CleanupExecutor;
use crate::modules::cleanup::policy::{CleanupAction, CleanupCriteria, CleanupPolicy, CleanupSchedule, ScheduleFrequency, SafetyOverrides};
use crate::modules::cleanup::rules::ArchiveRule;
use crate::modules::cleanup::safety::{SafetyConfig, SafetyMetrics};
use crate::modules::context::app::AppContext;
use crate::modules::error::handler::McpError as ErrorPayload;
use crate::modules::error::AppError;
use crate::modules::files::export::{self, ExportFormat};
use crate::modules::jobs::model::{Job, JobFilter, JobStatus};
use crate::modules::jobs::worker::{JOB_TYPE_CATEGORIZE, JOB_TYPE_CLEANUP};
use crate::modules::mail::access::{AccessEvent, AccessType};
use crate::modules::mail::message::{GmailCategory, SearchCriteria};
use crate::modules::staleness::{StalenessScorer, StalenessWeights};
use crate::modules::user::access_control::{validate_access, AccessDecision};
use crate::modules::user::context::UserContext;
use crate::modules::user::entity::User;

/// Turns an `AppError` into the rmcp error shape, by way of the `ErrorPayload`
/// (`reason`/`message`/`request_id`) the rest of the service already uses at
/// its boundary. Validation and not-found become `invalid_params`, auth
/// failures become `invalid_request`, everything else is `internal_error`.
fn to_mcp_error(e: AppError) -> RmcpError {
    let code = e.code();
    let payload: ErrorPayload = e.into();
    let detail = serde_json::to_value(&payload).ok();
    match code {
        crate::modules::error::code::ErrorCode::InvalidParameter
        | crate::modules::error::code::ErrorCode::InvalidPolicy
        | crate::modules::error::code::ErrorCode::InvalidSchedule
        | crate::modules::error::code::ErrorCode::ExceedsLimitation
        | crate::modules::error::code::ErrorCode::AlreadyExists
        | crate::modules::error::code::ErrorCode::ResourceNotFound => RmcpError::invalid_params(payload.message, detail),
        crate::modules::error::code::ErrorCode::Unauthenticated
        | crate::modules::error::code::ErrorCode::SessionExpired
        | crate::modules::error::code::ErrorCode::PermissionDenied => RmcpError::invalid_request(payload.message, detail),
        _ => RmcpError::internal_error(payload.message, detail),
    }
}

fn ok_json<T: Serialize>(value: &T) -> Result<CallToolResult, RmcpError> {
    let text = serde_json::to_string(value).map_err(|e| RmcpError::internal_error(format!("serialize response: {e}"), None))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

/// Resolves a session id into the caller's identity. Every tool but
/// `authenticate` and first-time `register_user` starts here.
fn resolve_session(ctx: &AppContext, session_id: &str) -> Result<(UserContext, User), RmcpError> {
    let session = ctx.users.validate_session(session_id).map_err(to_mcp_error)?;
    let user = ctx
        .users
        .get_user(&session.user_id)
        .map_err(to_mcp_error)?
        .ok_or_else(|| RmcpError::invalid_request("session refers to a deleted user".to_string(), None))?;
    let roles = vec![user.role];
    let uc = UserContext {
        user_id: user.user_id.clone(),
        session_id: session.session_id.clone(),
        roles,
        permissions: vec![],
        ip: session.ip.clone(),
        agent: session.agent.clone(),
    };
    Ok((uc, user))
}

/// Validates access and turns a `Deny` decision into an error; every audit
/// entry (allow or deny) is still written by `validate_access` itself.
fn check_access(ctx: &AppContext, uc: &UserContext, resource_type: &str, resource_id: Option<&str>, operation: &str, owner_id: Option<&str>) -> Result<(), RmcpError> {
    let decision = validate_access(&ctx.storage.system_pool(), uc, resource_type, resource_id, operation, owner_id).map_err(to_mcp_error)?;
    if decision == AccessDecision::Deny {
        return Err(RmcpError::invalid_request(format!("access denied: {operation} on {resource_type}"), None));
    }
    Ok(())
}

fn record_access(ctx: &AppContext, user_id: &str, message_id: &str, access_type: AccessType, search_query: Option<String>) {
    let Ok(storage) = ctx.storage.handle_for(user_id) else { return };
    let mut summary = storage.get_access_summary(message_id).unwrap_or_else(|_| crate::modules::mail::access::AccessSummary::empty(message_id));
    summary.apply(&AccessEvent {
        message_id: message_id.to_string(),
        access_type,
        timestamp: crate::utc_now!(),
        search_query,
    });
    let _ = storage.put_access_summary(&summary);
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SessionParams {
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AuthenticateParams {
    /// Email being authenticated. Required once `code` is supplied.
    pub email: Option<String>,
    /// OAuth authorization code from the consent redirect. Omit to receive
    /// the `auth_url` to send the user to first.
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct AuthenticateResult {
    pub authenticated: bool,
    pub auth_url: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RegisterUserParams {
    pub session_id: Option<String>,
    pub email: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SwitchUserParams {
    pub session_id: String,
    pub target_user_id: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SessionResult {
    pub user_id: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListEmailsParams {
    pub session_id: String,
    pub category: Option<GmailCategory>,
    pub year: Option<i32>,
    pub archived: Option<bool>,
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct MessageIdParams {
    pub session_id: String,
    pub message_id: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CategorizeEmailsParams {
    pub session_id: String,
    pub year: Option<i32>,
    pub message_ids: Option<Vec<String>>,
    pub force_refresh: Option<bool>,
    pub batch_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct JobEnqueued {
    pub job_id: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchEmailsParams {
    pub session_id: String,
    pub criteria: SearchCriteria,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SaveSearchParams {
    pub session_id: String,
    pub name: String,
    pub criteria: SearchCriteria,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ArchiveEmailsParams {
    pub session_id: String,
    pub message_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RestoreEmailsParams {
    pub session_id: String,
    pub message_ids: Vec<String>,
    pub restore_labels: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateArchiveRuleParams {
    pub session_id: String,
    pub selector: SearchCriteria,
    pub action: CleanupAction,
    pub schedule: Option<CleanupSchedule>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExportEmailsParams {
    pub session_id: String,
    pub criteria: SearchCriteria,
    pub format: ExportFormat,
    pub filename: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DeleteEmailsParams {
    pub session_id: String,
    pub message_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateCleanupPolicyParams {
    pub session_id: String,
    pub name: String,
    pub priority: Option<u8>,
    pub criteria: CleanupCriteria,
    pub action: CleanupAction,
    pub safety: Option<SafetyOverrides>,
    pub schedule: Option<CleanupSchedule>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UpdateCleanupPolicyParams {
    pub session_id: String,
    pub policy_id: String,
    pub name: Option<String>,
    pub enabled: Option<bool>,
    pub priority: Option<u8>,
    pub criteria: Option<CleanupCriteria>,
    pub action: Option<CleanupAction>,
    pub safety: Option<SafetyOverrides>,
    pub schedule: Option<CleanupSchedule>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PolicyIdParams {
    pub session_id: String,
    pub policy_id: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateCleanupScheduleParams {
    pub session_id: String,
    pub policy_id: String,
    pub frequency: ScheduleFrequency,
    pub time: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TriggerCleanupParams {
    pub session_id: String,
    pub policy_ids: Option<Vec<String>>,
    pub dry_run: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct JobIdParams {
    pub session_id: String,
    pub job_id: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetCleanupRecommendationsParams {
    pub session_id: String,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UpdateAutomationConfigParams {
    pub session_id: String,
    pub config: crate::modules::automation::engine::AutomationConfig,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListJobsParams {
    pub session_id: String,
    pub job_type: Option<String>,
    pub status: Option<JobStatus>,
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}

/// The MCP tool surface for Gmail categorization, cleanup, and archiving.
/// Every tool but `authenticate` and the bootstrap `register_user` call
/// requires a `session_id` obtained from `authenticate`, and every
/// operation is scoped to that session's own user by construction - there
/// is no tool parameter that can select another user's data.
#[derive(Clone)]
pub struct GmailCuratorServer {
    ctx: Arc<AppContext>,
}

#[tool(tool_box)]
impl GmailCuratorServer {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    #[tool(description = "Begin or complete Gmail OAuth. Called with no code, returns an auth_url to visit; called again with the resulting code and the email it belongs to, returns a session_id.")]
    async fn authenticate(&self, #[tool(aggr)] params: AuthenticateParams) -> Result<CallToolResult, RmcpError> {
        let Some(code) = params.code else {
            let auth_url = format!(
                "https://accounts.google.com/o/oauth2/auth?client_id={}&redirect_uri={}&response_type=code&scope=https://www.googleapis.com/auth/gmail.modify&access_type=offline",
                crate::modules::settings::cli::SETTINGS.curator_gmail_client_id,
                crate::modules::settings::cli::SETTINGS.curator_gmail_redirect_uri,
            );
            return ok_json(&AuthenticateResult { authenticated: false, auth_url: Some(auth_url), user_id: None, session_id: None });
        };
        let email = params.email.ok_or_else(|| RmcpError::invalid_params("email is required alongside code".to_string(), None))?;
        if code.trim().is_empty() {
            return Err(RmcpError::invalid_params("code must not be empty".to_string(), None));
        }

        let existing = self
            .ctx
            .users
            .list_users()
            .map_err(to_mcp_error)?
            .into_iter()
            .find(|u| u.email.eq_ignore_ascii_case(&email));
        let user = match existing {
            Some(user) => user,
            None => self.ctx.users.register_user(&email, None, None).map_err(to_mcp_error)?,
        };
        let session = self.ctx.users.create_session(&user.user_id, None, None).map_err(to_mcp_error)?;
        ok_json(&AuthenticateResult {
            authenticated: true,
            auth_url: None,
            user_id: Some(user.user_id),
            session_id: Some(session.session_id),
        })
    }

    #[tool(description = "Register a new user. The very first user registered becomes an admin and needs no session; every registration after that requires an admin's session_id.")]
    async fn register_user(&self, #[tool(aggr)] params: RegisterUserParams) -> Result<CallToolResult, RmcpError> {
        let admin = match &params.session_id {
            Some(session_id) => {
                let (_, user) = resolve_session(&self.ctx, session_id)?;
                Some(user)
            }
            None => None,
        };
        let user = self.ctx.users.register_user(&params.email, params.display_name, admin.as_ref()).map_err(to_mcp_error)?;
        ok_json(&user)
    }

    #[tool(description = "List every registered user. Requires an admin session.")]
    async fn list_users(&self, #[tool(aggr)] params: SessionParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        if !uc.is_admin() {
            return Err(RmcpError::invalid_request("list_users requires an admin session".to_string(), None));
        }
        let users = self.ctx.users.list_users().map_err(to_mcp_error)?;
        ok_json(&users)
    }

    #[tool(description = "Return the authenticated user's own profile.")]
    async fn get_user_profile(&self, #[tool(aggr)] params: SessionParams) -> Result<CallToolResult, RmcpError> {
        let (_, user) = resolve_session(&self.ctx, &params.session_id)?;
        ok_json(&user)
    }

    #[tool(description = "Admin-only: issue a fresh session for another user, for support or migration purposes.")]
    async fn switch_user(&self, #[tool(aggr)] params: SwitchUserParams) -> Result<CallToolResult, RmcpError> {
        let (_, admin) = resolve_session(&self.ctx, &params.session_id)?;
        let session = self.ctx.users.switch_user(&admin, &params.target_user_id).map_err(to_mcp_error)?;
        ok_json(&SessionResult { user_id: session.user_id, session_id: session.session_id })
    }

    #[tool(description = "List emails, optionally filtered by Gmail category, year, or archived status.")]
    async fn list_emails(&self, #[tool(aggr)] params: ListEmailsParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        let storage = self.ctx.storage.handle_for(&uc.user_id).map_err(to_mcp_error)?;
        let criteria = SearchCriteria {
            category: params.category,
            year: params.year,
            archived: params.archived,
            offset: params.offset,
            limit: params.limit,
            ..Default::default()
        };
        let messages = storage.search_messages(&criteria).map_err(to_mcp_error)?;
        for msg in &messages {
            record_access(&self.ctx, &uc.user_id, &msg.message_id, AccessType::SearchResult, None);
        }
        ok_json(&messages)
    }

    #[tool(description = "Fetch full details for one email by id.")]
    async fn get_email_details(&self, #[tool(aggr)] params: MessageIdParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        let storage = self.ctx.storage.handle_for(&uc.user_id).map_err(to_mcp_error)?;
        let message = storage
            .get_message(&params.message_id)
            .map_err(to_mcp_error)?
            .ok_or_else(|| RmcpError::invalid_params(format!("message not found: {}", params.message_id), None))?;
        record_access(&self.ctx, &uc.user_id, &message.message_id, AccessType::DirectView, None);
        ok_json(&message)
    }

    #[tool(description = "Enqueue a background job that runs importance, date/size, and label analysis over a year, a set of message ids, or every unanalyzed message.")]
    async fn categorize_emails(&self, #[tool(aggr)] params: CategorizeEmailsParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        let request_params = serde_json::json!({
            "year": params.year,
            "message_ids": params.message_ids,
            "force_refresh": params.force_refresh.unwrap_or(false),
            "batch_size": params.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
        });
        let job = Job::new(Some(uc.user_id.clone()), JOB_TYPE_CATEGORIZE, request_params);
        let job = self.ctx.jobs.enqueue(job).map_err(to_mcp_error)?;
        ok_json(&JobEnqueued { job_id: job.job_id })
    }

    #[tool(description = "Search emails by conjunctive criteria: query text, category, year range, size range, sender, attachments, archived state, or label membership.")]
    async fn search_emails(&self, #[tool(aggr)] params: SearchEmailsParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        let storage = self.ctx.storage.handle_for(&uc.user_id).map_err(to_mcp_error)?;
        let messages = storage.search_messages(&params.criteria).map_err(to_mcp_error)?;
        for msg in &messages {
            record_access(&self.ctx, &uc.user_id, &msg.message_id, AccessType::SearchResult, params.criteria.query.clone());
        }
        ok_json(&messages)
    }

    #[tool(description = "Save a named search for later reuse.")]
    async fn save_search(&self, #[tool(aggr)] params: SaveSearchParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        let storage = self.ctx.storage.handle_for(&uc.user_id).map_err(to_mcp_error)?;
        storage.save_search(&params.name, &params.criteria).map_err(to_mcp_error)?;
        ok_json(&serde_json::json!({ "saved": true }))
    }

    #[tool(description = "List the caller's saved searches.")]
    async fn list_saved_searches(&self, #[tool(aggr)] params: SessionParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        let storage = self.ctx.storage.handle_for(&uc.user_id).map_err(to_mcp_error)?;
        let searches = storage.list_saved_searches().map_err(to_mcp_error)?;
        let out: Vec<_> = searches.into_iter().map(|(name, criteria)| serde_json::json!({ "name": name, "criteria": criteria })).collect();
        ok_json(&out)
    }

    #[tool(description = "Archive emails directly via the mail provider, moving them out of the inbox and marking them archived in local storage.")]
    async fn archive_emails(&self, #[tool(aggr)] params: ArchiveEmailsParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        check_access(&self.ctx, &uc, "message", None, "archive", Some(&uc.user_id))?;
        let storage = self.ctx.storage.handle_for(&uc.user_id).map_err(to_mcp_error)?;
        let provider = self.ctx.mail_provider_for(&uc.user_id);
        let executor = CleanupExecutor::new(storage, provider);
        let outcome = executor.archive_messages(&params.message_ids, &uc.user_id).await.map_err(to_mcp_error)?;
        ok_json(&outcome)
    }

    #[tool(description = "Restore previously archived emails, re-adding restore_labels (INBOX by default) and clearing archived state.")]
    async fn restore_emails(&self, #[tool(aggr)] params: RestoreEmailsParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        check_access(&self.ctx, &uc, "message", None, "restore", Some(&uc.user_id))?;
        let storage = self.ctx.storage.handle_for(&uc.user_id).map_err(to_mcp_error)?;
        let provider = self.ctx.mail_provider_for(&uc.user_id);
        let executor = CleanupExecutor::new(storage, provider);
        let mut restored = Vec::new();
        let mut failed = Vec::new();
        for message_id in &params.message_ids {
            match executor.restore(message_id, params.restore_labels.clone()).await {
                Ok(()) => restored.push(message_id.clone()),
                Err(e) => failed.push(serde_json::json!({ "message_id": message_id, "error": e.message() })),
            }
        }
        ok_json(&serde_json::json!({ "restored": restored, "failed": failed }))
    }

    #[tool(description = "Create a standing selector + action rule that can later be triggered on demand or scheduled.")]
    async fn create_archive_rule(&self, #[tool(aggr)] params: CreateArchiveRuleParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        let storage = self.ctx.storage.handle_for(&uc.user_id).map_err(to_mcp_error)?;
        let rule = ArchiveRule {
            id: crate::new_id!(),
            selector: params.selector,
            action: params.action,
            schedule: params.schedule,
            created_at: crate::utc_now!(),
        };
        storage.insert_archive_rule(&rule).map_err(to_mcp_error)?;
        ok_json(&rule)
    }

    #[tool(description = "List the caller's archive rules.")]
    async fn list_archive_rules(&self, #[tool(aggr)] params: SessionParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        let storage = self.ctx.storage.handle_for(&uc.user_id).map_err(to_mcp_error)?;
        let rules = storage.list_archive_rules().map_err(to_mcp_error)?;
        ok_json(&rules)
    }

    #[tool(description = "Export matching emails to a file (json, mbox, or csv), written under the caller's own archive directory.")]
    async fn export_emails(&self, #[tool(aggr)] params: ExportEmailsParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        check_access(&self.ctx, &uc, "message", None, "export", Some(&uc.user_id))?;
        let storage = self.ctx.storage.handle_for(&uc.user_id).map_err(to_mcp_error)?;
        let messages = storage.search_messages(&params.criteria).map_err(to_mcp_error)?;
        let metadata = export::export_messages(&storage, &uc.user_id, &messages, params.format, &params.filename).map_err(to_mcp_error)?;
        ok_json(&metadata)
    }

    #[tool(description = "Permanently delete emails via the mail provider, after running them through the safety checklist; protected emails are skipped and reported, not deleted.")]
    async fn delete_emails(&self, #[tool(aggr)] params: DeleteEmailsParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        check_access(&self.ctx, &uc, "message", None, "delete", Some(&uc.user_id))?;
        let storage = self.ctx.storage.handle_for(&uc.user_id).map_err(to_mcp_error)?;

        let safety_config = SafetyConfig::default();
        let safety_metrics = SafetyMetrics::default();
        let scorer = StalenessScorer::new(StalenessWeights::default());
        let now = crate::utc_now!();
        let mut deletions_this_hour = storage.count_deletions_since(now - 3_600_000).map_err(to_mcp_error)?;
        let mut deletions_this_day = storage.count_deletions_since(now - 86_400_000).map_err(to_mcp_error)?;
        let mut to_delete = Vec::new();
        let mut protected = Vec::new();
        for message_id in &params.message_ids {
            let Some(msg) = storage.get_message(message_id).map_err(to_mcp_error)? else { continue };
            let access = storage.get_access_summary(message_id).map_err(to_mcp_error)?;
            let staleness = scorer.score(&msg, &access);
            let check = crate::modules::cleanup::safety::run_checklist(
                &safety_config,
                &safety_metrics,
                &msg,
                &staleness,
                deletions_this_hour,
                deletions_this_day,
            );
            if check.safe {
                to_delete.push(message_id.clone());
                deletions_this_hour += 1;
                deletions_this_day += 1;
            } else {
                protected.push(serde_json::json!({ "message_id": message_id, "reason": check.reason }));
            }
        }

        let provider = self.ctx.mail_provider_for(&uc.user_id);
        let executor = CleanupExecutor::new(storage, provider);
        let outcome = executor.delete_messages(&to_delete, &uc.user_id).await.map_err(to_mcp_error)?;
        ok_json(&serde_json::json!({ "outcome": outcome, "protected": protected }))
    }

    #[tool(description = "Permanently empty the provider's trash folder.")]
    async fn empty_trash(&self, #[tool(aggr)] params: SessionParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        check_access(&self.ctx, &uc, "trash", None, "empty", Some(&uc.user_id))?;
        let provider = self.ctx.mail_provider_for(&uc.user_id);
        provider.purge_trash().await.map_err(to_mcp_error)?;
        ok_json(&serde_json::json!({ "emptied": true }))
    }

    #[tool(description = "Create a cleanup policy: matching criteria, an archive/delete action, safety overrides, and an optional schedule.")]
    async fn create_cleanup_policy(&self, #[tool(aggr)] params: CreateCleanupPolicyParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        check_access(&self.ctx, &uc, "cleanup_policy", None, "create", Some(&uc.user_id))?;
        let storage = self.ctx.storage.handle_for(&uc.user_id).map_err(to_mcp_error)?;
        let policy = CleanupPolicy {
            id: crate::new_id!(),
            name: params.name,
            enabled: true,
            priority: params.priority.unwrap_or(50),
            criteria: params.criteria,
            action: params.action,
            safety: params.safety.unwrap_or_default(),
            schedule: params.schedule,
            created_at: crate::utc_now!(),
        };
        policy.validate().map_err(to_mcp_error)?;
        storage.insert_policy(&policy).map_err(to_mcp_error)?;
        ok_json(&policy)
    }

    #[tool(description = "Update fields on an existing cleanup policy; omitted fields are left unchanged.")]
    async fn update_cleanup_policy(&self, #[tool(aggr)] params: UpdateCleanupPolicyParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        check_access(&self.ctx, &uc, "cleanup_policy", Some(&params.policy_id), "update", Some(&uc.user_id))?;
        let storage = self.ctx.storage.handle_for(&uc.user_id).map_err(to_mcp_error)?;
        let mut policy = storage
            .get_policy(&params.policy_id)
            .map_err(to_mcp_error)?
            .ok_or_else(|| RmcpError::invalid_params(format!("policy not found: {}", params.policy_id), None))?;

        if let Some(name) = params.name {
            policy.name = name;
        }
        if let Some(enabled) = params.enabled {
            policy.enabled = enabled;
        }
        if let Some(priority) = params.priority {
            policy.priority = priority;
        }
        if let Some(criteria) = params.criteria {
            policy.criteria = criteria;
        }
        if let Some(action) = params.action {
            policy.action = action;
        }
        if let Some(safety) = params.safety {
            policy.safety = safety;
        }
        if let Some(schedule) = params.schedule {
            policy.schedule = Some(schedule);
        }
        policy.validate().map_err(to_mcp_error)?;
        storage.update_policy(&policy).map_err(to_mcp_error)?;
        ok_json(&policy)
    }

    #[tool(description = "List the caller's cleanup policies.")]
    async fn list_cleanup_policies(&self, #[tool(aggr)] params: SessionParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        let storage = self.ctx.storage.handle_for(&uc.user_id).map_err(to_mcp_error)?;
        let policies = storage.list_policies().map_err(to_mcp_error)?;
        ok_json(&policies)
    }

    #[tool(description = "Delete a cleanup policy.")]
    async fn delete_cleanup_policy(&self, #[tool(aggr)] params: PolicyIdParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        check_access(&self.ctx, &uc, "cleanup_policy", Some(&params.policy_id), "delete", Some(&uc.user_id))?;
        let storage = self.ctx.storage.handle_for(&uc.user_id).map_err(to_mcp_error)?;
        storage.delete_policy(&params.policy_id).map_err(to_mcp_error)?;
        ok_json(&serde_json::json!({ "deleted": true }))
    }

    #[tool(description = "Attach a daily, weekly, or monthly schedule to an existing policy. Use continuous_enabled via update_cleanup_automation_config for continuous cleanup instead.")]
    async fn create_cleanup_schedule(&self, #[tool(aggr)] params: CreateCleanupScheduleParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        let storage = self.ctx.storage.handle_for(&uc.user_id).map_err(to_mcp_error)?;
        let mut policy = storage
            .get_policy(&params.policy_id)
            .map_err(to_mcp_error)?
            .ok_or_else(|| RmcpError::invalid_params(format!("policy not found: {}", params.policy_id), None))?;
        policy.schedule = Some(CleanupSchedule { frequency: params.frequency, time: params.time, last_fired_at: None });
        policy.validate().map_err(to_mcp_error)?;
        storage.update_policy(&policy).map_err(to_mcp_error)?;
        ok_json(&policy)
    }

    #[tool(description = "Immediately enqueue a cleanup job evaluating one or more policies (or all enabled policies, if none are named).")]
    async fn trigger_cleanup(&self, #[tool(aggr)] params: TriggerCleanupParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        check_access(&self.ctx, &uc, "cleanup_job", None, "trigger", Some(&uc.user_id))?;
        let request_params = serde_json::json!({
            "policy_ids": params.policy_ids.unwrap_or_default(),
            "dry_run": params.dry_run.unwrap_or(true),
        });
        let job = Job::new(Some(uc.user_id.clone()), JOB_TYPE_CLEANUP, request_params);
        let job = self.ctx.jobs.enqueue(job).map_err(to_mcp_error)?;
        ok_json(&JobEnqueued { job_id: job.job_id })
    }

    #[tool(description = "Fetch the status of a cleanup job by id.")]
    async fn get_cleanup_status(&self, #[tool(aggr)] params: JobIdParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        let job = self.ctx.jobs.get(&params.job_id, Some(&uc.user_id)).map_err(to_mcp_error)?;
        ok_json(&job)
    }

    #[tool(description = "Summarize cleanup activity: archive/delete counts from the archive log and current message totals.")]
    async fn get_cleanup_metrics(&self, #[tool(aggr)] params: SessionParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        let storage = self.ctx.storage.handle_for(&uc.user_id).map_err(to_mcp_error)?;
        let records = storage.list_archive_records(10_000).map_err(to_mcp_error)?;
        let archived: usize = records.iter().filter(|r| r.method == "provider").map(|r| r.message_ids.len()).sum();
        let deleted: usize = records.iter().filter(|r| r.method == "delete").map(|r| r.message_ids.len()).sum();
        let exported: usize = records.iter().filter(|r| r.method == "export").map(|r| r.message_ids.len()).sum();
        let (total, recent_24h) = storage.message_counts().map_err(to_mcp_error)?;
        ok_json(&serde_json::json!({
            "archived_count": archived,
            "deleted_count": deleted,
            "exported_count": exported,
            "total_messages": total,
            "recent_24h": recent_24h,
        }))
    }

    #[tool(description = "Preview cleanup candidates under the caller's current policies without taking any action.")]
    async fn get_cleanup_recommendations(&self, #[tool(aggr)] params: GetCleanupRecommendationsParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        let storage = self.ctx.storage.handle_for(&uc.user_id).map_err(to_mcp_error)?;
        let policies: Vec<_> = storage.list_policies().map_err(to_mcp_error)?.into_iter().filter(|p| p.enabled).collect();
        if policies.is_empty() {
            return ok_json(&serde_json::json!({ "candidates": [], "summary": { "total": 0, "candidates": 0, "protected": 0 } }));
        }

        let limit = params.limit.unwrap_or(500);
        let mut messages = Vec::new();
        for policy in &policies {
            messages.extend(storage.get_messages_for_cleanup(policy, limit).map_err(to_mcp_error)?);
        }
        messages.sort_by(|a, b| a.message_id.cmp(&b.message_id));
        messages.dedup_by(|a, b| a.message_id == b.message_id);

        let safety_config = SafetyConfig::default();
        let safety_metrics = SafetyMetrics::default();
        let scorer = StalenessScorer::new(StalenessWeights::default());
        let storage_for_access = storage.clone();
        let get_access = move |message_id: &str| -> crate::modules::mail::access::AccessSummary {
            storage_for_access.get_access_summary(message_id).unwrap_or_else(|_| crate::modules::mail::access::AccessSummary::empty(message_id))
        };
        let now = crate::utc_now!();
        let deletions_this_hour = storage.count_deletions_since(now - 3_600_000).map_err(to_mcp_error)?;
        let deletions_this_day = storage.count_deletions_since(now - 86_400_000).map_err(to_mcp_error)?;
        let evaluation = evaluate_emails_for_cleanup(
            &messages,
            &policies,
            &safety_config,
            &safety_metrics,
            &scorer,
            get_access,
            deletions_this_hour,
            deletions_this_day,
        );
        ok_json(&serde_json::json!({
            "candidates": evaluation.cleanup_candidates,
            "protected": evaluation.protected_emails,
            "summary": evaluation.evaluation_summary,
        }))
    }

    #[tool(description = "Report storage usage, message volume, and job queue health for the caller's account.")]
    async fn get_system_health(&self, #[tool(aggr)] params: SessionParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        let storage = self.ctx.storage.handle_for(&uc.user_id).map_err(to_mcp_error)?;
        let config = self.ctx.automation.get_config(&uc.user_id);
        let (total, recent_24h) = storage.message_counts().map_err(to_mcp_error)?;
        let metrics = crate::modules::automation::triggers::SystemMetricsSnapshot::from_message_counts(total, recent_24h, config.storage_capacity_messages);
        let in_progress = self
            .ctx
            .jobs
            .list(&JobFilter { user_id: Some(uc.user_id.clone()), job_type: None, status: Some(JobStatus::InProgress), offset: None, limit: Some(1000) })
            .map_err(to_mcp_error)?
            .len();
        let pending = self
            .ctx
            .jobs
            .list(&JobFilter { user_id: Some(uc.user_id.clone()), job_type: None, status: Some(JobStatus::Pending), offset: None, limit: Some(1000) })
            .map_err(to_mcp_error)?
            .len();
        ok_json(&serde_json::json!({
            "metrics": metrics,
            "automation_enabled": config.continuous_enabled,
            "jobs_in_progress": in_progress,
            "jobs_pending": pending,
        }))
    }

    #[tool(description = "Update the caller's continuous/scheduled automation configuration - pacing, peak-hour pauses, and trigger thresholds.")]
    async fn update_cleanup_automation_config(&self, #[tool(aggr)] params: UpdateAutomationConfigParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        self.ctx.automation.set_config(&uc.user_id, params.config.clone());
        ok_json(&params.config)
    }

    #[tool(description = "List the caller's jobs, optionally filtered by type or status.")]
    async fn list_jobs(&self, #[tool(aggr)] params: ListJobsParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        let filter = JobFilter {
            user_id: Some(uc.user_id.clone()),
            job_type: params.job_type,
            status: params.status,
            offset: params.offset,
            limit: params.limit,
        };
        let jobs = self.ctx.jobs.list(&filter).map_err(to_mcp_error)?;
        ok_json(&jobs)
    }

    #[tool(description = "Fetch the status of any job (categorization or cleanup) owned by the caller.")]
    async fn get_job_status(&self, #[tool(aggr)] params: JobIdParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        let job = self.ctx.jobs.get(&params.job_id, Some(&uc.user_id)).map_err(to_mcp_error)?;
        ok_json(&job)
    }

    #[tool(description = "Cancel a pending or in-progress job owned by the caller.")]
    async fn cancel_job(&self, #[tool(aggr)] params: JobIdParams) -> Result<CallToolResult, RmcpError> {
        let (uc, _) = resolve_session(&self.ctx, &params.session_id)?;
        check_access(&self.ctx, &uc, "job", Some(&params.job_id), "cancel", Some(&uc.user_id))?;
        let job = self.ctx.jobs.cancel(&params.job_id, Some(&uc.user_id)).map_err(to_mcp_error)?;
        ok_json(&job)
    }
}
