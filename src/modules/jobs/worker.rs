use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::modules::categorization::engine::{CategorizationEngine, CategorizationProgress, Selection, DEFAULT_BATCH_SIZE};
use crate::modules::cleanup::evaluate::evaluate_emails_for_cleanup;
use crate::modules::cleanup::executor::CleanupExecutor;
use crate::modules::cleanup::safety::{SafetyConfig, SafetyMetrics};
use crate::modules::context::app::AppContext;
use crate::modules::jobs::model::{Job, JobFilter, JobStatus};
use crate::modules::mail::access::AccessSummary;
use crate::modules::staleness::{StalenessScorer, StalenessWeights};

pub const JOB_TYPE_CATEGORIZE: &str = "categorize_emails";
pub const JOB_TYPE_CLEANUP: &str = "cleanup";

const POLL_INTERVAL: Duration = Duration::from_millis(750);
const PROGRESS_FLUSH_BATCH: u32 = 10;
const PROGRESS_FLUSH_INTERVAL: Duration = Duration::from_secs(2);

/// One cooperative worker per job type, polling every registered user in
/// round-robin order. Single-flight is enforced per (user, job_type): a
/// user with an in-progress job of this type is skipped until it finishes.
pub struct Worker {
    job_type: &'static str,
}

impl Worker {
    pub fn new(job_type: &'static str) -> Self {
        Self { job_type }
    }

    pub async fn run(self, ctx: Arc<AppContext>) {
        loop {
            if let Err(e) = self.poll_once(&ctx).await {
                tracing::warn!(job_type = self.job_type, "worker poll failed: {}", e.message());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn poll_once(&self, ctx: &Arc<AppContext>) -> crate::modules::error::AppResult<()> {
        let users = ctx.users.list_users()?;
        for user in users {
            if ctx.jobs.has_in_progress(Some(&user.user_id), self.job_type)? {
                continue;
            }
            let pending = ctx.jobs.list(&JobFilter {
                user_id: Some(user.user_id.clone()),
                job_type: Some(self.job_type.to_string()),
                status: Some(JobStatus::Pending),
                offset: None,
                limit: Some(1000),
            })?;
            let Some(mut job) = pending.into_iter().min_by_key(|j| j.created_at) else {
                continue;
            };

            if !ctx.jobs.try_claim(&job.job_id, job.user_id.as_deref())? {
                // Another worker instance claimed it first, or it was
                // cancelled between the list and the claim attempt.
                continue;
            }
            job.status = JobStatus::InProgress;
            job.updated_at = crate::utc_now!();
            let cancel_flag = ctx.jobs.cancel_flag(&job.job_id);

            let outcome = match self.job_type {
                JOB_TYPE_CATEGORIZE => run_categorization(ctx, &user.user_id, &job, &cancel_flag).await,
                JOB_TYPE_CLEANUP => run_cleanup(ctx, &user.user_id, &job, &cancel_flag).await,
                _ => Err(crate::raise_error!(
                    format!("unknown job type: {}", self.job_type),
                    crate::modules::error::code::ErrorCode::InvalidParameter
                )),
            };

            job.updated_at = crate::utc_now!();
            match outcome {
                Ok(results) => {
                    job.status = if cancel_flag.load(Ordering::SeqCst) { JobStatus::Cancelled } else { JobStatus::Completed };
                    job.progress = 1.0;
                    job.results = Some(results);
                }
                Err(e) => {
                    job.status = JobStatus::Failed;
                    job.error_details = Some(e.message().to_string());
                }
            }
            ctx.jobs.persist(&job)?;
            ctx.jobs.clear_cancel_flag(&job.job_id);
        }
        Ok(())
    }
}

async fn run_categorization(
    ctx: &Arc<AppContext>,
    user_id: &str,
    job: &Job,
    cancel_flag: &Arc<std::sync::atomic::AtomicBool>,
) -> crate::modules::error::AppResult<serde_json::Value> {
    let storage = ctx.storage.handle_for(user_id)?;
    let engine = CategorizationEngine::new(10_000);

    let selection = match job.request_params.get("year").and_then(|v| v.as_i64()) {
        Some(year) => Selection::Year(year as i32),
        None => match job.request_params.get("message_ids").and_then(|v| v.as_array()) {
            Some(ids) => Selection::Ids(ids.iter().filter_map(|v| v.as_str().map(String::from)).collect()),
            None => Selection::AllUnanalyzed,
        },
    };
    let force_refresh = job.request_params.get("force_refresh").and_then(|v| v.as_bool()).unwrap_or(false);
    let batch_size = job
        .request_params
        .get("batch_size")
        .and_then(|v| v.as_u64())
        .map(|v| v as u32)
        .unwrap_or(DEFAULT_BATCH_SIZE);

    let job_id = job.job_id.clone();
    let jobs = ctx.jobs.clone();
    let mut last_flush_at = 0u32;
    let mut last_flush_instant = std::time::Instant::now();
    let progress = engine.run(&storage, selection, force_refresh, batch_size, move |p: CategorizationProgress| {
        let due_by_count = p.analyzed.saturating_sub(last_flush_at) >= PROGRESS_FLUSH_BATCH;
        let due_by_time = last_flush_instant.elapsed() >= PROGRESS_FLUSH_INTERVAL;
        if due_by_count || due_by_time || p.analyzed == p.total {
            last_flush_at = p.analyzed;
            last_flush_instant = std::time::Instant::now();
            let fraction = if p.total == 0 { 1.0 } else { p.analyzed as f64 / p.total as f64 };
            if let Ok(mut current) = jobs.get(&job_id, None) {
                current.progress = fraction;
                current.updated_at = crate::utc_now!();
                let _ = jobs.persist(&current);
            }
        }
        !cancel_flag.load(Ordering::SeqCst)
    })?;

    Ok(serde_json::json!({ "analyzed": progress.analyzed, "total": progress.total }))
}

async fn run_cleanup(
    ctx: &Arc<AppContext>,
    user_id: &str,
    job: &Job,
    cancel_flag: &Arc<std::sync::atomic::AtomicBool>,
) -> crate::modules::error::AppResult<serde_json::Value> {
    let storage = ctx.storage.handle_for(user_id)?;
    let provider = ctx.mail_provider_for(user_id);

    let dry_run = job.request_params.get("dry_run").and_then(|v| v.as_bool()).unwrap_or(true);
    let export_output_path = job.request_params.get("export_output_path").and_then(|v| v.as_str()).map(String::from);

    let mut policies = storage.list_policies()?;
    if let Some(ids) = job.request_params.get("policy_ids").and_then(|v| v.as_array()) {
        let wanted: Vec<String> = ids.iter().filter_map(|v| v.as_str().map(String::from)).collect();
        if !wanted.is_empty() {
            policies.retain(|p| wanted.contains(&p.id));
        }
    }
    policies.retain(|p| p.enabled);
    if policies.is_empty() {
        return Ok(serde_json::json!({ "evaluated": 0, "candidates": 0, "succeeded": 0, "failed": 0 }));
    }

    let fetch_limit = job.request_params.get("limit").and_then(|v| v.as_u64()).map(|v| v as u32).unwrap_or(5000);
    let mut messages = Vec::new();
    for policy in &policies {
        messages.extend(storage.get_messages_for_cleanup(policy, fetch_limit)?);
    }
    messages.sort_by(|a, b| a.message_id.cmp(&b.message_id));
    messages.dedup_by(|a, b| a.message_id == b.message_id);

    if cancel_flag.load(Ordering::SeqCst) {
        return Ok(serde_json::json!({ "evaluated": 0, "candidates": 0, "succeeded": 0, "failed": 0, "cancelled": true }));
    }

    let safety_config = SafetyConfig::default();
    let safety_metrics = SafetyMetrics::default();
    let scorer = StalenessScorer::new(StalenessWeights::default());
    let storage_for_access = storage.clone();
    let get_access = move |message_id: &str| -> AccessSummary {
        storage_for_access.get_access_summary(message_id).unwrap_or_else(|_| AccessSummary::empty(message_id))
    };

    let now = crate::utc_now!();
    let deletions_this_hour = storage.count_deletions_since(now - 3_600_000)?;
    let deletions_this_day = storage.count_deletions_since(now - 86_400_000)?;
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

    let max_per_run = policies.iter().map(|p| p.safety.max_emails_per_run).min().unwrap_or(100);
    let executor = CleanupExecutor::new(storage.clone(), provider);
    let outcome = executor
        .execute(&evaluation.cleanup_candidates, max_per_run, dry_run, user_id, export_output_path.as_deref())
        .await?;

    Ok(serde_json::json!({
        "evaluated": evaluation.evaluation_summary.total,
        "candidates": evaluation.evaluation_summary.candidates,
        "protected": evaluation.evaluation_summary.protected,
        "succeeded": outcome.succeeded,
        "failed": outcome.failed,
        "dry_run": outcome.dry_run,
        "chunk_errors": outcome.chunk_errors,
    }))
}
