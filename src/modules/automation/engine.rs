use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveTime, TimeZone, Timelike};
use dashmap::DashMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::modules::automation::continuous::TokenBucket;
use crate::modules::automation::triggers::{evaluate_triggers, SystemMetricsSnapshot, TriggerPriority, TriggerThresholds};
use crate::modules::cleanup::policy::ScheduleFrequency;
use crate::modules::context::app::AppContext;
use crate::modules::error::AppResult;
use crate::modules::jobs::model::{Job, JobFilter, JobStatus};
use crate::modules::jobs::worker::JOB_TYPE_CLEANUP;
use crate::modules::storage::factory::StorageFactory;

const TICK_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AutomationConfig {
    pub continuous_enabled: bool,
    pub target_emails_per_minute: f64,
    pub max_concurrent_operations: u32,
    pub pause_during_peak_hours: bool,
    /// `(start_hour, end_hour)` in local time, inclusive-exclusive; wraps
    /// past midnight if `start > end`.
    pub peak_hours: Vec<(u8, u8)>,
    pub thresholds: TriggerThresholds,
    pub storage_capacity_messages: u64,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            continuous_enabled: false,
            target_emails_per_minute: 10.0,
            max_concurrent_operations: 2,
            pause_during_peak_hours: true,
            peak_hours: vec![(9, 18)],
            thresholds: TriggerThresholds::default(),
            storage_capacity_messages: 100_000,
        }
    }
}

/// Drives §4.J's three responsibilities - continuous cleanup, scheduled
/// cleanup, and event triggers - for every registered user, one tick at a
/// time. Configuration is per-user and in-memory only; it resets to
/// defaults on restart (unlike schedule "last fired" state, which is
/// persisted via `automation_state` and therefore survives restarts).
pub struct AutomationEngine {
    storage: Arc<StorageFactory>,
    configs: DashMap<String, AutomationConfig>,
    buckets: DashMap<String, TokenBucket>,
}

impl AutomationEngine {
    pub fn new(storage: Arc<StorageFactory>) -> Arc<Self> {
        Arc::new(Self { storage, configs: DashMap::new(), buckets: DashMap::new() })
    }

    pub fn get_config(&self, user_id: &str) -> AutomationConfig {
        self.configs.get(user_id).map(|c| c.clone()).unwrap_or_default()
    }

    pub fn set_config(&self, user_id: &str, config: AutomationConfig) {
        self.configs.insert(user_id.to_string(), config);
    }

    pub async fn run(self: Arc<Self>, ctx: Arc<AppContext>) {
        loop {
            if let Err(e) = self.tick(&ctx).await {
                tracing::warn!("automation tick failed: {}", e.message());
            }
            tokio::time::sleep(TICK_INTERVAL).await;
        }
    }

    async fn tick(&self, ctx: &Arc<AppContext>) -> AppResult<()> {
        let now = crate::utc_now!();
        for user in ctx.users.list_users()? {
            let config = self.get_config(&user.user_id);
            let handle = self.storage.handle_for(&user.user_id)?;
            let policies = handle.list_policies()?;
            let enabled_ids: Vec<String> = policies.iter().filter(|p| p.enabled).map(|p| p.id.clone()).collect();

            if config.continuous_enabled && !self.in_peak_hours(&config, now) {
                self.tick_continuous(ctx, &user.user_id, &config, now)?;
            }

            for policy in policies.iter().filter(|p| p.enabled) {
                if let Some(schedule) = &policy.schedule {
                    if matches!(schedule.frequency, ScheduleFrequency::Continuous) {
                        continue;
                    }
                    if self.schedule_fires(schedule, now) {
                        let mut fired = policy.clone();
                        if let Some(s) = fired.schedule.as_mut() {
                            s.last_fired_at = Some(now);
                        }
                        handle.update_policy(&fired)?;
                        self.submit_cleanup_job(ctx, &user.user_id, &[policy.id.clone()], false)?;
                    }
                }
            }

            let (total, recent) = handle.message_counts()?;
            let metrics = SystemMetricsSnapshot::from_message_counts(total, recent, config.storage_capacity_messages);
            for action in evaluate_triggers(&metrics, &config.thresholds, &enabled_ids) {
                tracing::info!(user_id = %user.user_id, reason = %action.reason, priority = ?action.priority, "automation event trigger fired");
                self.submit_cleanup_job(ctx, &user.user_id, &action.policy_ids, action.priority == TriggerPriority::Emergency)?;
            }
        }
        Ok(())
    }

    fn in_peak_hours(&self, config: &AutomationConfig, now_ms: i64) -> bool {
        if !config.pause_during_peak_hours {
            return false;
        }
        let local_hour = chrono::Local
            .timestamp_millis_opt(now_ms)
            .single()
            .map(|dt| dt.hour() as u8)
            .unwrap_or(0);
        config.peak_hours.iter().any(|&(start, end)| {
            if start <= end {
                local_hour >= start && local_hour < end
            } else {
                local_hour >= start || local_hour < end
            }
        })
    }

    fn tick_continuous(&self, ctx: &Arc<AppContext>, user_id: &str, config: &AutomationConfig, now_ms: i64) -> AppResult<()> {
        let in_progress = ctx.jobs.has_in_progress(Some(user_id), JOB_TYPE_CLEANUP)?;
        if in_progress {
            return Ok(());
        }
        let running = ctx
            .jobs
            .list(&JobFilter { user_id: Some(user_id.to_string()), job_type: Some(JOB_TYPE_CLEANUP.to_string()), status: Some(JobStatus::InProgress), offset: None, limit: Some(1000) })?
            .len() as u32;
        if running >= config.max_concurrent_operations {
            return Ok(());
        }

        let mut bucket = self
            .buckets
            .entry(user_id.to_string())
            .or_insert_with(|| TokenBucket::new(config.target_emails_per_minute.max(1.0), now_ms));
        if bucket.try_consume(1.0, now_ms) {
            drop(bucket);
            self.submit_cleanup_job(ctx, user_id, &[], false)?;
        }
        Ok(())
    }

    /// Fires at most once per scheduled instant, using the policy's own
    /// persisted `last_fired_at` rather than a live tick - robust to clock
    /// skew and to this process having been down across the instant.
    fn schedule_fires(&self, schedule: &crate::modules::cleanup::policy::CleanupSchedule, now_ms: i64) -> bool {
        let Some(time) = &schedule.time else { return false };
        let Some(scheduled_instant) = scheduled_instant_ms(schedule.frequency, time, now_ms) else { return false };
        if now_ms < scheduled_instant {
            return false;
        }
        !schedule.last_fired_at.map(|v| v >= scheduled_instant).unwrap_or(false)
    }

    fn submit_cleanup_job(&self, ctx: &Arc<AppContext>, user_id: &str, policy_ids: &[String], emergency: bool) -> AppResult<()> {
        let params = serde_json::json!({
            "policy_ids": policy_ids,
            "dry_run": false,
            "emergency": emergency,
        });
        let job = Job::new(Some(user_id.to_string()), JOB_TYPE_CLEANUP, params);
        ctx.jobs.enqueue(job)?;
        Ok(())
    }
}

/// The most recent instant (≤ `now_ms`) at which a daily/weekly/monthly
/// schedule was due, given its `time` of day. Weekly reduces to "once per
/// calendar week" anchored on Monday, and monthly to "once per calendar
/// month" anchored on the 1st, since the schedule carries no weekday or
/// day-of-month field of its own.
fn scheduled_instant_ms(frequency: ScheduleFrequency, time: &str, now_ms: i64) -> Option<i64> {
    let now = chrono::Local.timestamp_millis_opt(now_ms).single()?;
    let time_of_day = NaiveTime::parse_from_str(time, "%H:%M").ok()?;

    let anchor_date = match frequency {
        ScheduleFrequency::Continuous => return None,
        ScheduleFrequency::Daily => now.date_naive(),
        ScheduleFrequency::Weekly => now.date_naive() - chrono::Duration::days(now.weekday().num_days_from_monday() as i64),
        ScheduleFrequency::Monthly => now.date_naive().with_day(1)?,
    };
    let instant = chrono::Local.from_local_datetime(&anchor_date.and_time(time_of_day)).single()?;
    Some(instant.timestamp_millis())
}
