use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Best-effort system metrics gathered per user. `avg_query_ms` and
/// `cache_hit_rate` have no dedicated measurement harness in this service
/// (there is no query-timing instrumentation layer), so they default to
/// values that never trip their trigger; `usage_percent` and
/// `daily_email_count` are derived from real row counts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub struct SystemMetricsSnapshot {
    pub usage_percent: f64,
    pub avg_query_ms: f64,
    pub cache_hit_rate: f64,
    pub daily_email_count: u64,
}

impl SystemMetricsSnapshot {
    pub fn from_message_counts(total: i64, recent_24h: i64, capacity: u64) -> Self {
        let usage_percent = if capacity == 0 { 0.0 } else { (total.max(0) as f64 / capacity as f64) * 100.0 };
        Self { usage_percent, avg_query_ms: 0.0, cache_hit_rate: 1.0, daily_email_count: recent_24h.max(0) as u64 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPriority {
    Normal,
    Emergency,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TriggeredAction {
    pub reason: String,
    pub priority: TriggerPriority,
    pub policy_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TriggerThresholds {
    pub storage_warning_percent: f64,
    pub storage_critical_percent: f64,
    pub performance_avg_query_ms: f64,
    pub performance_min_cache_hit_rate: f64,
    pub volume_daily_email_count: u64,
    pub emergency_policy_ids: Vec<String>,
    pub immediate_policy_ids: Vec<String>,
}

impl Default for TriggerThresholds {
    fn default() -> Self {
        Self {
            storage_warning_percent: 80.0,
            storage_critical_percent: 95.0,
            performance_avg_query_ms: 500.0,
            performance_min_cache_hit_rate: 0.5,
            volume_daily_email_count: 500,
            emergency_policy_ids: vec![],
            immediate_policy_ids: vec![],
        }
    }
}

/// Evaluates §4.J's three event triggers against one metrics snapshot.
/// Returns at most one action per trigger family; the caller submits a job
/// per returned action.
pub fn evaluate_triggers(metrics: &SystemMetricsSnapshot, thresholds: &TriggerThresholds, all_enabled_policy_ids: &[String]) -> Vec<TriggeredAction> {
    let mut actions = Vec::new();

    if metrics.usage_percent >= thresholds.storage_critical_percent {
        actions.push(TriggeredAction {
            reason: format!("storage usage {:.1}% at or above critical threshold {:.1}%", metrics.usage_percent, thresholds.storage_critical_percent),
            priority: TriggerPriority::Emergency,
            policy_ids: thresholds.emergency_policy_ids.clone(),
        });
    } else if metrics.usage_percent >= thresholds.storage_warning_percent {
        actions.push(TriggeredAction {
            reason: format!("storage usage {:.1}% at or above warning threshold {:.1}%", metrics.usage_percent, thresholds.storage_warning_percent),
            priority: TriggerPriority::Normal,
            policy_ids: all_enabled_policy_ids.to_vec(),
        });
    }

    if metrics.avg_query_ms > thresholds.performance_avg_query_ms || metrics.cache_hit_rate < thresholds.performance_min_cache_hit_rate {
        actions.push(TriggeredAction {
            reason: "query latency or cache hit rate degraded".to_string(),
            priority: TriggerPriority::Normal,
            policy_ids: all_enabled_policy_ids.to_vec(),
        });
    }

    if metrics.daily_email_count > thresholds.volume_daily_email_count {
        actions.push(TriggeredAction {
            reason: format!("daily email volume {} exceeds threshold {}", metrics.daily_email_count, thresholds.volume_daily_email_count),
            priority: TriggerPriority::Normal,
            policy_ids: thresholds.immediate_policy_ids.clone(),
        });
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_storage_outranks_warning() {
        let metrics = SystemMetricsSnapshot { usage_percent: 96.0, avg_query_ms: 0.0, cache_hit_rate: 1.0, daily_email_count: 0 };
        let thresholds = TriggerThresholds { emergency_policy_ids: vec!["p-emergency".into()], ..Default::default() };
        let actions = evaluate_triggers(&metrics, &thresholds, &[]);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].priority, TriggerPriority::Emergency);
    }

    #[test]
    fn volume_trigger_uses_immediate_policies() {
        let metrics = SystemMetricsSnapshot { usage_percent: 0.0, avg_query_ms: 0.0, cache_hit_rate: 1.0, daily_email_count: 501 };
        let thresholds = TriggerThresholds { immediate_policy_ids: vec!["p-volume".into()], ..Default::default() };
        let actions = evaluate_triggers(&metrics, &thresholds, &[]);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].policy_ids, vec!["p-volume".to_string()]);
    }
}
