use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::modules::error::{code::ErrorCode, AppResult};
use crate::modules::mail::message::ImportanceLevel;
use crate::raise_error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Archive,
    Delete,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ActionMethod {
    Provider,
    Export,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Mbox,
    Json,
    Csv,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CleanupAction {
    pub action_type: ActionType,
    pub method: ActionMethod,
    pub export_format: Option<ExportFormat>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CleanupCriteria {
    pub age_days_min: Option<u32>,
    pub importance_level_max: Option<ImportanceLevel>,
    pub size_threshold_min: Option<u64>,
    pub spam_score_min: Option<f64>,
    pub promotional_score_min: Option<f64>,
    pub access_score_max: Option<f64>,
    pub no_access_days: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SafetyOverrides {
    pub max_emails_per_run: u32,
    pub require_confirmation: bool,
    pub dry_run_first: bool,
    pub preserve_important: bool,
}

impl Default for SafetyOverrides {
    fn default() -> Self {
        Self {
            max_emails_per_run: 100,
            require_confirmation: false,
            dry_run_first: false,
            preserve_important: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleFrequency {
    Continuous,
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CleanupSchedule {
    pub frequency: ScheduleFrequency,
    /// `^[0-2]?\d:[0-5]\d$` - local time of day the schedule fires.
    pub time: Option<String>,
    pub last_fired_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CleanupPolicy {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub priority: u8,
    pub criteria: CleanupCriteria,
    pub action: CleanupAction,
    pub safety: SafetyOverrides,
    pub schedule: Option<CleanupSchedule>,
    pub created_at: i64,
}

impl CleanupPolicy {
    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(raise_error!("policy name must be non-empty".into(), ErrorCode::InvalidPolicy));
        }
        if self.priority > 100 {
            return Err(raise_error!("priority must be in 0..=100".into(), ErrorCode::InvalidPolicy));
        }
        if let Some(v) = self.criteria.spam_score_min {
            if !(0.0..=1.0).contains(&v) {
                return Err(raise_error!("spam_score_min must be in [0,1]".into(), ErrorCode::InvalidPolicy));
            }
        }
        if let Some(v) = self.criteria.promotional_score_min {
            if !(0.0..=1.0).contains(&v) {
                return Err(raise_error!(
                    "promotional_score_min must be in [0,1]".into(),
                    ErrorCode::InvalidPolicy
                ));
            }
        }
        if let Some(v) = self.criteria.access_score_max {
            if !(0.0..=1.0).contains(&v) {
                return Err(raise_error!("access_score_max must be in [0,1]".into(), ErrorCode::InvalidPolicy));
            }
        }
        if self.action.method == ActionMethod::Export && self.action.export_format.is_none() {
            return Err(raise_error!(
                "export_format is required when method=export".into(),
                ErrorCode::InvalidPolicy
            ));
        }
        if self.safety.max_emails_per_run == 0 {
            return Err(raise_error!(
                "max_emails_per_run must be >= 1".into(),
                ErrorCode::InvalidPolicy
            ));
        }
        if let Some(schedule) = &self.schedule {
            if let Some(time) = &schedule.time {
                validate_time_of_day(time)?;
            }
        }
        Ok(())
    }
}

fn validate_time_of_day(time: &str) -> AppResult<()> {
    let re = regex::Regex::new(r"^[0-2]?\d:[0-5]\d$").expect("static regex");
    if re.is_match(time) {
        Ok(())
    } else {
        Err(raise_error!(
            format!("invalid schedule time of day: {time}"),
            ErrorCode::InvalidSchedule
        ))
    }
}

/// Orders candidates and policies the way the engine selects between them:
/// priority descending, then creation time ascending.
pub fn policy_order_key(policy: &CleanupPolicy) -> (std::cmp::Reverse<u8>, i64) {
    (std::cmp::Reverse(policy.priority), policy.created_at)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_policy() -> CleanupPolicy {
        CleanupPolicy {
            id: "p1".into(),
            name: "archive-old".into(),
            enabled: true,
            priority: 50,
            criteria: CleanupCriteria::default(),
            action: CleanupAction {
                action_type: ActionType::Archive,
                method: ActionMethod::Provider,
                export_format: None,
            },
            safety: SafetyOverrides::default(),
            schedule: None,
            created_at: 0,
        }
    }

    #[test]
    fn rejects_empty_name() {
        let mut policy = base_policy();
        policy.name = "  ".into();
        assert!(policy.validate().is_err());
    }

    #[test]
    fn export_requires_format() {
        let mut policy = base_policy();
        policy.action.method = ActionMethod::Export;
        assert!(policy.validate().is_err());
        policy.action.export_format = Some(ExportFormat::Json);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn orders_by_priority_desc_then_created_asc() {
        let mut high = base_policy();
        high.priority = 80;
        high.created_at = 10;
        let mut low = base_policy();
        low.priority = 50;
        low.created_at = 1;
        let mut policies = vec![low.clone(), high.clone()];
        policies.sort_by_key(policy_order_key);
        assert_eq!(policies[0].id, high.id);
    }
}
