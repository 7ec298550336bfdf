use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::modules::cleanup::policy::{ActionMethod, ActionType, CleanupCriteria, CleanupPolicy};
use crate::modules::cleanup::safety::{self, SafetyConfig, SafetyMetrics};
use crate::modules::mail::access::AccessSummary;
use crate::modules::mail::message::MessageIndex;
use crate::modules::staleness::{StalenessScore, StalenessScorer};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CleanupCandidate {
    pub message: MessageIndex,
    pub policy_id: String,
    pub staleness_score: StalenessScore,
    pub recommended_action: ActionType,
    pub method: ActionMethod,
    pub export_format: Option<crate::modules::cleanup::policy::ExportFormat>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProtectedEmail {
    pub message: MessageIndex,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct EvaluationSummary {
    pub total: usize,
    pub candidates: usize,
    pub protected: usize,
    pub policies_applied: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EvaluationResult {
    pub cleanup_candidates: Vec<CleanupCandidate>,
    pub protected_emails: Vec<ProtectedEmail>,
    pub evaluation_summary: EvaluationSummary,
}

fn age_days(msg: &MessageIndex) -> i64 {
    msg.date.map(|ts| (crate::utc_now!() - ts) / 86_400_000).unwrap_or(0)
}

/// `importance_score > 5` in the spec is the numeric-tier reading, i.e.
/// `MessageIndex::importance_numeric_tier() > 5` (importance_score * 10).
fn is_high_importance(msg: &MessageIndex) -> bool {
    let high_category = msg
        .label_classifier
        .as_ref()
        .map(|l| matches!(l.gmail_category, crate::modules::mail::message::GmailCategory::Important))
        .unwrap_or(false);
    let high_level = msg
        .importance
        .as_ref()
        .map(|i| i.importance_level == crate::modules::mail::message::ImportanceLevel::High)
        .unwrap_or(false);
    high_category || high_level || msg.importance_numeric_tier() > 5.0
}

fn criteria_match(criteria: &CleanupCriteria, msg: &MessageIndex, staleness: &StalenessScore) -> bool {
    if let Some(min) = criteria.age_days_min {
        if age_days(msg) < min as i64 {
            return false;
        }
    }
    if let Some(max_level) = criteria.importance_level_max {
        let level = msg.importance.as_ref().map(|i| i.importance_level);
        if level.map(|l| l > max_level).unwrap_or(false) {
            return false;
        }
    }
    if let Some(min_size) = criteria.size_threshold_min {
        if (msg.size_bytes.max(0) as u64) < min_size {
            return false;
        }
    }
    if let Some(min_spam) = criteria.spam_score_min {
        let spam = msg.label_classifier.as_ref().map(|l| l.spam_score).unwrap_or(0.0);
        if spam < min_spam {
            return false;
        }
    }
    if let Some(min_promo) = criteria.promotional_score_min {
        let promo = msg.label_classifier.as_ref().map(|l| l.promotional_score).unwrap_or(0.0);
        if promo < min_promo {
            return false;
        }
    }
    if let Some(max_access) = criteria.access_score_max {
        if staleness.factors.access_score > max_access {
            return false;
        }
    }
    if let Some(no_access_days) = criteria.no_access_days {
        // Approximated from the same age signal used elsewhere; the
        // access tracker does not expose a dedicated "days since access"
        // field beyond `access_score`.
        if age_days(msg) < no_access_days as i64 {
            return false;
        }
    }
    true
}

/// Implements §4.G policy matching: recency guard, then preserve-important
/// pre-filter across all policies, then per-policy criteria + safety.
///
/// `deletions_this_hour`/`deletions_this_day` are the caller's counts of
/// deletions already committed in the trailing hour/day, before this batch;
/// they're incremented locally as delete candidates accumulate so the batch
/// limits check (§4.H item 1) holds across the whole run, not just per call.
#[allow(clippy::too_many_arguments)]
pub fn evaluate_emails_for_cleanup(
    messages: &[MessageIndex],
    policies: &[CleanupPolicy],
    safety_config: &SafetyConfig,
    safety_metrics: &SafetyMetrics,
    staleness_scorer: &StalenessScorer,
    get_access: impl Fn(&str) -> AccessSummary,
    deletions_this_hour: u32,
    deletions_this_day: u32,
) -> EvaluationResult {
    let mut ordered_policies = policies.to_vec();
    ordered_policies.sort_by_key(crate::modules::cleanup::policy::policy_order_key);
    let enabled_policies: Vec<&CleanupPolicy> = ordered_policies.iter().filter(|p| p.enabled).collect();

    let mut candidates = Vec::new();
    let mut protected = Vec::new();
    let mut policies_applied = Vec::new();
    let mut hour_count = deletions_this_hour;
    let mut day_count = deletions_this_day;

    for msg in messages {
        let access = get_access(&msg.message_id);
        let staleness = staleness_scorer.score(msg, &access);

        // Step 1: recency guard.
        if age_days(msg) < safety_config.recent_access_days as i64 {
            protected.push(ProtectedEmail { message: msg.clone(), reason: "too recent".to_string() });
            continue;
        }

        // Step 2: preserve-important pre-filter across ALL policies.
        let preserve_important_active = enabled_policies.iter().any(|p| p.safety.preserve_important);
        if preserve_important_active && is_high_importance(msg) {
            protected.push(ProtectedEmail {
                message: msg.clone(),
                reason: "policy configured to preserve important emails".to_string(),
            });
            continue;
        }

        // Step 3: per-policy criteria + safety, first match wins.
        let mut winner = None;
        let mut first_failure_reason = None;
        for policy in &enabled_policies {
            if !criteria_match(&policy.criteria, msg, &staleness) {
                continue;
            }
            let check = safety::run_checklist(safety_config, safety_metrics, msg, &staleness, hour_count, day_count);
            if check.safe {
                winner = Some(policy);
                if !policies_applied.contains(&policy.id) {
                    policies_applied.push(policy.id.clone());
                }
                break;
            } else if first_failure_reason.is_none() {
                first_failure_reason = Some(check.reason);
            }
        }

        match winner {
            Some(policy) => {
                if policy.action.action_type == ActionType::Delete {
                    hour_count += 1;
                    day_count += 1;
                }
                candidates.push(CleanupCandidate {
                    message: msg.clone(),
                    policy_id: policy.id.clone(),
                    staleness_score: staleness,
                    recommended_action: policy.action.action_type,
                    method: policy.action.method,
                    export_format: policy.action.export_format,
                })
            }
            None => protected.push(ProtectedEmail {
                message: msg.clone(),
                reason: first_failure_reason.unwrap_or_else(|| "no applicable policy".to_string()),
            }),
        }
    }

    let evaluation_summary = EvaluationSummary {
        total: messages.len(),
        candidates: candidates.len(),
        protected: protected.len(),
        policies_applied,
    };

    EvaluationResult { cleanup_candidates: candidates, protected_emails: protected, evaluation_summary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::cleanup::policy::{ActionMethod, CleanupAction, CleanupSchedule, SafetyOverrides};
    use crate::modules::mail::message::{GmailCategory, ImportanceLevel, ImportanceResult, LabelClassifierResult};
    use crate::modules::staleness::StalenessWeights;
    use std::collections::BTreeSet;

    fn message_aged(id: &str, age_days: i64, importance: f64, has_attachments: bool) -> MessageIndex {
        MessageIndex {
            message_id: id.into(),
            thread_id: "".into(),
            subject: "hello".into(),
            // gmail.com is a consumer domain, so the sender-reputation gate
            // doesn't treat this fixture as a frequent/important contact.
            sender: "a@gmail.com".into(),
            recipients: vec![],
            date: Some(crate::utc_now!() - age_days * 86_400_000),
            year: None,
            size_bytes: 1024,
            has_attachments,
            labels: BTreeSet::from(["INBOX".to_string()]),
            snippet: "".into(),
            archived: false,
            archive_date: None,
            archive_location: None,
            importance: Some(ImportanceResult {
                importance_score: importance,
                importance_level: ImportanceLevel::from_score(importance),
                matched_rule_ids: vec![],
                confidence: 1.0,
            }),
            date_size: None,
            label_classifier: Some(LabelClassifierResult {
                gmail_category: GmailCategory::Primary,
                spam_score: 0.0,
                promotional_score: 0.0,
                social_score: 0.0,
                spam_indicators: vec![],
                promotional_indicators: vec![],
                social_indicators: vec![],
            }),
            analysis_version: Some(1),
            analysis_timestamp: Some(0),
        }
    }

    fn archive_policy(priority: u8, preserve_important: bool) -> CleanupPolicy {
        CleanupPolicy {
            id: format!("p{priority}"),
            name: "archive-old".into(),
            enabled: true,
            priority,
            criteria: CleanupCriteria { age_days_min: Some(30), importance_level_max: Some(ImportanceLevel::Medium), ..Default::default() },
            action: CleanupAction { action_type: ActionType::Archive, method: ActionMethod::Provider, export_format: None },
            safety: SafetyOverrides { preserve_important, ..SafetyOverrides::default() },
            schedule: None::<CleanupSchedule>,
            created_at: 0,
        }
    }

    fn always_fresh_access(_message_id: &str) -> AccessSummary {
        let mut access = AccessSummary::empty("m");
        access.access_score = 1.0;
        access
    }

    /// S1: a low-importance old message is archived; a high-importance one
    /// with the same age is protected when `preserve_important` is set.
    #[test]
    fn scenario_s1_archives_low_importance_protects_high_importance() {
        let m1 = message_aged("m1", 200, 0.1, false);
        let m2 = message_aged("m2", 200, 0.9, false);
        let policies = vec![archive_policy(50, true)];
        let safety_config = SafetyConfig::default();
        let safety_metrics = SafetyMetrics::default();
        let scorer = StalenessScorer::new(StalenessWeights::default());

        let result = evaluate_emails_for_cleanup(
            &[m1, m2],
            &policies,
            &safety_config,
            &safety_metrics,
            &scorer,
            always_fresh_access,
            0,
            0,
        );

        assert_eq!(result.cleanup_candidates.len(), 1);
        assert_eq!(result.cleanup_candidates[0].message.message_id, "m1");
        assert!(result.protected_emails.iter().any(|p| p.message.message_id == "m2"));
    }

    /// S3 / invariant 5: a recent message is always protected by the
    /// recency guard, even with a policy that would otherwise match it.
    #[test]
    fn recent_email_guard_overrides_policy_match() {
        let recent = message_aged("m3", 2, 0.05, false);
        let policies = vec![archive_policy(50, false)];
        let safety_config = SafetyConfig { recent_access_days: 7, ..SafetyConfig::default() };
        let safety_metrics = SafetyMetrics::default();
        let scorer = StalenessScorer::new(StalenessWeights::default());

        let result = evaluate_emails_for_cleanup(
            &[recent],
            &policies,
            &safety_config,
            &safety_metrics,
            &scorer,
            always_fresh_access,
            0,
            0,
        );

        assert!(result.cleanup_candidates.is_empty());
        assert_eq!(result.protected_emails.len(), 1);
        assert!(result.protected_emails[0].reason.contains("too recent"));
    }

    /// Invariant 4: a message that matches a policy but fails a safety
    /// check (here, it carries an attachment) never ends up a candidate.
    #[test]
    fn protection_monotonicity_attachment_never_becomes_candidate() {
        let msg = message_aged("m4", 200, 0.1, true);
        let policies = vec![archive_policy(50, false)];
        let safety_config = SafetyConfig { recent_access_days: 0, ..SafetyConfig::default() };
        let safety_metrics = SafetyMetrics::default();
        let scorer = StalenessScorer::new(StalenessWeights::default());

        let result = evaluate_emails_for_cleanup(
            &[msg],
            &policies,
            &safety_config,
            &safety_metrics,
            &scorer,
            always_fresh_access,
            0,
            0,
        );

        assert!(result.cleanup_candidates.is_empty());
        assert_eq!(result.protected_emails.len(), 1);
    }

    /// Invariant 10: among two matching, safe policies, the higher-priority
    /// one is selected.
    #[test]
    fn policy_ordering_prefers_higher_priority() {
        let msg = message_aged("m5", 200, 0.1, false);
        let policies = vec![archive_policy(50, false), archive_policy(80, false)];
        let safety_config = SafetyConfig { recent_access_days: 0, ..SafetyConfig::default() };
        let safety_metrics = SafetyMetrics::default();
        let scorer = StalenessScorer::new(StalenessWeights::default());

        let result = evaluate_emails_for_cleanup(
            &[msg],
            &policies,
            &safety_config,
            &safety_metrics,
            &scorer,
            always_fresh_access,
            0,
            0,
        );

        assert_eq!(result.cleanup_candidates.len(), 1);
        assert_eq!(result.cleanup_candidates[0].policy_id, "p80");
    }

    /// Batch limits (§4.H item 1): once the hourly cap is already reached,
    /// every message is protected by that check regardless of other criteria.
    #[test]
    fn batch_limit_protects_when_hourly_cap_reached() {
        let msg = message_aged("m6", 200, 0.1, false);
        let policies = vec![archive_policy(50, false)];
        let safety_config = SafetyConfig { recent_access_days: 0, max_deletions_per_hour: 5, ..SafetyConfig::default() };
        let safety_metrics = SafetyMetrics::default();
        let scorer = StalenessScorer::new(StalenessWeights::default());

        let result = evaluate_emails_for_cleanup(
            &[msg],
            &policies,
            &safety_config,
            &safety_metrics,
            &scorer,
            always_fresh_access,
            5,
            0,
        );

        assert!(result.cleanup_candidates.is_empty());
        assert_eq!(result.protected_emails[0].reason, "hourly or daily deletion cap reached");
    }
}
