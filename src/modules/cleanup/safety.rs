use std::collections::{HashMap, HashSet};

use dashmap::DashMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::modules::mail::message::MessageIndex;
use crate::modules::staleness::StalenessScore;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SafetyCheckResult {
    pub safe: bool,
    pub reason: String,
    pub check_type: String,
    pub severity: Severity,
    pub metadata: serde_json::Value,
}

impl SafetyCheckResult {
    fn safe() -> Self {
        Self { safe: true, reason: String::new(), check_type: String::new(), severity: Severity::Low, metadata: serde_json::Value::Null }
    }

    fn protect(check_type: &str, reason: impl Into<String>, severity: Severity) -> Self {
        Self { safe: false, reason: reason.into(), check_type: check_type.to_string(), severity, metadata: serde_json::Value::Null }
    }
}

/// Tunable, layered protection rules. Fully overridable per engine
/// instance; list-valued fields merge additively with the defaults rather
/// than replacing them, so a caller adding one VIP domain doesn't lose the
/// built-in set.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SafetyConfig {
    pub max_deletions_per_hour: u32,
    pub max_deletions_per_day: u32,

    pub vip_domains: HashSet<String>,
    pub trusted_domains: HashSet<String>,
    pub whitelist_domains: HashSet<String>,

    pub executive_tokens: Vec<String>,

    pub critical_labels: Vec<String>,
    pub protected_labels: Vec<String>,

    pub legal_keywords: Vec<String>,
    pub compliance_terms: Vec<String>,
    pub regulatory_keywords: Vec<String>,

    pub important_sender_score: f64,
    pub consumer_mail_domains: HashSet<String>,

    pub active_thread_days: u32,
    pub recent_reply_days: u32,

    pub unread_recent_days: u32,
    pub unread_importance_boost: f64,
    pub importance_score_threshold: f64,

    pub large_email_threshold: u64,
    pub unusual_size_multiplier: f64,
    pub average_size_bytes: u64,

    pub min_staleness_score: f64,
    pub max_access_score: f64,

    /// Recency guard read by the policy engine before any policy runs
    /// (§4.G step 1), not by this checklist directly.
    pub recent_access_days: u32,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_deletions_per_hour: 500,
            max_deletions_per_day: 2000,
            vip_domains: HashSet::new(),
            trusted_domains: HashSet::new(),
            whitelist_domains: HashSet::new(),
            executive_tokens: vec!["ceo", "cto", "cfo", "president", "director", "executive", "board"]
                .into_iter()
                .map(String::from)
                .collect(),
            critical_labels: vec!["LEGAL".into(), "COMPLIANCE".into()],
            protected_labels: vec!["IMPORTANT".into(), "STARRED".into()],
            legal_keywords: vec!["lawsuit".into(), "subpoena".into(), "litigation".into()],
            compliance_terms: vec!["compliance".into(), "audit".into()],
            regulatory_keywords: vec!["regulation".into(), "regulatory filing".into()],
            important_sender_score: 0.8,
            consumer_mail_domains: ["gmail.com", "yahoo.com", "hotmail.com", "outlook.com", "icloud.com"]
                .into_iter()
                .map(String::from)
                .collect(),
            active_thread_days: 14,
            recent_reply_days: 3,
            unread_recent_days: 7,
            unread_importance_boost: 0.1,
            importance_score_threshold: 0.7,
            large_email_threshold: 10 * 1024 * 1024,
            unusual_size_multiplier: 5.0,
            average_size_bytes: 50 * 1024,
            min_staleness_score: 0.5,
            max_access_score: 0.6,
            recent_access_days: 7,
        }
    }
}

#[derive(Debug, Default)]
pub struct SafetyMetrics {
    total_checks: std::sync::atomic::AtomicU64,
    protected_emails: std::sync::atomic::AtomicU64,
    by_check_type: DashMap<String, u64>,
}

impl SafetyMetrics {
    pub fn record(&self, result: &SafetyCheckResult) {
        self.total_checks.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        if !result.safe {
            self.protected_emails.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            *self.by_check_type.entry(result.check_type.clone()).or_insert(0) += 1;
        }
    }

    pub fn snapshot(&self) -> (u64, u64, HashMap<String, u64>) {
        (
            self.total_checks.load(std::sync::atomic::Ordering::Relaxed),
            self.protected_emails.load(std::sync::atomic::Ordering::Relaxed),
            self.by_check_type.iter().map(|e| (e.key().clone(), *e.value())).collect(),
        )
    }
}

fn domain_of(sender: &str) -> String {
    sender.rsplit('@').next().unwrap_or("").to_lowercase()
}

fn age_days(msg: &MessageIndex) -> i64 {
    msg.date
        .map(|ts| (crate::utc_now!() - ts) / 86_400_000)
        .unwrap_or(0)
}

/// Runs the fixed-order checklist; returns on the FIRST failure. Rate
/// counters are read from `deletions_this_hour`/`deletions_this_day`
/// (maintained by the caller, typically the executor, across the run).
#[allow(clippy::too_many_arguments)]
pub fn run_checklist(
    config: &SafetyConfig,
    metrics: &SafetyMetrics,
    msg: &MessageIndex,
    staleness: &StalenessScore,
    deletions_this_hour: u32,
    deletions_this_day: u32,
) -> SafetyCheckResult {
    let result = run_checklist_inner(config, msg, staleness, deletions_this_hour, deletions_this_day);
    metrics.record(&result);
    result
}

fn run_checklist_inner(
    config: &SafetyConfig,
    msg: &MessageIndex,
    staleness: &StalenessScore,
    deletions_this_hour: u32,
    deletions_this_day: u32,
) -> SafetyCheckResult {
    // 1. Batch limits.
    if deletions_this_hour >= config.max_deletions_per_hour || deletions_this_day >= config.max_deletions_per_day {
        return SafetyCheckResult::protect("batch_limits", "hourly or daily deletion cap reached", Severity::High);
    }

    // 2. Domain protection.
    let domain = domain_of(&msg.sender);
    if config.vip_domains.contains(&domain) {
        return SafetyCheckResult::protect("domain_protection", format!("vip domain: {domain}"), Severity::Critical);
    }
    if config.trusted_domains.contains(&domain) {
        return SafetyCheckResult::protect("domain_protection", format!("trusted domain: {domain}"), Severity::High);
    }
    if config.whitelist_domains.contains(&domain) {
        return SafetyCheckResult::protect("domain_protection", format!("whitelisted domain: {domain}"), Severity::Medium);
    }

    // 3. VIP / executive.
    let haystack = format!("{} {}", msg.subject, msg.sender).to_lowercase();
    if config.executive_tokens.iter().any(|token| haystack.contains(token.as_str())) {
        return SafetyCheckResult::protect("vip_executive", "subject or sender matches an executive token", Severity::High);
    }

    // 4. Label safety.
    let label_match = |candidates: &[String]| {
        msg.labels.iter().any(|label| candidates.iter().any(|c| label.to_lowercase().contains(&c.to_lowercase())))
    };
    if label_match(&config.critical_labels) {
        return SafetyCheckResult::protect("label_safety", "message carries a critical label", Severity::Critical);
    }
    if label_match(&config.protected_labels) {
        return SafetyCheckResult::protect("label_safety", "message carries a protected label", Severity::High);
    }

    // 5. Legal / compliance.
    let text = format!("{} {}", msg.subject, msg.snippet).to_lowercase();
    if config.legal_keywords.iter().any(|k| text.contains(&k.to_lowercase())) {
        return SafetyCheckResult::protect("legal_compliance", "legal keyword match", Severity::Critical);
    }
    if config.compliance_terms.iter().any(|k| text.contains(&k.to_lowercase()))
        || config.regulatory_keywords.iter().any(|k| text.contains(&k.to_lowercase()))
    {
        return SafetyCheckResult::protect("legal_compliance", "compliance or regulatory term match", Severity::High);
    }

    // 6. Attachment safety.
    if msg.has_attachments {
        return SafetyCheckResult::protect("attachment_safety", "conservative hold on messages with attachments", Severity::Medium);
    }

    // 7. Sender reputation.
    let importance_score = msg.importance.as_ref().map(|i| i.importance_score).unwrap_or(0.0);
    let frequent_contact = !domain.is_empty() && !config.consumer_mail_domains.contains(&domain);
    if frequent_contact || importance_score >= config.important_sender_score {
        return SafetyCheckResult::protect("sender_reputation", "sender treated as a frequent or important contact", Severity::Medium);
    }

    // 8. Thread safety.
    let age = age_days(msg);
    if !msg.thread_id.is_empty() && age <= config.active_thread_days as i64 {
        return SafetyCheckResult::protect("thread_safety", "message belongs to an active thread", Severity::Medium);
    }
    let is_reply_or_forward = msg.subject.to_lowercase().starts_with("re:") || msg.subject.to_lowercase().starts_with("fwd:");
    if is_reply_or_forward && age <= config.recent_reply_days as i64 {
        return SafetyCheckResult::protect("thread_safety", "recent reply or forward", Severity::Medium);
    }

    // 9. Unread protection.
    let unread = msg.labels.iter().any(|l| l.eq_ignore_ascii_case("UNREAD"));
    if unread && age <= config.unread_recent_days as i64 {
        return SafetyCheckResult::protect("unread_protection", "recent unread message", Severity::High);
    }
    if (importance_score + config.unread_importance_boost) >= config.importance_score_threshold {
        return SafetyCheckResult::protect("unread_protection", "boosted importance crosses threshold", Severity::Medium);
    }

    // 10. Size anomaly.
    let size = msg.size_bytes.max(0) as u64;
    if size >= config.large_email_threshold {
        return SafetyCheckResult::protect("size_anomaly", "message exceeds the large-email threshold", Severity::Medium);
    }
    if config.average_size_bytes > 0 && (size as f64) > (config.average_size_bytes as f64) * config.unusual_size_multiplier {
        return SafetyCheckResult::protect("size_anomaly", "message is an outlier relative to average size", Severity::Low);
    }

    // 11. Staleness / access thresholds.
    if staleness.total_score >= config.min_staleness_score && staleness.factors.access_score >= config.max_access_score {
        // Staleness and access evidence both support cleanup; this check
        // passes (does not protect) in that case.
    } else {
        return SafetyCheckResult::protect(
            "staleness_thresholds",
            "staleness or access evidence insufficient",
            Severity::Medium,
        );
    }

    SafetyCheckResult::safe()
}
