use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// `MessageIndex` - the local mirror of one remote message's metadata.
/// Identity is `(user_id, message_id)`; `user_id` is carried implicitly by
/// whichever per-user store instance holds the row, never as a field a
/// caller can forge.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MessageIndex {
    pub message_id: String,
    pub thread_id: String,
    pub subject: String,
    pub sender: String,
    pub recipients: Vec<String>,
    /// Milliseconds since epoch; `None` when the provider never reported a date.
    pub date: Option<i64>,
    pub year: Option<i32>,
    pub size_bytes: i64,
    pub has_attachments: bool,
    pub labels: BTreeSet<String>,
    pub snippet: String,
    pub archived: bool,
    pub archive_date: Option<i64>,
    pub archive_location: Option<String>,

    pub importance: Option<ImportanceResult>,
    pub date_size: Option<DateSizeResult>,
    pub label_classifier: Option<LabelClassifierResult>,
    pub analysis_version: Option<u32>,
    pub analysis_timestamp: Option<i64>,
}

impl MessageIndex {
    pub fn is_fully_analyzed(&self, current_version: u32) -> bool {
        self.analysis_version == Some(current_version)
            && self.importance.is_some()
            && self.date_size.is_some()
            && self.label_classifier.is_some()
    }

    /// Importance tier used by safety check 2 (preserve-important): a
    /// numeric tier above 5 is treated the same as `ImportanceLevel::High`.
    pub fn importance_numeric_tier(&self) -> f64 {
        self.importance
            .as_ref()
            .map(|i| i.importance_score * 10.0)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Eq, PartialEq, Ord, PartialOrd)]
pub enum ImportanceLevel {
    Low,
    Medium,
    High,
}

impl ImportanceLevel {
    pub fn from_score(score: f64) -> Self {
        if score < 0.33 {
            ImportanceLevel::Low
        } else if score < 0.66 {
            ImportanceLevel::Medium
        } else {
            ImportanceLevel::High
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ImportanceResult {
    pub importance_score: f64,
    pub importance_level: ImportanceLevel,
    pub matched_rule_ids: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
pub enum AgeCategory {
    Recent,
    Moderate,
    Old,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
pub enum SizeCategory {
    Small,
    Medium,
    Large,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DateSizeResult {
    pub age_category: AgeCategory,
    pub size_category: SizeCategory,
    pub recency_score: f64,
    pub size_penalty: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
pub enum GmailCategory {
    Primary,
    Important,
    Spam,
    Promotions,
    Social,
    Updates,
    Forums,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LabelClassifierResult {
    pub gmail_category: GmailCategory,
    pub spam_score: f64,
    pub promotional_score: f64,
    pub social_score: f64,
    pub spam_indicators: Vec<String>,
    pub promotional_indicators: Vec<String>,
    pub social_indicators: Vec<String>,
}

/// Conjunctive search criteria accepted by `StorageLayer::search_messages`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SearchCriteria {
    pub query: Option<String>,
    pub category: Option<GmailCategory>,
    pub year: Option<i32>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub size_min: Option<i64>,
    pub size_max: Option<i64>,
    pub sender: Option<String>,
    pub has_attachments: Option<bool>,
    pub archived: Option<bool>,
    pub labels_any_of: Vec<String>,
    pub ids_any_of: Vec<String>,
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}
