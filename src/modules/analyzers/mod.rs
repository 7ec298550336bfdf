pub mod cache;
pub mod date_size;
pub mod importance;
pub mod label;

use crate::modules::mail::message::{DateSizeResult, ImportanceResult, LabelClassifierResult};

/// Current configuration/engine version. Bumping this invalidates the
/// analyzer cache and causes `CategorizationEngine` to treat every message
/// as un-analyzed even if `force_refresh` is not requested.
pub const ANALYZER_VERSION: i64 = 1;

#[derive(Debug, Clone)]
pub struct AnalyzerInput<'a> {
    pub message_id: &'a str,
    pub subject: &'a str,
    pub sender: &'a str,
    pub labels: &'a std::collections::BTreeSet<String>,
    pub size_bytes: u64,
    pub age_days: i64,
    pub snippet: &'a str,
}

#[derive(Debug, Clone)]
pub struct MergedAnalysis {
    pub importance: ImportanceResult,
    pub date_size: DateSizeResult,
    pub label_classifier: LabelClassifierResult,
}
