use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::modules::mail::access::AccessSummary;
use crate::modules::mail::message::MessageIndex;
use crate::modules::utils::clip_unit;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub struct StalenessWeights {
    pub age: f64,
    pub importance: f64,
    pub size: f64,
    pub spam: f64,
    pub access: f64,
}

impl Default for StalenessWeights {
    fn default() -> Self {
        Self { age: 0.25, importance: 0.30, size: 0.10, spam: 0.15, access: 0.20 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Keep,
    Archive,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FactorBreakdown {
    pub age_score: f64,
    pub importance_score: f64,
    pub size_penalty: f64,
    pub spam_score: f64,
    pub access_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StalenessScore {
    pub total_score: f64,
    pub factors: FactorBreakdown,
    pub recommendation: Recommendation,
    pub confidence: f64,
}

pub struct StalenessScorer {
    weights: StalenessWeights,
}

impl StalenessScorer {
    pub fn new(weights: StalenessWeights) -> Self {
        Self { weights }
    }

    /// `total_score = w1*age + w2*(1-importance) + w3*size + w4*spam + w5*access`,
    /// clipped to `[0,1]`. Weights are expected (not enforced here) to sum
    /// to 1 - the caller validates that at config-load time.
    pub fn score(&self, msg: &MessageIndex, access: &AccessSummary) -> StalenessScore {
        let age_score = msg.date_size.as_ref().map(|d| 1.0 - d.recency_score).unwrap_or(0.5);
        let importance_score = msg.importance.as_ref().map(|i| i.importance_score).unwrap_or(0.5);
        let size_penalty = msg.date_size.as_ref().map(|d| d.size_penalty).unwrap_or(0.0);
        let spam_score = msg.label_classifier.as_ref().map(|l| l.spam_score).unwrap_or(0.0);
        let access_score = access.access_score;

        let total_score = clip_unit(
            self.weights.age * age_score
                + self.weights.importance * (1.0 - importance_score)
                + self.weights.size * size_penalty
                + self.weights.spam * spam_score
                + self.weights.access * access_score,
        );

        let recommendation = if total_score >= 0.75 && access_score >= 0.5 {
            Recommendation::Delete
        } else if total_score >= 0.5 {
            Recommendation::Archive
        } else {
            Recommendation::Keep
        };

        // High confidence when age and access evidence agree: both stale
        // (old + unaccessed) or both fresh (recent + accessed).
        let agreement = 1.0 - (age_score - access_score).abs();
        let confidence = clip_unit(0.5 + agreement * 0.5);

        StalenessScore {
            total_score,
            factors: FactorBreakdown { age_score, importance_score, size_penalty, spam_score, access_score },
            recommendation,
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::mail::message::{AgeCategory, DateSizeResult, GmailCategory, ImportanceLevel, ImportanceResult, LabelClassifierResult, SizeCategory};
    use std::collections::BTreeSet;

    fn message_with(importance: f64, recency: f64, size_penalty: f64, spam: f64) -> MessageIndex {
        MessageIndex {
            message_id: "m1".into(),
            thread_id: "t1".into(),
            subject: "s".into(),
            sender: "a@example.com".into(),
            recipients: vec![],
            date: None,
            year: None,
            size_bytes: 0,
            has_attachments: false,
            labels: BTreeSet::new(),
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
            date_size: Some(DateSizeResult {
                age_category: AgeCategory::Old,
                size_category: SizeCategory::Small,
                recency_score: recency,
                size_penalty,
            }),
            label_classifier: Some(LabelClassifierResult {
                gmail_category: GmailCategory::Primary,
                spam_score: spam,
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

    #[test]
    fn low_importance_old_unaccessed_recommends_delete() {
        let scorer = StalenessScorer::new(StalenessWeights::default());
        let msg = message_with(0.05, 0.0, 0.0, 0.8);
        let access = AccessSummary::empty("m1");
        let result = scorer.score(&msg, &access);
        assert_eq!(result.recommendation, Recommendation::Delete);
    }

    #[test]
    fn important_recent_recommends_keep() {
        let scorer = StalenessScorer::new(StalenessWeights::default());
        let msg = message_with(0.95, 1.0, 0.0, 0.0);
        let mut access = AccessSummary::empty("m1");
        access.access_score = 0.0;
        let result = scorer.score(&msg, &access);
        assert_eq!(result.recommendation, Recommendation::Keep);
    }
}
