use crate::modules::analyzers::AnalyzerInput;
use crate::modules::mail::message::{AgeCategory, DateSizeResult, SizeCategory};
use crate::modules::utils::clip_unit;

#[derive(Debug, Clone, Copy)]
pub struct DateSizeConfig {
    pub recent_days: i64,
    pub moderate_days: i64,
    pub small_bytes: u64,
    pub medium_bytes: u64,
}

impl Default for DateSizeConfig {
    fn default() -> Self {
        Self {
            recent_days: 30,
            moderate_days: 180,
            small_bytes: 100 * 1024,
            medium_bytes: 1024 * 1024,
        }
    }
}

pub fn analyze(input: &AnalyzerInput, config: &DateSizeConfig) -> DateSizeResult {
    let age_category = if input.age_days <= config.recent_days {
        AgeCategory::Recent
    } else if input.age_days <= config.moderate_days {
        AgeCategory::Moderate
    } else {
        AgeCategory::Old
    };

    let size_category = if input.size_bytes < config.small_bytes {
        SizeCategory::Small
    } else if input.size_bytes < config.medium_bytes {
        SizeCategory::Medium
    } else {
        SizeCategory::Large
    };

    // Higher for newer: a message at age 0 scores 1.0, decaying linearly to
    // 0 at 2x the "old" threshold.
    let horizon = (config.moderate_days * 2).max(1) as f64;
    let recency_score = clip_unit(1.0 - (input.age_days as f64 / horizon));

    // Higher for larger, saturating once well past the "large" threshold.
    let size_ceiling = (config.medium_bytes as f64) * 5.0;
    let size_penalty = clip_unit(input.size_bytes as f64 / size_ceiling);

    DateSizeResult { age_category, size_category, recency_score, size_penalty }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn input(age_days: i64, size_bytes: u64) -> AnalyzerInput<'static> {
        static LABELS: std::sync::OnceLock<BTreeSet<String>> = std::sync::OnceLock::new();
        AnalyzerInput {
            message_id: "m1",
            subject: "",
            sender: "a@example.com",
            labels: LABELS.get_or_init(BTreeSet::new),
            size_bytes,
            age_days,
            snippet: "",
        }
    }

    #[test]
    fn buckets_age_correctly() {
        let config = DateSizeConfig::default();
        assert_eq!(analyze(&input(10, 0), &config).age_category, AgeCategory::Recent);
        assert_eq!(analyze(&input(90, 0), &config).age_category, AgeCategory::Moderate);
        assert_eq!(analyze(&input(400, 0), &config).age_category, AgeCategory::Old);
    }

    #[test]
    fn buckets_size_correctly() {
        let config = DateSizeConfig::default();
        assert_eq!(analyze(&input(0, 10), &config).size_category, SizeCategory::Small);
        assert_eq!(analyze(&input(0, 500_000), &config).size_category, SizeCategory::Medium);
        assert_eq!(analyze(&input(0, 5_000_000), &config).size_category, SizeCategory::Large);
    }
}
