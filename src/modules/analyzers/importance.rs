use std::sync::LazyLock;

use regex::Regex;

use crate::modules::analyzers::AnalyzerInput;
use crate::modules::mail::message::{ImportanceLevel, ImportanceResult};
use crate::modules::utils::clip_unit;

/// One rule in the ordered set: if `matches` holds for the input, its
/// `weight` contributes to the final clipped sum and its id is recorded.
pub struct ImportanceRule {
    pub id: &'static str,
    pub weight: f64,
    matches: fn(&AnalyzerInput) -> bool,
}

static VIP_SUBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(urgent|asap|action required|important|action needed)\b").expect("static regex"));
static REPLY_FORWARD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^(re|fwd?):").expect("static regex"));

fn rules() -> Vec<ImportanceRule> {
    vec![
        ImportanceRule {
            id: "label_important",
            weight: 0.35,
            matches: |i| i.labels.iter().any(|l| l.eq_ignore_ascii_case("IMPORTANT")),
        },
        ImportanceRule {
            id: "label_starred",
            weight: 0.2,
            matches: |i| i.labels.iter().any(|l| l.eq_ignore_ascii_case("STARRED")),
        },
        ImportanceRule {
            id: "subject_urgent_language",
            weight: 0.25,
            matches: |i| VIP_SUBJECT.is_match(i.subject),
        },
        ImportanceRule {
            id: "is_reply_or_forward",
            weight: 0.1,
            matches: |i| REPLY_FORWARD.is_match(i.subject),
        },
        ImportanceRule {
            id: "unread",
            weight: 0.15,
            matches: |i| i.labels.iter().any(|l| l.eq_ignore_ascii_case("UNREAD")),
        },
        ImportanceRule {
            id: "recent",
            weight: 0.1,
            matches: |i| i.age_days <= 7,
        },
        ImportanceRule {
            id: "promotions_label",
            weight: -0.3,
            matches: |i| i.labels.iter().any(|l| l.eq_ignore_ascii_case("CATEGORY_PROMOTIONS")),
        },
    ]
}

/// Pure scorer: same input always yields the same output. The final score
/// is a clipped weighted sum over every rule whose predicate matched.
pub fn analyze(input: &AnalyzerInput) -> ImportanceResult {
    let mut score = 0.3_f64; // baseline so an email with no signals lands near "medium-low"
    let mut matched_rule_ids = Vec::new();

    for rule in rules() {
        if (rule.matches)(input) {
            score += rule.weight;
            matched_rule_ids.push(rule.id.to_string());
        }
    }

    let importance_score = clip_unit(score);
    let confidence = if matched_rule_ids.is_empty() { 0.3 } else { (0.5 + matched_rule_ids.len() as f64 * 0.1).min(1.0) };

    ImportanceResult {
        importance_score,
        importance_level: ImportanceLevel::from_score(importance_score),
        matched_rule_ids,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn input<'a>(subject: &'a str, labels: &'a BTreeSet<String>) -> AnalyzerInput<'a> {
        AnalyzerInput {
            message_id: "m1",
            subject,
            sender: "a@example.com",
            labels,
            size_bytes: 1000,
            age_days: 100,
            snippet: "",
        }
    }

    #[test]
    fn important_label_raises_score() {
        let labels: BTreeSet<String> = ["IMPORTANT".to_string()].into();
        let result = analyze(&input("hello", &labels));
        assert!(result.importance_score > 0.3);
        assert!(result.matched_rule_ids.contains(&"label_important".to_string()));
    }

    #[test]
    fn promotions_label_lowers_score() {
        let labels: BTreeSet<String> = ["CATEGORY_PROMOTIONS".to_string()].into();
        let result = analyze(&input("50% off today", &labels));
        assert!(result.importance_score < 0.3);
        assert_eq!(result.importance_level, ImportanceLevel::Low);
    }
}
