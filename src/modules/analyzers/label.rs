use std::collections::HashSet;
use std::sync::LazyLock;

use crate::modules::analyzers::AnalyzerInput;
use crate::modules::mail::message::{GmailCategory, LabelClassifierResult};
use crate::modules::utils::clip_unit;

/// Ordered label-to-category mapping: explicit Gmail category labels
/// outrank the heuristic indicator scan below.
const CATEGORY_LABELS: &[(&str, GmailCategory)] = &[
    ("CATEGORY_PERSONAL", GmailCategory::Primary),
    ("IMPORTANT", GmailCategory::Important),
    ("SPAM", GmailCategory::Spam),
    ("CATEGORY_PROMOTIONS", GmailCategory::Promotions),
    ("CATEGORY_SOCIAL", GmailCategory::Social),
    ("CATEGORY_UPDATES", GmailCategory::Updates),
    ("CATEGORY_FORUMS", GmailCategory::Forums),
];

static SPAM_INDICATORS: LazyLock<Vec<&'static str>> =
    LazyLock::new(|| vec!["free money", "act now", "limited time", "click here", "unsubscribe", "winner"]);
static PROMOTIONAL_INDICATORS: LazyLock<Vec<&'static str>> =
    LazyLock::new(|| vec!["% off", "sale", "discount", "deal", "coupon", "offer"]);
static SOCIAL_DOMAINS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    ["facebookmail.com", "linkedin.com", "twitter.com", "instagram.com"].into_iter().collect()
});

fn gmail_category(labels: &std::collections::BTreeSet<String>) -> GmailCategory {
    for (label, category) in CATEGORY_LABELS {
        if labels.iter().any(|l| l.eq_ignore_ascii_case(label)) {
            return *category;
        }
    }
    GmailCategory::Primary
}

/// Sums indicator matches with de-duplication: each label or snippet
/// fragment contributes at most once per category, so repeating the same
/// promotional phrase three times in a snippet doesn't triple-count.
fn score_indicators(haystack: &str, indicators: &[&'static str]) -> (f64, Vec<String>) {
    let lower = haystack.to_lowercase();
    let mut matched = Vec::new();
    for indicator in indicators {
        if lower.contains(indicator) {
            matched.push(indicator.to_string());
        }
    }
    let score = clip_unit(matched.len() as f64 * 0.2);
    (score, matched)
}

pub fn analyze(input: &AnalyzerInput) -> LabelClassifierResult {
    let gmail_category = gmail_category(input.labels);
    let haystack = format!("{} {}", input.subject, input.snippet);

    let (mut spam_score, spam_indicators) = score_indicators(&haystack, &SPAM_INDICATORS);
    let (promotional_score, promotional_indicators) = score_indicators(&haystack, &PROMOTIONAL_INDICATORS);

    if matches!(gmail_category, GmailCategory::Spam) {
        spam_score = 1.0;
    }

    let sender_domain = input.sender.rsplit('@').next().unwrap_or("").to_lowercase();
    let social_score = if SOCIAL_DOMAINS.contains(sender_domain.as_str())
        || input.labels.iter().any(|l| l.eq_ignore_ascii_case("CATEGORY_SOCIAL"))
    {
        1.0
    } else {
        0.0
    };
    let social_indicators = if social_score > 0.0 { vec![sender_domain] } else { Vec::new() };

    LabelClassifierResult {
        gmail_category,
        spam_score,
        promotional_score,
        social_score,
        spam_indicators,
        promotional_indicators,
        social_indicators,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn input<'a>(subject: &'a str, sender: &'a str, labels: &'a BTreeSet<String>) -> AnalyzerInput<'a> {
        AnalyzerInput { message_id: "m1", subject, sender, labels, size_bytes: 0, age_days: 0, snippet: "" }
    }

    #[test]
    fn explicit_label_outranks_heuristics() {
        let labels: BTreeSet<String> = ["SPAM".to_string()].into();
        let result = analyze(&input("totally normal subject", "a@example.com", &labels));
        assert_eq!(result.gmail_category, GmailCategory::Spam);
        assert_eq!(result.spam_score, 1.0);
    }

    #[test]
    fn promotional_phrase_detected() {
        let labels = BTreeSet::new();
        let result = analyze(&input("Flash sale: 50% off today", "deals@shop.com", &labels));
        assert!(result.promotional_score > 0.0);
    }
}
