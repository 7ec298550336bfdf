use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
pub enum AccessType {
    SearchResult,
    DirectView,
    ThreadView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessEvent {
    pub message_id: String,
    pub access_type: AccessType,
    pub timestamp: i64,
    pub search_query: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AccessSummary {
    pub message_id: String,
    pub total_accesses: u64,
    pub last_accessed: Option<i64>,
    pub search_appearances: u64,
    pub search_interactions: u64,
    pub access_score: f64,
}

impl AccessSummary {
    pub fn empty(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            total_accesses: 0,
            last_accessed: None,
            search_appearances: 0,
            search_interactions: 0,
            access_score: 1.0,
        }
    }

    /// Applies one event and recomputes `access_score`.
    pub fn apply(&mut self, event: &AccessEvent) {
        self.total_accesses += 1;
        self.last_accessed = Some(event.timestamp);
        match event.access_type {
            AccessType::SearchResult => self.search_appearances += 1,
            AccessType::DirectView | AccessType::ThreadView => self.search_interactions += 1,
        }
        self.access_score = Self::score(self.last_accessed, self.total_accesses, event.timestamp);
    }

    /// `access_score` is monotonically non-decreasing in "days since last
    /// access" and decreasing in recent interaction volume, saturating at
    /// 1.0. A message that has never been accessed is maximally stale.
    fn score(last_accessed: Option<i64>, total_accesses: u64, now: i64) -> f64 {
        let days_since = match last_accessed {
            None => return 1.0,
            Some(ts) => ((now - ts).max(0) as f64) / 86_400_000.0,
        };
        let age_component = (days_since / 90.0).min(1.0);
        let interaction_damping = 1.0 / (1.0 + (total_accesses as f64) * 0.1);
        crate::modules::utils::clip_unit(age_component * 0.7 + interaction_damping * 0.3)
    }

    pub fn recompute_for_now(&self, now: i64) -> f64 {
        Self::score(self.last_accessed, self.total_accesses, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_accessed_is_maximally_stale() {
        let summary = AccessSummary::empty("m1");
        assert_eq!(summary.access_score, 1.0);
    }

    #[test]
    fn recent_access_lowers_score() {
        let mut summary = AccessSummary::empty("m1");
        let now = 1_000_000_000_000;
        summary.apply(&AccessEvent {
            message_id: "m1".into(),
            access_type: AccessType::DirectView,
            timestamp: now,
            search_query: None,
        });
        let later = now + 86_400_000 * 200;
        let stale_score = summary.recompute_for_now(later);
        assert!(stale_score > summary.access_score);
    }
}
