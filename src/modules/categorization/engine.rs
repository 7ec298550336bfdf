use std::sync::Arc;

use chrono::{Datelike, TimeZone, Utc};

use crate::modules::analyzers::cache::AnalyzerCache;
use crate::modules::analyzers::{date_size, importance, label, AnalyzerInput, MergedAnalysis, ANALYZER_VERSION};
use crate::modules::error::AppResult;
use crate::modules::mail::message::{MessageIndex, SearchCriteria};
use crate::modules::storage::handle::UserStorageHandle;

pub const DEFAULT_BATCH_SIZE: u32 = 100;

/// Selects which messages a `categorize_emails` job should touch.
#[derive(Debug, Clone)]
pub enum Selection {
    Year(i32),
    Ids(Vec<String>),
    AllUnanalyzed,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CategorizationProgress {
    pub analyzed: u32,
    pub total: u32,
}

/// Orchestrates the three analyzers over a selection of messages in
/// bounded batches, writing merged results back to storage. Never touches
/// `archived` or `labels`.
pub struct CategorizationEngine {
    cache: AnalyzerCache,
}

impl CategorizationEngine {
    pub fn new(cache_capacity: usize) -> Self {
        Self { cache: AnalyzerCache::new(cache_capacity) }
    }

    fn candidates(&self, storage: &UserStorageHandle, selection: &Selection) -> AppResult<Vec<MessageIndex>> {
        match selection {
            Selection::Year(year) => storage.search_messages(&SearchCriteria {
                year: Some(*year),
                limit: Some(100_000),
                ..Default::default()
            }),
            Selection::Ids(ids) => storage.search_messages(&SearchCriteria {
                ids_any_of: ids.clone(),
                limit: Some(ids.len().max(1) as u32),
                ..Default::default()
            }),
            Selection::AllUnanalyzed => storage.search_messages(&SearchCriteria { limit: Some(100_000), ..Default::default() }),
        }
    }

    /// Runs categorization, calling `on_progress` at batch boundaries so a
    /// Job can persist progress and observe cancellation between batches.
    pub fn run<F>(
        &self,
        storage: &Arc<UserStorageHandle>,
        selection: Selection,
        force_refresh: bool,
        batch_size: u32,
        mut on_progress: F,
    ) -> AppResult<CategorizationProgress>
    where
        F: FnMut(CategorizationProgress) -> bool,
    {
        let mut candidates = self.candidates(storage, &selection)?;
        if !force_refresh {
            candidates.retain(|m| !m.is_fully_analyzed(ANALYZER_VERSION as u32));
        }

        let total = candidates.len() as u32;
        let mut analyzed = 0u32;

        for chunk in candidates.chunks(batch_size.max(1) as usize) {
            for msg in chunk {
                let merged = self.analyze_one(msg);
                let mut updated = msg.clone();
                updated.importance = Some(merged.importance);
                updated.date_size = Some(merged.date_size);
                updated.label_classifier = Some(merged.label_classifier);
                updated.analysis_version = Some(ANALYZER_VERSION as u32);
                updated.analysis_timestamp = Some(crate::utc_now!());
                storage.upsert_message(&updated)?;
                analyzed += 1;
            }
            let keep_going = on_progress(CategorizationProgress { analyzed, total });
            if !keep_going {
                break;
            }
        }

        Ok(CategorizationProgress { analyzed, total })
    }

    fn analyze_one(&self, msg: &MessageIndex) -> MergedAnalysis {
        let age_days = msg
            .date
            .map(|ts| {
                let then = Utc.timestamp_millis_opt(ts).single().unwrap_or_else(Utc::now);
                (Utc::now() - then).num_days().max(0)
            })
            .unwrap_or(0);

        let key = crate::modules::analyzers::cache::canonical_key(
            &msg.sender,
            &msg.labels,
            msg.size_bytes.max(0) as u64,
            age_days,
            ANALYZER_VERSION,
        );
        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }

        let input = AnalyzerInput {
            message_id: &msg.message_id,
            subject: &msg.subject,
            sender: &msg.sender,
            labels: &msg.labels,
            size_bytes: msg.size_bytes.max(0) as u64,
            age_days,
            snippet: &msg.snippet,
        };
        let merged = MergedAnalysis {
            importance: importance::analyze(&input),
            date_size: date_size::analyze(&input, &date_size::DateSizeConfig::default()),
            label_classifier: label::analyze(&input),
        };
        self.cache.put(key, merged.clone());
        merged
    }
}

pub fn year_of(ts_millis: i64) -> i32 {
    Utc.timestamp_millis_opt(ts_millis).single().unwrap_or_else(Utc::now).year()
}
