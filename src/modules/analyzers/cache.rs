use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use crate::modules::analyzers::MergedAnalysis;
use crate::modules::utils::sha256_hex;

/// Canonical cache key: a hash over `(sorted labels, normalized sender,
/// size bucket, age bucket)`, never over the raw struct - two messages
/// that differ only in message_id or snippet hit the same cache entry.
pub fn canonical_key(
    sender: &str,
    labels: &std::collections::BTreeSet<String>,
    size_bytes: u64,
    age_days: i64,
    version: i64,
) -> String {
    let normalized_sender = sender.trim().to_lowercase();
    let size_bucket = size_bytes / 1024;
    let age_bucket = age_days / 7;
    let projection = format!("{normalized_sender}|{labels:?}|{size_bucket}|{age_bucket}|v{version}");
    sha256_hex(projection.as_bytes())
}

/// Read-mostly, versioned analyzer cache. A config-version bump is
/// expressed by baking the version into every key, so stale entries simply
/// age out of the LRU rather than requiring an explicit sweep.
pub struct AnalyzerCache {
    inner: Mutex<LruCache<String, MergedAnalysis>>,
}

impl AnalyzerCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(NonZeroUsize::new(capacity.max(1)).expect("capacity > 0"))),
        }
    }

    pub fn get(&self, key: &str) -> Option<MergedAnalysis> {
        self.inner.lock().expect("cache mutex poisoned").get(key).cloned()
    }

    pub fn put(&self, key: String, value: MergedAnalysis) {
        self.inner.lock().expect("cache mutex poisoned").put(key, value);
    }
}
