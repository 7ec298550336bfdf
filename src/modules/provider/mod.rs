pub mod gmail;

use crate::modules::error::AppResult;
use std::collections::BTreeSet;

/// Outcome of one `batch_modify`/`modify` call against the remote mailbox.
#[derive(Debug, Clone)]
pub struct ModifyOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Opaque per-session handle to the remote mailbox. The core never speaks
/// provider dialects directly - everything downstream of `CleanupExecutor`
/// depends on this trait, not on Gmail specifically, so a different
/// provider can be substituted without touching policy or safety logic.
#[async_trait::async_trait]
pub trait MailProvider: Send + Sync {
    /// Idempotent on label sets: re-applying the same add/remove pair is a
    /// no-op on the remote side.
    async fn batch_modify(
        &self,
        message_ids: &[String],
        add_labels: &BTreeSet<String>,
        remove_labels: &BTreeSet<String>,
    ) -> AppResult<ModifyOutcome>;

    async fn modify(
        &self,
        message_id: &str,
        add_labels: &BTreeSet<String>,
        remove_labels: &BTreeSet<String>,
    ) -> AppResult<()>;

    /// Moves messages to trash (soft delete), distinct from `purge_trash`.
    async fn trash(&self, message_ids: &[String]) -> AppResult<ModifyOutcome>;

    /// Irreversibly deletes messages. Idempotency contract is
    /// provider-defined; callers must not assume a second call is free.
    async fn delete(&self, message_ids: &[String]) -> AppResult<ModifyOutcome>;

    /// Permanently empties trash. Kept distinct from `delete` because
    /// "trash" vs "permanently delete" semantics vary by provider and must
    /// not be guessed at (see design notes, open question).
    async fn purge_trash(&self) -> AppResult<()>;
}
