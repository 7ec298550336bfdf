use std::collections::BTreeSet;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::modules::cleanup::evaluate::CleanupCandidate;
use crate::modules::cleanup::policy::{ActionMethod, ActionType, ExportFormat as PolicyExportFormat};
use crate::modules::cleanup::rules::ArchiveRecord;
use crate::modules::error::AppResult;
use crate::modules::files::export;
use crate::modules::provider::MailProvider;
use crate::modules::storage::handle::UserStorageHandle;

const ARCHIVED_LABEL: &str = "ARCHIVED";
const INBOX_LABEL: &str = "INBOX";

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ExecutionOutcome {
    pub planned: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub chunk_errors: Vec<String>,
    pub dry_run: bool,
}

/// Executes the candidates produced by `evaluate_emails_for_cleanup`,
/// bounded by the winning policy's `max_emails_per_run`. Never retries
/// inside one call - a failed chunk is recorded and the run continues;
/// retry policy at a higher granularity is the caller's job.
pub struct CleanupExecutor {
    storage: Arc<UserStorageHandle>,
    provider: Arc<dyn MailProvider>,
}

impl CleanupExecutor {
    pub fn new(storage: Arc<UserStorageHandle>, provider: Arc<dyn MailProvider>) -> Self {
        Self { storage, provider }
    }

    pub async fn execute(
        &self,
        candidates: &[CleanupCandidate],
        max_emails_per_run: u32,
        dry_run: bool,
        user_id: &str,
        export_output_path: Option<&str>,
    ) -> AppResult<ExecutionOutcome> {
        let bounded: Vec<&CleanupCandidate> = candidates.iter().take(max_emails_per_run as usize).collect();

        if dry_run {
            return Ok(ExecutionOutcome { planned: bounded.len(), succeeded: 0, failed: 0, chunk_errors: vec![], dry_run: true });
        }

        let mut outcome = ExecutionOutcome { planned: bounded.len(), dry_run: false, ..Default::default() };

        // Group by (action_type, method) as carried on each candidate's
        // winning policy, so every chunk uses one provider call shape.
        let mut provider_archive = Vec::new();
        let mut provider_delete = Vec::new();
        let mut export_candidates = Vec::new();

        for candidate in &bounded {
            match candidate.method {
                ActionMethod::Export => export_candidates.push(*candidate),
                ActionMethod::Provider => match candidate.recommended_action {
                    ActionType::Archive => provider_archive.push(*candidate),
                    ActionType::Delete => provider_delete.push(*candidate),
                },
            }
        }

        if !provider_archive.is_empty() {
            self.execute_provider_archive(&provider_archive, user_id, &mut outcome).await?;
        }
        if !provider_delete.is_empty() {
            self.execute_provider_delete(&provider_delete, user_id, &mut outcome).await?;
        }
        if !export_candidates.is_empty() {
            let path = export_output_path.unwrap_or("cleanup_export");
            self.execute_export(&export_candidates, user_id, path, &mut outcome)?;
        }

        Ok(outcome)
    }

    async fn execute_provider_archive(
        &self,
        candidates: &[&CleanupCandidate],
        user_id: &str,
        outcome: &mut ExecutionOutcome,
    ) -> AppResult<()> {
        let ids: Vec<String> = candidates.iter().map(|c| c.message.message_id.clone()).collect();
        let add: BTreeSet<String> = [ARCHIVED_LABEL.to_string()].into();
        let remove: BTreeSet<String> = [INBOX_LABEL.to_string()].into();

        let result = self.provider.batch_modify(&ids, &add, &remove).await?;
        outcome.succeeded += result.succeeded.len();
        outcome.failed += result.failed.len();
        for (_, err) in &result.failed {
            outcome.chunk_errors.push(err.clone());
        }

        if !result.succeeded.is_empty() {
            let now = crate::utc_now!();
            for candidate in candidates.iter().filter(|c| result.succeeded.contains(&c.message.message_id)) {
                let mut updated = candidate.message.clone();
                updated.archived = true;
                updated.archive_date = Some(now);
                updated.archive_location = Some("provider".to_string());
                updated.labels.insert(ARCHIVED_LABEL.to_string());
                updated.labels.remove(INBOX_LABEL);
                self.storage.upsert_message(&updated)?;
            }
            self.storage.insert_archive_record(&ArchiveRecord {
                id: crate::new_id!(),
                rule_id: None,
                message_ids: result.succeeded.clone(),
                method: "provider".to_string(),
                location: None,
                size_bytes: 0,
                restorable: true,
                created_at: now,
            })?;
            tracing::info!(user_id, count = result.succeeded.len(), "archived messages via provider");
        }
        Ok(())
    }

    async fn execute_provider_delete(
        &self,
        candidates: &[&CleanupCandidate],
        user_id: &str,
        outcome: &mut ExecutionOutcome,
    ) -> AppResult<()> {
        let ids: Vec<String> = candidates.iter().map(|c| c.message.message_id.clone()).collect();
        let result = self.provider.delete(&ids).await?;
        outcome.succeeded += result.succeeded.len();
        outcome.failed += result.failed.len();
        for (_, err) in &result.failed {
            outcome.chunk_errors.push(err.clone());
        }
        for message_id in &result.succeeded {
            self.storage.delete_message(message_id)?;
        }
        if !result.succeeded.is_empty() {
            self.storage.insert_archive_record(&ArchiveRecord {
                id: crate::new_id!(),
                rule_id: None,
                message_ids: result.succeeded.clone(),
                method: "delete".to_string(),
                location: None,
                size_bytes: 0,
                restorable: false,
                created_at: crate::utc_now!(),
            })?;
            tracing::info!(user_id, count = result.succeeded.len(), "deleted messages via provider");
        }
        Ok(())
    }

    fn execute_export(
        &self,
        candidates: &[&CleanupCandidate],
        user_id: &str,
        output_path: &str,
        outcome: &mut ExecutionOutcome,
    ) -> AppResult<()> {
        // Every candidate here comes from a policy with method=export, so
        // they share one export_format (validated at policy creation); the
        // first candidate's format stands for the whole chunk.
        let format = match candidates.first().and_then(|c| c.export_format) {
            Some(PolicyExportFormat::Json) | None => export::ExportFormat::Json,
            Some(PolicyExportFormat::Mbox) => export::ExportFormat::Mbox,
            Some(PolicyExportFormat::Csv) => export::ExportFormat::Csv,
        };
        let messages: Vec<_> = candidates.iter().map(|c| c.message.clone()).collect();
        export::export_messages(&self.storage, user_id, &messages, format, output_path)?;
        outcome.succeeded += messages.len();
        Ok(())
    }

    /// Archives arbitrary message ids directly, outside of any policy
    /// evaluation - the path used by the `archive_emails` tool rather than
    /// the scheduled/continuous cleanup loop.
    pub async fn archive_messages(&self, message_ids: &[String], user_id: &str) -> AppResult<ExecutionOutcome> {
        let add: BTreeSet<String> = [ARCHIVED_LABEL.to_string()].into();
        let remove: BTreeSet<String> = [INBOX_LABEL.to_string()].into();
        let result = self.provider.batch_modify(message_ids, &add, &remove).await?;
        let outcome = ExecutionOutcome {
            planned: message_ids.len(),
            succeeded: result.succeeded.len(),
            failed: result.failed.len(),
            chunk_errors: result.failed.iter().map(|(_, e)| e.clone()).collect(),
            dry_run: false,
        };

        if !result.succeeded.is_empty() {
            let now = crate::utc_now!();
            for message_id in &result.succeeded {
                if let Some(mut msg) = self.storage.get_message(message_id)? {
                    msg.archived = true;
                    msg.archive_date = Some(now);
                    msg.archive_location = Some("provider".to_string());
                    msg.labels.insert(ARCHIVED_LABEL.to_string());
                    msg.labels.remove(INBOX_LABEL);
                    self.storage.upsert_message(&msg)?;
                }
            }
            self.storage.insert_archive_record(&ArchiveRecord {
                id: crate::new_id!(),
                rule_id: None,
                message_ids: result.succeeded.clone(),
                method: "provider".to_string(),
                location: None,
                size_bytes: 0,
                restorable: true,
                created_at: now,
            })?;
            tracing::info!(user_id, count = result.succeeded.len(), "archived messages directly");
        }
        Ok(outcome)
    }

    /// Deletes arbitrary message ids directly, outside of any policy
    /// evaluation - the path used by the `delete_emails` tool.
    pub async fn delete_messages(&self, message_ids: &[String], user_id: &str) -> AppResult<ExecutionOutcome> {
        let result = self.provider.delete(message_ids).await?;
        let outcome = ExecutionOutcome {
            planned: message_ids.len(),
            succeeded: result.succeeded.len(),
            failed: result.failed.len(),
            chunk_errors: result.failed.iter().map(|(_, e)| e.clone()).collect(),
            dry_run: false,
        };
        for message_id in &result.succeeded {
            self.storage.delete_message(message_id)?;
        }
        if !result.succeeded.is_empty() {
            self.storage.insert_archive_record(&ArchiveRecord {
                id: crate::new_id!(),
                rule_id: None,
                message_ids: result.succeeded.clone(),
                method: "delete".to_string(),
                location: None,
                size_bytes: 0,
                restorable: false,
                created_at: crate::utc_now!(),
            })?;
            tracing::info!(user_id, count = result.succeeded.len(), "deleted messages directly");
        }
        Ok(outcome)
    }

    /// Reverses archive: removes `ARCHIVED`, re-adds `restore_labels`
    /// (default `INBOX`), and MUST preserve any pre-archive labels not
    /// explicitly removed.
    pub async fn restore(&self, message_id: &str, restore_labels: Option<Vec<String>>) -> AppResult<()> {
        let mut msg = self
            .storage
            .get_message(message_id)?
            .ok_or_else(|| crate::raise_error!(format!("message not found: {message_id}"), crate::modules::error::code::ErrorCode::ResourceNotFound))?;

        let add_labels: BTreeSet<String> = restore_labels.unwrap_or_else(|| vec![INBOX_LABEL.to_string()]).into_iter().collect();
        let remove_labels: BTreeSet<String> = [ARCHIVED_LABEL.to_string()].into();

        self.provider.modify(message_id, &add_labels, &remove_labels).await?;

        for label in &add_labels {
            msg.labels.insert(label.clone());
        }
        msg.labels.remove(ARCHIVED_LABEL);
        msg.archived = false;
        msg.archive_date = None;
        msg.archive_location = None;
        self.storage.upsert_message(&msg)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::cleanup::evaluate::CleanupCandidate;
    use crate::modules::mail::message::MessageIndex;
    use crate::modules::provider::ModifyOutcome;
    use crate::modules::staleness::scorer::{FactorBreakdown, Recommendation};
    use crate::modules::staleness::StalenessScore;
    use r2d2_sqlite::SqliteConnectionManager;
    use std::collections::BTreeSet as Set;

    struct FakeProvider;

    #[async_trait::async_trait]
    impl MailProvider for FakeProvider {
        async fn batch_modify(&self, message_ids: &[String], _add: &Set<String>, _remove: &Set<String>) -> AppResult<ModifyOutcome> {
            Ok(ModifyOutcome { succeeded: message_ids.to_vec(), failed: vec![] })
        }
        async fn modify(&self, _message_id: &str, _add: &Set<String>, _remove: &Set<String>) -> AppResult<()> {
            Ok(())
        }
        async fn trash(&self, message_ids: &[String]) -> AppResult<ModifyOutcome> {
            Ok(ModifyOutcome { succeeded: message_ids.to_vec(), failed: vec![] })
        }
        async fn delete(&self, message_ids: &[String]) -> AppResult<ModifyOutcome> {
            Ok(ModifyOutcome { succeeded: message_ids.to_vec(), failed: vec![] })
        }
        async fn purge_trash(&self) -> AppResult<()> {
            Ok(())
        }
    }

    fn fixture_storage() -> (tempfile::TempDir, Arc<UserStorageHandle>) {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("user.db");
        let manager = SqliteConnectionManager::file(&db_path);
        let pool = r2d2::Pool::new(manager).expect("sqlite pool");
        {
            let conn = pool.get().expect("pooled conn");
            crate::modules::storage::migrations::migrate_user_db(&conn).expect("migrate");
        }
        (dir, Arc::new(UserStorageHandle::new("u1".to_string(), pool)))
    }

    fn message(id: &str) -> MessageIndex {
        MessageIndex {
            message_id: id.into(),
            thread_id: "".into(),
            subject: "s".into(),
            sender: "a@example.com".into(),
            recipients: vec![],
            date: None,
            year: None,
            size_bytes: 0,
            has_attachments: false,
            labels: Set::from(["INBOX".to_string()]),
            snippet: "".into(),
            archived: false,
            archive_date: None,
            archive_location: None,
            importance: None,
            date_size: None,
            label_classifier: None,
            analysis_version: None,
            analysis_timestamp: None,
        }
    }

    fn candidate(msg: MessageIndex, action: ActionType) -> CleanupCandidate {
        CleanupCandidate {
            message: msg,
            policy_id: "p1".into(),
            staleness_score: StalenessScore {
                total_score: 0.9,
                factors: FactorBreakdown { age_score: 1.0, importance_score: 0.0, size_penalty: 0.0, spam_score: 0.0, access_score: 1.0 },
                recommendation: Recommendation::Delete,
                confidence: 1.0,
            },
            recommended_action: action,
            method: ActionMethod::Provider,
            export_format: None,
        }
    }

    /// Invariant 6: dry-run never mutates storage or calls the provider.
    #[tokio::test]
    async fn dry_run_is_pure() {
        let (_dir, storage) = fixture_storage();
        storage.upsert_message(&message("m1")).unwrap();
        let executor = CleanupExecutor::new(storage.clone(), Arc::new(FakeProvider));

        let candidates = vec![candidate(message("m1"), ActionType::Delete)];
        let outcome = executor.execute(&candidates, 100, true, "u1", None).await.unwrap();

        assert!(outcome.dry_run);
        assert_eq!(outcome.planned, 1);
        assert_eq!(outcome.succeeded, 0);
        assert!(storage.get_message("m1").unwrap().is_some());
        assert!(storage.list_archive_records(10).unwrap().is_empty());
    }

    /// Invariant 7: archiving then restoring with the same labels restores
    /// the message's pre-archive state.
    #[tokio::test]
    async fn round_trip_archive_restore() {
        let (_dir, storage) = fixture_storage();
        storage.upsert_message(&message("m1")).unwrap();
        let executor = CleanupExecutor::new(storage.clone(), Arc::new(FakeProvider));

        let candidates = vec![candidate(message("m1"), ActionType::Archive)];
        executor.execute(&candidates, 100, false, "u1", None).await.unwrap();
        let archived = storage.get_message("m1").unwrap().unwrap();
        assert!(archived.archived);
        assert!(archived.labels.contains(ARCHIVED_LABEL));
        assert!(!archived.labels.contains(INBOX_LABEL));

        executor.restore("m1", Some(vec![INBOX_LABEL.to_string()])).await.unwrap();
        let restored = storage.get_message("m1").unwrap().unwrap();
        assert!(!restored.archived);
        assert!(restored.archive_date.is_none());
        assert!(restored.labels.contains(INBOX_LABEL));
        assert!(!restored.labels.contains(ARCHIVED_LABEL));
    }
}
