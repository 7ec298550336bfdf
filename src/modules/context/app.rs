use std::sync::Arc;

use crate::modules::automation::engine::AutomationEngine;
use crate::modules::jobs::queue::JobQueue;
use crate::modules::provider::MailProvider;
use crate::modules::storage::factory::StorageFactory;
use crate::modules::user::registry::UserRegistry;

/// The single process-wide context, constructed once in `main` and passed by
/// `Arc` reference to every component. Nothing here is a `LazyLock` global -
/// anything that touches user data is reached only through this struct, per
/// the no-singletons design note.
pub struct AppContext {
    pub storage: Arc<StorageFactory>,
    pub jobs: Arc<JobQueue>,
    pub users: Arc<UserRegistry>,
    pub automation: Arc<AutomationEngine>,
    pub mail_provider_factory: Arc<dyn Fn(&str) -> Arc<dyn MailProvider> + Send + Sync>,
}

impl AppContext {
    pub fn new(
        storage: Arc<StorageFactory>,
        jobs: Arc<JobQueue>,
        users: Arc<UserRegistry>,
        automation: Arc<AutomationEngine>,
        mail_provider_factory: Arc<dyn Fn(&str) -> Arc<dyn MailProvider> + Send + Sync>,
    ) -> Arc<Self> {
        Arc::new(Self {
            storage,
            jobs,
            users,
            automation,
            mail_provider_factory,
        })
    }

    pub fn mail_provider_for(&self, user_id: &str) -> Arc<dyn MailProvider> {
        (self.mail_provider_factory)(user_id)
    }
}
