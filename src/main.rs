use std::sync::Arc;

use mimalloc::MiMalloc;
use tracing::info;

use crate::modules::context::app::AppContext;
use crate::modules::context::Initialize;
use crate::modules::error::AppResult;
use crate::modules::jobs::queue::JobQueue;
use crate::modules::jobs::worker::{Worker, JOB_TYPE_CATEGORIZE, JOB_TYPE_CLEANUP};
use crate::modules::provider::gmail::LazyGmailProvider;
use crate::modules::provider::MailProvider;
use crate::modules::settings::cli::SETTINGS;
use crate::modules::settings::dir::DataDirManager;
use crate::modules::storage::factory::StorageFactory;
use crate::modules::user::registry::UserRegistry;
use crate::modules::{automation, logger, mcp};

mod modules;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> AppResult<()> {
    logger::initialize_logging();
    info!("starting inbox-curator");
    info!(version = env!("CARGO_PKG_VERSION"));

    let ctx = initialize().await?;
    spawn_background_tasks(ctx.clone());

    mcp::server::serve(ctx).await
}

async fn initialize() -> AppResult<Arc<AppContext>> {
    DataDirManager::initialize().await?;

    let storage = StorageFactory::initialize()?;
    let users = Arc::new(UserRegistry::new(&storage));
    let jobs = Arc::new(JobQueue::new(storage.clone()));
    let automation = automation::engine::AutomationEngine::new(storage.clone());

    let mail_provider_factory: Arc<dyn Fn(&str) -> Arc<dyn MailProvider> + Send + Sync> =
        Arc::new(|user_id: &str| -> Arc<dyn MailProvider> { Arc::new(LazyGmailProvider::new(user_id)) });

    Ok(AppContext::new(storage, jobs, users, automation, mail_provider_factory))
}

/// Workers and the automation engine run for the lifetime of the process;
/// none of them are awaited here since this process's useful work is the
/// MCP stdio loop started by the caller.
fn spawn_background_tasks(ctx: Arc<AppContext>) {
    for _ in 0..SETTINGS.curator_categorization_workers {
        tokio::spawn(Worker::new(JOB_TYPE_CATEGORIZE).run(ctx.clone()));
    }
    for _ in 0..SETTINGS.curator_cleanup_workers {
        tokio::spawn(Worker::new(JOB_TYPE_CLEANUP).run(ctx.clone()));
    }
    tokio::spawn(ctx.automation.clone().run(ctx.clone()));
}
