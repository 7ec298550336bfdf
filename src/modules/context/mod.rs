pub mod app;

use crate::modules::error::AppResult;

/// A startup-time initializer. Process-wide, non-user-scoped singletons
/// (logging, data directories, settings) still use this; anything that
/// touches user data is constructed inside [`app::AppContext`] instead,
/// per the no-singletons design note.
pub trait Initialize {
    async fn initialize() -> AppResult<()>;
}

/// A periodic background task started once at process startup.
pub trait PeriodicTask {
    fn start(ctx: std::sync::Arc<app::AppContext>);
}
