use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::modules::error::{code::ErrorCode, AppResult};
use crate::modules::settings::cli::SETTINGS;
use crate::modules::settings::dir::DATA_DIR_MANAGER;
use crate::modules::storage::handle::UserStorageHandle;
use crate::modules::storage::{migrations, system_db};
use crate::raise_error;

struct CachedHandle {
    handle: Arc<UserStorageHandle>,
    expires_at: Instant,
}

/// `UserDatabaseManagerFactory` equivalent: the only way the rest of the
/// codebase reaches a user's database. `handle_for` is the sole entry
/// point; nothing else constructs a `UserStorageHandle`.
pub struct StorageFactory {
    cache: DashMap<String, CachedHandle>,
    ttl: Duration,
    system_pool: Pool<SqliteConnectionManager>,
}

impl StorageFactory {
    pub fn initialize() -> AppResult<Arc<Self>> {
        let manager = SqliteConnectionManager::file(&DATA_DIR_MANAGER.system_db);
        let system_pool = Pool::new(manager)
            .map_err(|e| raise_error!(format!("system db pool init failed: {e}"), ErrorCode::InternalError))?;
        {
            let conn = system_pool.get()?;
            system_db::migrate_system_db(&conn)?;
        }
        Ok(Arc::new(Self {
            cache: DashMap::new(),
            ttl: Duration::from_secs(SETTINGS.curator_cache_ttl_secs),
            system_pool,
        }))
    }

    pub fn system_pool(&self) -> Pool<SqliteConnectionManager> {
        self.system_pool.clone()
    }

    /// Returns a cached handle if present and unexpired, else opens and
    /// migrates the user's database. Migration failure here refuses to
    /// hand out a handle at all, matching the startup failure contract
    /// (except this happens lazily, per-user, on first use after startup).
    pub fn handle_for(&self, user_id: &str) -> AppResult<Arc<UserStorageHandle>> {
        if let Some(cached) = self.cache.get(user_id) {
            if cached.expires_at > Instant::now() {
                return Ok(cached.handle.clone());
            }
        }

        let db_path = DATA_DIR_MANAGER.user_db_path(user_id);
        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::new(manager)
            .map_err(|e| raise_error!(format!("user db pool init failed for {user_id}: {e}"), ErrorCode::InternalError))?;
        {
            let conn = pool.get()?;
            migrations::migrate_user_db(&conn)?;
        }

        let handle = Arc::new(UserStorageHandle::new(user_id.to_string(), pool));
        self.cache.insert(
            user_id.to_string(),
            CachedHandle { handle: handle.clone(), expires_at: Instant::now() + self.ttl },
        );
        Ok(handle)
    }

    /// Evicts a user's cached handle. Called on administrative user
    /// deletion; the next `handle_for` reopens from disk.
    pub fn invalidate(&self, user_id: &str) {
        self.cache.remove(user_id);
    }
}
