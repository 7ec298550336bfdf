use crate::modules::context::Initialize;
use crate::modules::error::{code::ErrorCode, AppResult};
use crate::modules::settings::cli::SETTINGS;
use crate::raise_error;
use std::path::PathBuf;
use std::sync::LazyLock;

pub static DATA_DIR_MANAGER: LazyLock<DataDirManager> =
    LazyLock::new(|| DataDirManager::new(PathBuf::from(&SETTINGS.curator_database_path)));

/// Resolves the on-disk layout from `§6 Persisted state layout`:
/// one database per user, a shared system database, and a token directory.
/// Callers never construct these paths themselves.
#[derive(Debug)]
pub struct DataDirManager {
    pub root_dir: PathBuf,
    pub users_dir: PathBuf,
    pub system_db: PathBuf,
    pub tokens_dir: PathBuf,
    pub archive_root: PathBuf,
    pub log_dir: PathBuf,
}

impl Initialize for DataDirManager {
    async fn initialize() -> AppResult<()> {
        for dir in [
            &DATA_DIR_MANAGER.root_dir,
            &DATA_DIR_MANAGER.users_dir,
            &DATA_DIR_MANAGER.tokens_dir,
            &DATA_DIR_MANAGER.archive_root,
            &DATA_DIR_MANAGER.log_dir,
        ] {
            std::fs::create_dir_all(dir)
                .map_err(|e| raise_error!(format!("{e:#?}"), ErrorCode::InternalError))?;
        }
        Ok(())
    }
}

impl DataDirManager {
    pub fn new(root_dir: PathBuf) -> Self {
        Self {
            users_dir: root_dir.join("users"),
            system_db: root_dir.join("system.db"),
            tokens_dir: root_dir.join("tokens"),
            archive_root: PathBuf::from(&SETTINGS.curator_archive_path),
            log_dir: root_dir.join("logs"),
            root_dir,
        }
    }

    pub fn user_db_path(&self, user_id: &str) -> PathBuf {
        self.users_dir.join(format!("{user_id}.db"))
    }

    pub fn user_archive_dir(&self, user_id: &str) -> PathBuf {
        self.archive_root.join(format!("user_{user_id}"))
    }

    pub fn token_path(&self, user_id: &str) -> PathBuf {
        self.tokens_dir.join(format!("{user_id}.token"))
    }
}
