use clap::Parser;
use std::sync::LazyLock;

#[cfg(not(test))]
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::parse);

#[cfg(test)]
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::new_for_test);

/// Process-wide configuration. Every field is optional with a sane default,
/// as required by the external-interface contract - nothing here is
/// per-user state, which always lives behind `UserDatabaseManagerFactory`.
#[derive(Debug, Parser)]
#[clap(
    name = "inbox-curator",
    about = "MCP-exposed Gmail categorization and cleanup service",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Settings {
    /// DATABASE_PATH - root directory holding `users/<id>.db` and `system.db`
    #[clap(long, env, default_value = "./data")]
    pub curator_database_path: String,

    /// ARCHIVE_PATH - root directory for exported files
    #[clap(long, env, default_value = "./data/archive")]
    pub curator_archive_path: String,

    /// STORAGE_PATH - root directory for tokens and misc on-disk state
    #[clap(long, env, default_value = "./data/storage")]
    pub curator_storage_path: String,

    /// LOG_LEVEL
    #[clap(long, env, default_value = "info")]
    pub curator_log_level: String,

    #[clap(long, env, default_value = "false")]
    pub curator_log_to_file: bool,

    #[clap(long, env, default_value = "true")]
    pub curator_ansi_logs: bool,

    /// CACHE_TTL (seconds) for the per-user storage handle cache
    #[clap(long, env, default_value = "1800")]
    pub curator_cache_ttl_secs: u64,

    /// Symmetric key used to encrypt OAuth tokens at rest
    #[clap(long, env, default_value = "change-me-in-production")]
    pub curator_encrypt_password: String,

    /// Gmail OAuth client id
    #[clap(long, env, default_value = "")]
    pub curator_gmail_client_id: String,

    /// Gmail OAuth client secret
    #[clap(long, env, default_value = "")]
    pub curator_gmail_client_secret: String,

    /// Gmail OAuth redirect URI
    #[clap(long, env, default_value = "http://localhost:15630/oauth2/callback")]
    pub curator_gmail_redirect_uri: String,

    /// Number of categorization workers (one per process is the floor; this
    /// bounds how many users can be categorizing concurrently)
    #[clap(long, env, default_value = "4")]
    pub curator_categorization_workers: usize,

    /// Number of cleanup workers
    #[clap(long, env, default_value = "4")]
    pub curator_cleanup_workers: usize,

    #[clap(long, env, default_value = "30")]
    pub curator_provider_call_timeout_secs: u64,

    #[clap(long, env, default_value = "120")]
    pub curator_provider_batch_deadline_secs: u64,
}

impl Settings {
    #[cfg(test)]
    pub fn new_for_test() -> Self {
        Settings::parse_from(Vec::<String>::new())
    }
}
