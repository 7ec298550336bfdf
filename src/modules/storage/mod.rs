pub mod dao;
pub mod factory;
pub mod handle;
pub mod migrations;
pub mod system_db;

pub use handle::UserStorageHandle;
