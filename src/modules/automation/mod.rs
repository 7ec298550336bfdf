pub mod continuous;
pub mod engine;
pub mod triggers;
