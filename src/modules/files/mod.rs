pub mod access_control;
pub mod export;
pub mod model;
