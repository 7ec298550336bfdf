pub mod model;
pub mod queue;
pub mod worker;
