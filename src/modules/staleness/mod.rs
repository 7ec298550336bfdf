pub mod scorer;

pub use scorer::{StalenessScore, StalenessScorer, StalenessWeights};
