//! Cross-supplier product matching.

pub mod grouping;
pub mod normalize;
pub mod similarity;

pub use grouping::{GroupingStrategy, MatchThresholds, ProductMatcher};
pub use similarity::TermVectorSimilarity;
