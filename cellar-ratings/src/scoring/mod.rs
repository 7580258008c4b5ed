//! Score handling: source registry, normalization, deduplication, aggregation

pub mod aggregator;
pub mod normalizer;
pub mod sources;

pub use aggregator::{dedup_key, reconcile, AggregationConfig, Aggregator, RatingPoint};
pub use normalizer::ScoreNormalizer;
pub use sources::{KnownSource, RatingSource, ScoreScale};
