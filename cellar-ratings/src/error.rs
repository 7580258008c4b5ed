//! Error types for cellar-ratings
//!
//! Propagation policy: per-tier and per-candidate errors are downgraded to
//! "zero candidates from this stage" inside the pipeline. Only persistence
//! failures surface to the caller.

use crate::types::Tier;
use std::time::Duration;
use thiserror::Error;

/// Pipeline error type
#[derive(Debug, Error)]
pub enum RatingsError {
    /// Dependency temporarily disabled; the caller moves on to the next tier
    #[error("Circuit open for dependency '{dependency}'")]
    CircuitOpen { dependency: String },

    /// Tier provider did not finish within its budget
    #[error("{tier} timed out after {timeout:?}")]
    TierTimeout { tier: Tier, timeout: Duration },

    /// Tier provider raised an unexpected failure
    #[error("Provider error: {0}")]
    Provider(String),

    /// Ratings commit could not complete; nothing was changed
    #[error("Persistence conflict: {0}")]
    PersistenceConflict(String),

    /// Enrichment queue is full or shut down
    #[error("Enrichment queue unavailable: {0}")]
    QueueClosed(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Common error: {0}")]
    Common(#[from] cellar_common::Error),
}

/// Single-candidate normalization failure
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Cannot normalize {source_name} score {raw:?} ({scale}): {reason}")]
pub struct NormalizationError {
    pub source_name: String,
    pub raw: String,
    pub scale: &'static str,
    pub reason: String,
}

/// Errors a tier provider may raise for truly exceptional conditions
///
/// Expected misses (no results, paywalled content) are reported through an
/// empty `ProviderResponse`, not through this type.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    Parse(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ProviderError> for RatingsError {
    fn from(e: ProviderError) -> Self {
        RatingsError::Provider(e.to_string())
    }
}

/// Result type for pipeline operations
pub type RatingsResult<T> = Result<T, RatingsError>;
