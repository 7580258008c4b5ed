//! Ratings Service
//!
//! End-to-end refresh for one wine:
//! load wine → identity tokens → tier waterfall → normalize → reconcile →
//! commit (replace-only-on-success) → recompute aggregates.
//!
//! Only persistence failures surface as errors; everything upstream is
//! reported in the [`RefreshReport`].

use crate::config::{resolve_rating_preference, RatingsConfig};
use crate::db::{ratings, wines};
use crate::error::RatingsResult;
use crate::resolution::{rated_vintage, IdentityTokenSet, RejectedCandidate, TierOrchestrator};
use crate::scoring::{reconcile, AggregationConfig, Aggregator, RatingPoint, ScoreNormalizer};
use crate::services::persistence_coordinator::PersistenceCoordinator;
use crate::types::{AggregateIndices, NormalizedRating, RatingCandidate, Wine, WineId};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Outcome of one wine refresh
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub wine_id: WineId,
    /// Winning tier, last tier attempted, or "none"
    pub used_method: String,
    pub inserted: usize,
    pub kept_existing: usize,
    pub replaced: usize,
    /// Candidates dropped because their score could not be normalized
    pub skipped_normalization: usize,
    /// Candidates dropped by identity validation or the vintage filter
    #[serde(skip)]
    pub rejected: Vec<RejectedCandidate>,
    pub search_notes: String,
    pub tasting_notes: Option<String>,
    pub aggregates: AggregateIndices,
    pub cancelled: bool,
    pub message: String,
}

pub struct RatingsService {
    pool: SqlitePool,
    orchestrator: Arc<TierOrchestrator>,
    normalizer: ScoreNormalizer,
    aggregator: Aggregator,
    aggregation: AggregationConfig,
    persistence: PersistenceCoordinator,
}

impl RatingsService {
    pub fn new(pool: SqlitePool, orchestrator: Arc<TierOrchestrator>, config: &RatingsConfig) -> Self {
        Self {
            persistence: PersistenceCoordinator::new(pool.clone()),
            pool,
            orchestrator,
            normalizer: ScoreNormalizer::new(),
            aggregator: Aggregator::new(config.aggregation.clone()),
            aggregation: config.aggregation.clone(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Resolve, persist and re-aggregate ratings for one wine
    ///
    /// # Errors
    /// `NotFound` for an unknown wine, `PersistenceConflict` when the commit
    /// fails. Tier failures never surface here.
    pub async fn refresh_wine(
        &self,
        wine_id: WineId,
        cancel: &CancellationToken,
    ) -> RatingsResult<RefreshReport> {
        let wine = wines::load_wine(&self.pool, wine_id).await?;
        let tokens = IdentityTokenSet::from_wine(&wine);

        let resolution = self.orchestrator.resolve(&wine, &tokens, cancel).await;
        let search_notes = resolution.notes();
        let mut rejected = resolution.rejected;

        let (normalized, skipped_normalization) = self.normalize_all(&wine, resolution.ratings, &mut rejected);
        let unique = reconcile(normalized);

        let existing = ratings::load_ratings(&self.pool, wine_id).await?;
        let summary = self.persistence.commit(wine_id, &unique, &existing).await?;

        let aggregates = self.recompute_aggregates(wine_id).await?;

        info!(
            wine_id,
            used_method = %resolution.used_method,
            inserted = summary.inserted_count,
            skipped_normalization,
            rejected = rejected.len(),
            "Wine ratings refreshed"
        );

        Ok(RefreshReport {
            wine_id,
            used_method: resolution.used_method,
            inserted: summary.inserted_count,
            kept_existing: summary.kept_existing_count,
            replaced: summary.replaced_count,
            skipped_normalization,
            rejected,
            search_notes,
            tasting_notes: resolution.tasting_notes,
            aggregates,
            cancelled: resolution.cancelled,
            message: summary.message,
        })
    }

    /// Recompute and store aggregates from every stored rating
    pub async fn recompute_aggregates(&self, wine_id: WineId) -> RatingsResult<AggregateIndices> {
        let rows = ratings::load_ratings(&self.pool, wine_id).await?;
        let points: Vec<RatingPoint> = rows.iter().map(RatingPoint::from).collect();
        let preference = self.preference().await?;

        let indices = self.aggregator.aggregate(&points, preference);
        wines::update_aggregates(&self.pool, wine_id, &indices).await?;
        Ok(indices)
    }

    /// Effective preference weight (database setting, else configured default)
    pub async fn preference(&self) -> RatingsResult<u8> {
        Ok(resolve_rating_preference(&self.pool, &self.aggregation).await?)
    }

    fn normalize_all(
        &self,
        wine: &Wine,
        candidates: Vec<RatingCandidate>,
        rejected: &mut Vec<RejectedCandidate>,
    ) -> (Vec<NormalizedRating>, usize) {
        let mut normalized = Vec::with_capacity(candidates.len());
        let mut skipped = 0;

        for candidate in candidates {
            let vintage = rated_vintage(wine, &candidate);
            match self.normalizer.normalize_candidate(candidate.clone(), vintage) {
                Ok(rating) => normalized.push(rating),
                Err(e) => {
                    warn!(wine_id = wine.id, error = %e, "Skipping candidate");
                    skipped += 1;
                    rejected.push(RejectedCandidate {
                        candidate,
                        reason: e.to_string(),
                    });
                }
            }
        }

        (normalized, skipped)
    }
}
