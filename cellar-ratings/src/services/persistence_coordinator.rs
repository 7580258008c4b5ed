//! Persistence Coordinator
//!
//! Replaces a wine's fetched ratings with a new set, atomically.
//!
//! - Existing fetched ratings are only deleted when at least one new row is
//!   actually stored; otherwise everything is left as it was.
//! - User override rows are never deleted, and new rows whose key collides
//!   with an override are skipped.
//! - Each row is inserted inside its own savepoint, so one malformed row is
//!   skipped without losing the rest.

use crate::db::ratings::{self, storage_key, StoredRating};
use crate::error::{RatingsError, RatingsResult};
use crate::types::{NormalizedRating, WineId};
use chrono::Utc;
use sqlx::{Connection, SqlitePool};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// What a commit did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub inserted_count: usize,
    /// Rows present after the commit that predate it (overrides, or everything when nothing was replaced)
    pub kept_existing_count: usize,
    /// Fetched rows removed by the replacement
    pub replaced_count: usize,
    /// New rows not stored (override collision or failed insert)
    pub skipped_count: usize,
    pub committed: bool,
    pub message: String,
}

impl CommitSummary {
    fn preserved(existing: usize, skipped: usize, reason: &str) -> Self {
        Self {
            inserted_count: 0,
            kept_existing_count: existing,
            replaced_count: 0,
            skipped_count: skipped,
            committed: false,
            message: format!("{}, {} existing preserved", reason, existing),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PersistenceCoordinator {
    pool: SqlitePool,
}

impl PersistenceCoordinator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Replace `existing` fetched ratings with `new_ratings`
    ///
    /// # Errors
    /// `PersistenceConflict` if the transaction cannot be opened or committed;
    /// the database is unchanged in that case.
    pub async fn commit(
        &self,
        wine_id: WineId,
        new_ratings: &[NormalizedRating],
        existing: &[StoredRating],
    ) -> RatingsResult<CommitSummary> {
        let overrides: HashSet<(String, Option<i32>)> = existing
            .iter()
            .filter(|row| row.is_user_override)
            .map(StoredRating::storage_key)
            .collect();

        let (insertable, shadowed): (Vec<&NormalizedRating>, Vec<&NormalizedRating>) = new_ratings
            .iter()
            .partition(|rating| !overrides.contains(&storage_key(rating)));

        for rating in &shadowed {
            debug!(
                wine_id,
                source = %rating.source_key,
                "Skipping rating that collides with a user override"
            );
        }

        if insertable.is_empty() {
            info!(wine_id, existing = existing.len(), "No new ratings, existing preserved");
            return Ok(CommitSummary::preserved(
                existing.len(),
                shadowed.len(),
                "no new ratings found",
            ));
        }

        let mut tx = self.pool.begin().await.map_err(conflict)?;
        let replaced = ratings::delete_fetched_ratings(&mut tx, wine_id)
            .await
            .map_err(|e| RatingsError::PersistenceConflict(e.to_string()))?;

        let fetched_at = Utc::now();
        let mut inserted = 0usize;
        let mut failed = 0usize;

        for rating in &insertable {
            let mut savepoint = tx.begin().await.map_err(conflict)?;
            match ratings::insert_rating(&mut savepoint, wine_id, rating, fetched_at).await {
                Ok(_) => {
                    savepoint.commit().await.map_err(conflict)?;
                    inserted += 1;
                }
                Err(e) => {
                    warn!(
                        wine_id,
                        source = %rating.source_key,
                        error = %e,
                        "Rating row rejected by store, skipping"
                    );
                    savepoint.rollback().await.map_err(conflict)?;
                    failed += 1;
                }
            }
        }

        let skipped = shadowed.len() + failed;
        if inserted == 0 {
            tx.rollback().await.map_err(conflict)?;
            warn!(wine_id, failed, "No rating could be stored, existing preserved");
            return Ok(CommitSummary::preserved(
                existing.len(),
                skipped,
                "no new ratings could be stored",
            ));
        }

        tx.commit().await.map_err(conflict)?;

        let kept = existing.iter().filter(|row| row.is_user_override).count();
        info!(
            wine_id,
            inserted,
            replaced,
            kept_overrides = kept,
            skipped,
            "Ratings committed"
        );

        Ok(CommitSummary {
            inserted_count: inserted,
            kept_existing_count: kept,
            replaced_count: replaced as usize,
            skipped_count: skipped,
            committed: true,
            message: format!(
                "stored {} new ratings, replaced {}, kept {} overrides",
                inserted, replaced, kept
            ),
        })
    }
}

fn conflict(e: sqlx::Error) -> RatingsError {
    RatingsError::PersistenceConflict(e.to_string())
}
