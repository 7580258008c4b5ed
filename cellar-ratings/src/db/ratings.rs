//! `wine_ratings` rows
//!
//! Rows are identified by `(wine_id, lower(source), competition_year)`. Rows
//! with `is_user_override` set are owned by the user and only ever read here.

use crate::error::RatingsResult;
use crate::scoring::{RatingPoint, RatingSource};
use crate::types::{NormalizedRating, NormalizedScore, RatingLens, VintageMatch, WineId};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

/// A persisted rating
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct StoredRating {
    pub id: i64,
    pub wine_id: WineId,
    /// Vintage the rating applies to
    pub vintage: Option<i32>,
    pub source: String,
    pub source_lens: String,
    pub score_type: String,
    pub raw_score: String,
    pub normalized_min: f64,
    pub normalized_max: f64,
    pub normalized_mid: f64,
    pub award_name: Option<String>,
    pub competition_year: Option<i32>,
    pub rating_count: Option<i64>,
    pub source_url: Option<String>,
    pub evidence_excerpt: Option<String>,
    pub matched_wine_label: Option<String>,
    pub vintage_match: Option<String>,
    pub match_confidence: Option<f64>,
    pub identity_score: Option<f64>,
    pub identity_reason: Option<String>,
    pub is_user_override: bool,
    pub fetched_at: DateTime<Utc>,
}

impl StoredRating {
    /// Storage key: lower-cased source plus competition year
    pub fn storage_key(&self) -> (String, Option<i32>) {
        (self.source.to_lowercase(), self.competition_year)
    }

    pub fn lens(&self) -> RatingLens {
        RatingLens::parse(&self.source_lens).unwrap_or(RatingLens::Critics)
    }
}

/// Storage key of a rating that has not been written yet
pub fn storage_key(rating: &NormalizedRating) -> (String, Option<i32>) {
    (rating.source_key.to_lowercase(), rating.candidate.competition_year)
}

impl From<&StoredRating> for RatingPoint {
    fn from(row: &StoredRating) -> Self {
        Self {
            lens: row.lens(),
            mid: row.normalized_mid,
            credibility: RatingSource::resolve(&row.source).credibility(),
            inferred: row
                .vintage_match
                .as_deref()
                .and_then(VintageMatch::parse)
                == Some(VintageMatch::Inferred),
        }
    }
}

/// User-entered rating, never replaced by a refresh
#[derive(Debug, Clone, PartialEq)]
pub struct UserOverride {
    pub source: String,
    pub lens: RatingLens,
    pub score_type: String,
    pub raw_score: String,
    pub score: NormalizedScore,
    pub competition_year: Option<i32>,
}

/// All ratings for a wine, overrides first
pub async fn load_ratings(pool: &SqlitePool, wine_id: WineId) -> RatingsResult<Vec<StoredRating>> {
    let rows = sqlx::query_as::<_, StoredRating>(
        "SELECT * FROM wine_ratings WHERE wine_id = ?
         ORDER BY is_user_override DESC, id ASC",
    )
    .bind(wine_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Delete every fetched (non-override) rating for a wine
pub async fn delete_fetched_ratings(conn: &mut SqliteConnection, wine_id: WineId) -> RatingsResult<u64> {
    let result = sqlx::query("DELETE FROM wine_ratings WHERE wine_id = ? AND is_user_override = 0")
        .bind(wine_id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}

/// Insert one fetched rating
pub async fn insert_rating(
    conn: &mut SqliteConnection,
    wine_id: WineId,
    rating: &NormalizedRating,
    fetched_at: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    let c = &rating.candidate;
    let result = sqlx::query(
        "INSERT INTO wine_ratings (
            wine_id, vintage, source, source_lens, score_type, raw_score,
            normalized_min, normalized_max, normalized_mid,
            award_name, competition_year, rating_count, source_url, evidence_excerpt,
            matched_wine_label, vintage_match, match_confidence, identity_score, identity_reason,
            is_user_override, fetched_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)",
    )
    .bind(wine_id)
    .bind(rating.rated_vintage)
    .bind(&rating.source_key)
    .bind(rating.lens.as_str())
    .bind(&c.score_type)
    .bind(&c.raw_score)
    .bind(rating.score.min)
    .bind(rating.score.max)
    .bind(rating.score.mid)
    .bind(&c.award_name)
    .bind(c.competition_year)
    .bind(c.rating_count)
    .bind(&c.source_url)
    .bind(&c.evidence_excerpt)
    .bind(&c.matched_wine_label)
    .bind(c.vintage_match.map(VintageMatch::as_str))
    .bind(c.match_confidence)
    .bind(c.identity_score)
    .bind(&c.identity_reason)
    .bind(fetched_at)
    .execute(conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Insert a user override row
pub async fn insert_user_override(
    pool: &SqlitePool,
    wine_id: WineId,
    entry: &UserOverride,
) -> RatingsResult<i64> {
    let result = sqlx::query(
        "INSERT INTO wine_ratings (
            wine_id, source, source_lens, score_type, raw_score,
            normalized_min, normalized_max, normalized_mid, competition_year,
            is_user_override, fetched_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?)",
    )
    .bind(wine_id)
    .bind(&entry.source)
    .bind(entry.lens.as_str())
    .bind(&entry.score_type)
    .bind(&entry.raw_score)
    .bind(entry.score.min)
    .bind(entry.score.max)
    .bind(entry.score.mid)
    .bind(entry.competition_year)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::wines::insert_wine;
    use crate::types::{RatingCandidate, Wine};

    async fn setup_test_db() -> (SqlitePool, WineId) {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        cellar_common::db::create_schema(&pool).await.unwrap();
        let wine_id = insert_wine(&pool, &Wine::new(0, "Estate Reserve", Some(2018)))
            .await
            .unwrap();
        (pool, wine_id)
    }

    fn rating(source: &str, mid: f64) -> NormalizedRating {
        NormalizedRating {
            candidate: RatingCandidate::new(source, "100pt", mid.to_string())
                .with_label("Estate Reserve 2018")
                .with_vintage_match(VintageMatch::Inferred),
            source_key: source.to_string(),
            lens: RatingLens::Critics,
            score: NormalizedScore::point(mid).unwrap(),
            credibility: 1.0,
            rated_vintage: Some(2017),
        }
    }

    #[tokio::test]
    async fn test_insert_and_load() {
        let (pool, wine_id) = setup_test_db().await;
        let mut conn = pool.acquire().await.unwrap();
        insert_rating(&mut conn, wine_id, &rating("wine_spectator", 93.0), Utc::now())
            .await
            .unwrap();
        drop(conn);

        let rows = load_ratings(&pool, wine_id).await.unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.source, "wine_spectator");
        assert_eq!(row.vintage, Some(2017));
        assert_eq!(row.normalized_mid, 93.0);
        assert_eq!(row.vintage_match.as_deref(), Some("inferred"));
        assert!(!row.is_user_override);

        let point = RatingPoint::from(row);
        assert_eq!(point.lens, RatingLens::Critics);
        assert!(point.inferred);
    }

    #[tokio::test]
    async fn test_delete_keeps_overrides() {
        let (pool, wine_id) = setup_test_db().await;
        let mut conn = pool.acquire().await.unwrap();
        insert_rating(&mut conn, wine_id, &rating("vinous", 91.0), Utc::now())
            .await
            .unwrap();
        drop(conn);
        insert_user_override(
            &pool,
            wine_id,
            &UserOverride {
                source: "my_notes".to_string(),
                lens: RatingLens::Critics,
                score_type: "100pt".to_string(),
                raw_score: "95".to_string(),
                score: NormalizedScore::point(95.0).unwrap(),
                competition_year: None,
            },
        )
        .await
        .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(delete_fetched_ratings(&mut conn, wine_id).await.unwrap(), 1);
        drop(conn);

        let rows = load_ratings(&pool, wine_id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_user_override);
        assert_eq!(rows[0].storage_key(), ("my_notes".to_string(), None));
    }
}
