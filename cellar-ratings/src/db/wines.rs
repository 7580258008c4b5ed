//! Wine identity and aggregate columns

use crate::error::RatingsResult;
use crate::types::{AggregateIndices, ConfidenceLevel, Wine, WineColour, WineId};
use cellar_common::Error;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, FromRow)]
struct WineRow {
    id: i64,
    wine_name: String,
    producer: Option<String>,
    vintage: Option<i32>,
    country: Option<String>,
    region: Option<String>,
    colour: String,
    style: Option<String>,
}

impl From<WineRow> for Wine {
    fn from(row: WineRow) -> Self {
        Self {
            id: row.id,
            name: row.wine_name,
            producer: row.producer,
            vintage: row.vintage,
            country: row.country,
            region: row.region,
            colour: WineColour::parse(&row.colour),
            style: row.style,
        }
    }
}

/// Aggregate columns as last written
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAggregates {
    pub indices: AggregateIndices,
    pub ratings_updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct AggregateRow {
    competition_index: Option<f64>,
    critics_index: Option<f64>,
    community_index: Option<f64>,
    purchase_score: Option<f64>,
    purchase_stars: Option<f64>,
    confidence_level: Option<String>,
    ratings_updated_at: Option<DateTime<Utc>>,
}

/// Load a wine's identity
///
/// # Errors
/// `NotFound` when no row has this id.
pub async fn load_wine(pool: &SqlitePool, wine_id: WineId) -> RatingsResult<Wine> {
    let row: Option<WineRow> = sqlx::query_as(
        "SELECT id, wine_name, producer, vintage, country, region, colour, style
         FROM wines WHERE id = ?",
    )
    .bind(wine_id)
    .fetch_optional(pool)
    .await?;

    row.map(Wine::from)
        .ok_or_else(|| Error::NotFound(format!("wine {}", wine_id)).into())
}

/// Insert a wine's identity columns, returning the new id (`wine.id` is ignored)
pub async fn insert_wine(pool: &SqlitePool, wine: &Wine) -> RatingsResult<WineId> {
    let result = sqlx::query(
        "INSERT INTO wines (wine_name, producer, vintage, country, region, colour, style)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&wine.name)
    .bind(&wine.producer)
    .bind(wine.vintage)
    .bind(&wine.country)
    .bind(&wine.region)
    .bind(wine.colour.as_str())
    .bind(&wine.style)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Overwrite every aggregate column
pub async fn update_aggregates(
    pool: &SqlitePool,
    wine_id: WineId,
    indices: &AggregateIndices,
) -> RatingsResult<()> {
    let result = sqlx::query(
        "UPDATE wines SET
            competition_index = ?,
            critics_index = ?,
            community_index = ?,
            purchase_score = ?,
            purchase_stars = ?,
            confidence_level = ?,
            ratings_updated_at = ?
         WHERE id = ?",
    )
    .bind(indices.competition_index)
    .bind(indices.critics_index)
    .bind(indices.community_index)
    .bind(indices.purchase_score)
    .bind(indices.purchase_stars)
    .bind(indices.confidence_level.as_str())
    .bind(Utc::now())
    .bind(wine_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("wine {}", wine_id)).into());
    }
    Ok(())
}

pub async fn load_aggregates(pool: &SqlitePool, wine_id: WineId) -> RatingsResult<StoredAggregates> {
    let row: Option<AggregateRow> = sqlx::query_as(
        "SELECT competition_index, critics_index, community_index, purchase_score,
                purchase_stars, confidence_level, ratings_updated_at
         FROM wines WHERE id = ?",
    )
    .bind(wine_id)
    .fetch_optional(pool)
    .await?;

    let row = row.ok_or_else(|| Error::NotFound(format!("wine {}", wine_id)))?;
    Ok(StoredAggregates {
        indices: AggregateIndices {
            competition_index: row.competition_index,
            critics_index: row.critics_index,
            community_index: row.community_index,
            purchase_score: row.purchase_score,
            purchase_stars: row.purchase_stars,
            confidence_level: row
                .confidence_level
                .as_deref()
                .map(ConfidenceLevel::parse)
                .unwrap_or(ConfidenceLevel::Unrated),
        },
        ratings_updated_at: row.ratings_updated_at,
    })
}
