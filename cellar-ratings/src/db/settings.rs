//! Settings database operations
//!
//! Key-value accessors over the shared `settings` table.

use cellar_common::{Error, Result};
use sqlx::{Pool, Sqlite};

/// Settings key holding the purchase-score preference weight
pub const RATING_PREFERENCE_KEY: &str = "rating_preference";

/// Get the rating preference weight (0-100)
///
/// **Returns:** `None` when not set, so the configured default applies
pub async fn get_rating_preference(db: &Pool<Sqlite>) -> Result<Option<u8>> {
    match get_setting::<u8>(db, RATING_PREFERENCE_KEY).await? {
        Some(value) if value > 100 => Err(Error::Config(format!(
            "{} is {}, must be 0-100",
            RATING_PREFERENCE_KEY, value
        ))),
        other => Ok(other),
    }
}

/// Set the rating preference weight (0 = critics and competitions, 100 = community)
pub async fn set_rating_preference(db: &Pool<Sqlite>, value: u8) -> Result<()> {
    if value > 100 {
        return Err(Error::InvalidInput(format!(
            "rating preference must be 0-100, got {}",
            value
        )));
    }
    set_setting(db, RATING_PREFERENCE_KEY, value).await
}

/// Generic setting getter (internal)
async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(Option<String>,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((Some(value),)) => {
            let parsed = value
                .trim()
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting {} failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        _ => Ok(None),
    }
}

/// Generic setting setter (internal)
async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
