//! Database initialization
//!
//! Opens (or creates) the SQLite database and makes sure every table used by
//! the cellar crates exists. All `CREATE` statements are idempotent, so this is
//! safe to run on every startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets readers continue while a ratings commit holds the write lock
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    create_settings_table(pool).await?;
    create_wines_table(pool).await?;
    create_wine_ratings_table(pool).await?;

    Ok(())
}

/// Create the settings table
///
/// Stores application configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the wines table
///
/// Identity columns are owned by the inventory side; the aggregate columns
/// are rewritten wholesale after every ratings refresh.
pub async fn create_wines_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS wines (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            wine_name TEXT NOT NULL,
            producer TEXT,
            vintage INTEGER,
            country TEXT,
            region TEXT,
            colour TEXT NOT NULL DEFAULT 'white',
            style TEXT,
            competition_index REAL,
            critics_index REAL,
            community_index REAL,
            purchase_score REAL,
            purchase_stars REAL,
            confidence_level TEXT,
            ratings_updated_at TIMESTAMP,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the wine_ratings table
///
/// Rows are keyed by `(wine_id, source, competition_year)`; source matching is
/// case-insensitive and a missing competition year counts as its own key.
pub async fn create_wine_ratings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS wine_ratings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            wine_id INTEGER NOT NULL REFERENCES wines(id) ON DELETE CASCADE,
            vintage INTEGER,
            source TEXT NOT NULL,
            source_lens TEXT NOT NULL,
            score_type TEXT NOT NULL,
            raw_score TEXT NOT NULL,
            normalized_min REAL NOT NULL,
            normalized_max REAL NOT NULL,
            normalized_mid REAL NOT NULL,
            award_name TEXT,
            competition_year INTEGER,
            rating_count INTEGER,
            source_url TEXT,
            evidence_excerpt TEXT,
            matched_wine_label TEXT,
            vintage_match TEXT,
            match_confidence REAL,
            identity_score REAL,
            identity_reason TEXT,
            is_user_override INTEGER NOT NULL DEFAULT 0,
            fetched_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (normalized_min >= 0 AND normalized_max <= 100),
            CHECK (normalized_min <= normalized_mid AND normalized_mid <= normalized_max)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_wine_ratings_key
        ON wine_ratings (wine_id, lower(source), coalesce(competition_year, -1))
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_wine_ratings_wine ON wine_ratings (wine_id)")
        .execute(pool)
        .await?;

    Ok(())
}
