//! Database Test Utilities

use anyhow::Result;
use cellar_ratings::db::wines::insert_wine;
use cellar_ratings::types::{Wine, WineId};
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Create a temporary database with the schema applied
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test_cellar.db");
    let pool = cellar_common::db::init_database(&db_path).await?;
    Ok((temp_dir, pool))
}

/// Insert a wine and return it with its assigned id
pub async fn seed_wine(pool: &SqlitePool, wine: Wine) -> Result<(WineId, Wine)> {
    let id = insert_wine(pool, &wine).await?;
    Ok((id, Wine { id, ..wine }))
}
