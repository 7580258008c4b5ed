//! Configuration resolution for cellar-ratings
//!
//! Priority for every tunable: Database → ENV → TOML → compiled default.
//! The TOML file is located by `cellar_common::config::resolve_config_path`
//! (`--config`, then `CELLAR_CONFIG`, then the user/system config dirs).

use crate::resolution::{CircuitConfig, IdentityConfig, TiersConfig, VintageConfig};
use crate::scoring::AggregationConfig;
use cellar_common::config::{env_override, load_toml_config, resolve_config_path, LoggingConfig};
use cellar_common::{Error, Result};
use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const CONFIG_ENV_VAR: &str = "CELLAR_CONFIG";
pub const CONFIG_FILE_NAME: &str = "ratings.toml";

/// `[cache]` section
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of cached search artifacts
    pub artifact_ttl_secs: u64,
    /// Minimum spacing between expiry sweeps run by inserts
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            artifact_ttl_secs: 3600,
            sweep_interval_secs: 300,
        }
    }
}

impl CacheConfig {
    pub fn artifact_ttl(&self) -> Duration {
        Duration::from_secs(self.artifact_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// `[queue]` section
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    /// Pending jobs before submissions are refused
    pub capacity: usize,
    /// Wines resolved concurrently
    pub workers: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            workers: 4,
        }
    }
}

/// Complete cellar-ratings configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct RatingsConfig {
    /// SQLite database file; `None` means the platform data directory
    pub database_path: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub circuit: CircuitConfig,
    pub tiers: TiersConfig,
    pub identity: IdentityConfig,
    pub vintage: VintageConfig,
    pub aggregation: AggregationConfig,
    pub cache: CacheConfig,
    pub queue: QueueConfig,
}

impl RatingsConfig {
    /// Load the TOML file (if any) and apply environment overrides
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let resolved = resolve_config_path(cli_path, CONFIG_ENV_VAR, CONFIG_FILE_NAME);
        if let Some((path, source)) = &resolved {
            info!("Loading config from {} ({})", path.display(), source.as_str());
        }

        let mut config: RatingsConfig = load_toml_config(resolved.as_ref().map(|(p, _)| p.as_path()))?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Environment variables beat the TOML file
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(path) = env_override::<PathBuf>("CELLAR_DATABASE_PATH")? {
            self.database_path = Some(path);
        }
        if let Some(level) = env_override::<String>("CELLAR_LOG_LEVEL")? {
            self.logging.level = level;
        }
        if let Some(threshold) = env_override::<u32>("CELLAR_CIRCUIT_FAILURE_THRESHOLD")? {
            self.circuit.failure_threshold = threshold;
        }
        if let Some(secs) = env_override::<u64>("CELLAR_CIRCUIT_COOLDOWN_SECS")? {
            self.circuit.cooldown_secs = secs;
        }
        if let Some(preference) = env_override::<u8>("CELLAR_RATING_PREFERENCE")? {
            self.aggregation.default_preference = preference;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.aggregation.default_preference > 100 {
            return Err(Error::Config(format!(
                "aggregation.default_preference must be 0-100, got {}",
                self.aggregation.default_preference
            )));
        }
        if self.circuit.failure_threshold == 0 {
            return Err(Error::Config("circuit.failure_threshold must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.identity.min_score) {
            return Err(Error::Config(format!(
                "identity.min_score must be 0.0-1.0, got {}",
                self.identity.min_score
            )));
        }
        if self.queue.workers == 0 || self.queue.capacity == 0 {
            return Err(Error::Config("queue.workers and queue.capacity must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(cellar_common::config::default_database_path)
    }
}

/// Resolve the purchase-score preference weight
///
/// **Priority:** Database (`rating_preference` setting) → configured default
/// (which already carries any ENV/TOML value)
pub async fn resolve_rating_preference(db: &Pool<Sqlite>, config: &AggregationConfig) -> Result<u8> {
    match crate::db::settings::get_rating_preference(db).await {
        Ok(Some(value)) => {
            if value != config.default_preference {
                info!(
                    "Rating preference {} from database overrides configured {}",
                    value, config.default_preference
                );
            }
            Ok(value)
        }
        Ok(None) => Ok(config.default_preference),
        Err(Error::Config(e)) => {
            warn!("Ignoring invalid stored rating preference: {}", e);
            Ok(config.default_preference)
        }
        Err(e) => Err(e),
    }
}
