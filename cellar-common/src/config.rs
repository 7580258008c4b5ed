//! Configuration loading and path resolution
//!
//! Config file location follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. User config directory (`~/.config/cellar/<file>` on Linux)
//! 4. System config directory (`/etc/cellar/<file>`, Linux only)
//!
//! A missing config file is not an error: callers receive compiled defaults
//! and a warning is logged.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Where a configuration value or file came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine,
    Environment,
    UserConfigDir,
    SystemConfigDir,
}

impl ConfigSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CommandLine => "command line",
            Self::Environment => "environment",
            Self::UserConfigDir => "user config directory",
            Self::SystemConfigDir => "system config directory",
        }
    }
}

/// Logging configuration shared by cellar binaries
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Locate a config file by priority order
///
/// Returns `None` when no candidate exists; the caller then runs on defaults.
pub fn resolve_config_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    file_name: &str,
) -> Option<(PathBuf, ConfigSource)> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some((path.to_path_buf(), ConfigSource::CommandLine));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some((PathBuf::from(path), ConfigSource::Environment));
        }
    }

    // Priority 3: User config directory
    if let Some(path) = dirs::config_dir().map(|d| d.join("cellar").join(file_name)) {
        if path.exists() {
            return Some((path, ConfigSource::UserConfigDir));
        }
    }

    // Priority 4: System config directory
    if cfg!(target_os = "linux") {
        let path = PathBuf::from("/etc/cellar").join(file_name);
        if path.exists() {
            return Some((path, ConfigSource::SystemConfigDir));
        }
    }

    None
}

/// Load a TOML config file, falling back to `T::default()` when it is missing
///
/// # Errors
/// Returns `Error::Config` if the file exists but cannot be read or parsed.
pub fn load_toml_config<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        info!("No config file found, using compiled defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        warn!(
            "Config file {} does not exist, using compiled defaults",
            path.display()
        );
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;

    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Read and parse an environment variable override
///
/// Unset or blank variables yield `Ok(None)`. A value that fails to parse is a
/// configuration error rather than being silently ignored.
pub fn env_override<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{}={:?} is invalid: {}", name, raw, e))),
        _ => Ok(None),
    }
}

/// OS-dependent default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("cellar"))
        .unwrap_or_else(|| PathBuf::from("./cellar_data"))
}

/// Default SQLite database location inside the data directory
pub fn default_database_path() -> PathBuf {
    default_data_dir().join("cellar.db")
}
