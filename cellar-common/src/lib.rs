//! # Cellar Common Library
//!
//! Shared code for the cellar crates:
//! - Error type and result alias
//! - TOML configuration loading and path resolution
//! - SQLite pool initialisation and schema

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;

pub use error::{Error, Result};
