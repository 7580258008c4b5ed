//! Test Helper Utilities
//!
//! Shared utilities for cellar-ratings integration tests

#![allow(dead_code)]

pub mod db_utils;
pub mod providers;

pub use db_utils::{create_test_db, seed_wine};
pub use providers::{candidate, ScriptedProvider};
