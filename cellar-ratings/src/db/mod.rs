//! Database access for cellar-ratings
//!
//! Schema is created by `cellar_common::db::init_database`; these modules only
//! read and write rows.

pub mod ratings;
pub mod settings;
pub mod wines;

pub use ratings::StoredRating;
