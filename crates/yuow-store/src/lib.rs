//! yuow store - SQLite provider for the yuow kernel
//!
//! Provides:
//! - Connection management (`SqliteDatabase`)
//! - SQL rendering of the provider query model
//! - JSON <-> SQLite value conversion
//! - `Database` / `DbTransaction` implementations with isolation mapping

pub mod db;
pub mod errors;
pub mod sql;
pub mod value;

// Re-export key types
pub use db::{SqliteDatabase, SqliteTransaction};
pub use errors::Result;
