//! Lineage Store - SQLite persistence for lineages, modules and relations.
//!
//! Provides:
//! - Connection setup and embedded, checksummed migrations
//! - Version, module, relation and change-log repositories
//! - Draft edit operations on module overlays (`edits`)
//! - `SqliteVersionSource`, the resolver's view of the database

pub mod codec;
pub mod db;
pub mod edits;
pub mod errors;
pub mod migrations;
pub mod repo;
pub mod source;

// Re-export key types
pub use errors::Result;
pub use source::SqliteVersionSource;
