//! Migration framework.
//!
//! Embedded SQL migrations applied in order, each inside its own transaction
//! and recorded with a SHA-256 checksum in `schema_version`.

mod checksums;
mod embedded;
mod runner;

pub use runner::apply_migrations;
