//! Error helpers for lineage-store.
//!
//! Storage failures surface as `StorageFailure` with the SQLite message
//! untouched; nothing here retries.

use lineage_core::errors::{ExError, ExErrorKind};
use lineage_core::model::ModuleId;

/// Result type alias using ExError.
pub type Result<T> = std::result::Result<T, ExError>;

/// Create a database error from rusqlite::Error.
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::StorageFailure)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Create a migration error.
pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::StorageFailure)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// Create a checksum mismatch error for an already applied migration.
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> ExError {
    ExError::new(ExErrorKind::StorageFailure)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: recorded {}, embedded {}",
            migration_id, expected, actual
        ))
}

/// A stored value that does not decode into the domain model.
pub fn corrupt_row(table: &str, reason: impl std::fmt::Display) -> ExError {
    ExError::new(ExErrorKind::Serialization)
        .with_op("decode_row")
        .with_message(format!("Unreadable {} row: {}", table, reason))
}

pub fn module_not_found(module_id: ModuleId) -> ExError {
    ExError::new(ExErrorKind::NotFound)
        .with_module_id(module_id.get())
        .with_message(format!("Module not found: {}", module_id))
}
