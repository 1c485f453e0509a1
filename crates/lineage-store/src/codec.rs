//! Conversions between SQLite rows and domain values.
//!
//! Timestamps are stored as Unix milliseconds, ids as hyphenated UUID text,
//! payloads as JSON text, booleans as 0/1.

#![allow(clippy::result_large_err)]

use chrono::{DateTime, TimeZone, Utc};
use lineage_core::errors::ExError;
use lineage_core::model::{LineageCode, ModuleId, Version};
use rusqlite::Row;
use uuid::Uuid;

use crate::errors::{corrupt_row, Result};

pub fn to_millis(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

pub fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| corrupt_row("timestamp", format!("{} out of range", ms)))
}

pub fn parse_code(table: &str, raw: &str) -> Result<LineageCode> {
    LineageCode::parse(raw).map_err(|e| corrupt_row(table, e))
}

pub fn parse_uuid(table: &str, raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| corrupt_row(table, e))
}

pub fn parse_json(table: &str, raw: &str) -> Result<serde_json::Value> {
    serde_json::from_str(raw).map_err(|e| corrupt_row(table, e))
}

/// Column list matching [`VersionRow::from_row`].
pub const VERSION_COLUMNS: &str = "seq, version_id, lineage_code, module_id, created_at, \
     modified_at, start_validity, end_validity, payload, prior_version_id, action, hidden, deleted";

/// A `versions` row as stored.
pub struct VersionRow {
    seq: i64,
    version_id: String,
    lineage_code: String,
    module_id: i64,
    created_at: i64,
    modified_at: i64,
    start_validity: i64,
    end_validity: Option<i64>,
    payload: String,
    prior_version_id: Option<String>,
    action: String,
    hidden: bool,
    deleted: bool,
}

impl VersionRow {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            seq: row.get(0)?,
            version_id: row.get(1)?,
            lineage_code: row.get(2)?,
            module_id: row.get(3)?,
            created_at: row.get(4)?,
            modified_at: row.get(5)?,
            start_validity: row.get(6)?,
            end_validity: row.get(7)?,
            payload: row.get(8)?,
            prior_version_id: row.get(9)?,
            action: row.get(10)?,
            hidden: row.get(11)?,
            deleted: row.get(12)?,
        })
    }

    pub fn into_version(self) -> Result<Version> {
        const TABLE: &str = "versions";
        Ok(Version {
            version_id: parse_uuid(TABLE, &self.version_id)?,
            code: parse_code(TABLE, &self.lineage_code)?,
            module_id: ModuleId::new(self.module_id),
            created_at: from_millis(self.created_at)?,
            modified_at: from_millis(self.modified_at)?,
            start_validity: from_millis(self.start_validity)?,
            end_validity: self.end_validity.map(from_millis).transpose()?,
            payload: parse_json(TABLE, &self.payload)?,
            prior_version: self
                .prior_version_id
                .as_deref()
                .map(|raw| parse_uuid(TABLE, raw))
                .transpose()?,
            action: self
                .action
                .parse()
                .map_err(|e| corrupt_row(TABLE, e))?,
            hidden: self.hidden,
            deleted: self.deleted,
            seq: self.seq,
        })
    }
}

/// Decode every row of a versions query.
pub fn collect_versions(
    rows: impl Iterator<Item = rusqlite::Result<VersionRow>>,
) -> Result<Vec<Version>> {
    rows.map(|row| {
        row.map_err(crate::errors::from_rusqlite)
            .and_then(VersionRow::into_version)
    })
    .collect::<std::result::Result<Vec<_>, ExError>>()
}
