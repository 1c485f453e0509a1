//! The resolver's view of the database.
//!
//! Candidate queries already pick the top row per lineage with a window
//! function, so the resolver only sees one candidate per lineage and
//! timeline. It still applies its own rules on top; the queries here are
//! only a pre-filter.
//!
//! Run every call for one resolution on the same transaction so they all
//! see the same snapshot.

#![allow(clippy::result_large_err)]

use chrono::{DateTime, Utc};
use lineage_core::model::{LineageCode, ModuleId, ModuleState, Version};
use lineage_core::resolver::{ResolveMode, VersionSource};
use rusqlite::{Connection, OptionalExtension};
use std::collections::BTreeSet;

use crate::codec::{collect_versions, parse_code, to_millis, VersionRow, VERSION_COLUMNS};
use crate::errors::{corrupt_row, from_rusqlite, Result};

pub struct SqliteVersionSource<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteVersionSource<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

fn codes_json(codes: &BTreeSet<LineageCode>) -> String {
    serde_json::Value::Array(
        codes
            .iter()
            .map(|c| serde_json::Value::String(c.to_string()))
            .collect(),
    )
    .to_string()
}

impl VersionSource for SqliteVersionSource<'_> {
    fn published_candidates(
        &self,
        codes: &BTreeSet<LineageCode>,
        as_of: DateTime<Utc>,
        mode: ResolveMode,
    ) -> Result<Vec<Version>> {
        let sql = format!(
            "SELECT {cols} FROM (
                SELECT v.*, ROW_NUMBER() OVER (
                    PARTITION BY v.lineage_code ORDER BY v.modified_at DESC, v.seq DESC
                ) AS rn
                FROM versions v
                WHERE v.module_id = 0
                  AND v.lineage_code IN (SELECT value FROM json_each(?1))
                  AND v.created_at <= ?2
                  AND (?3 = 0 OR (v.start_validity <= ?2
                                  AND (v.end_validity IS NULL OR ?2 < v.end_validity)))
             ) WHERE rn = 1",
            cols = VERSION_COLUMNS
        );
        let effective = mode == ResolveMode::Effective;

        let mut stmt = self.conn.prepare(&sql).map_err(from_rusqlite)?;
        let rows = stmt
            .query_map(
                rusqlite::params![codes_json(codes), to_millis(as_of), effective],
                VersionRow::from_row,
            )
            .map_err(from_rusqlite)?;
        collect_versions(rows)
    }

    fn overlay_candidates(
        &self,
        module_id: ModuleId,
        codes: &BTreeSet<LineageCode>,
    ) -> Result<Vec<Version>> {
        let sql = format!(
            "SELECT {cols} FROM (
                SELECT v.*, ROW_NUMBER() OVER (
                    PARTITION BY v.lineage_code ORDER BY v.modified_at DESC, v.seq DESC
                ) AS rn
                FROM versions v
                WHERE v.module_id = ?1
                  AND v.lineage_code IN (SELECT value FROM json_each(?2))
             ) WHERE rn = 1",
            cols = VERSION_COLUMNS
        );

        let mut stmt = self.conn.prepare(&sql).map_err(from_rusqlite)?;
        let rows = stmt
            .query_map(
                rusqlite::params![module_id.get(), codes_json(codes)],
                VersionRow::from_row,
            )
            .map_err(from_rusqlite)?;
        collect_versions(rows)
    }

    fn module_state(&self, module_id: ModuleId) -> Result<Option<ModuleState>> {
        let state: Option<String> = self
            .conn
            .query_row(
                "SELECT current_state FROM modules WHERE module_id = ?1",
                [module_id.get()],
                |row| row.get(0),
            )
            .optional()
            .map_err(from_rusqlite)?;
        state
            .map(|s| s.parse().map_err(|e| corrupt_row("modules", e)))
            .transpose()
    }

    fn known_codes(
        &self,
        module_id: Option<ModuleId>,
    ) -> Result<BTreeSet<LineageCode>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT DISTINCT lineage_code FROM versions
                 WHERE module_id = 0 OR module_id = ?1",
            )
            .map_err(from_rusqlite)?;
        let scope = module_id.map_or(0, |m| m.get());
        let rows = stmt
            .query_map([scope], |row| row.get::<_, String>(0))
            .map_err(from_rusqlite)?;

        let mut codes = BTreeSet::new();
        for row in rows {
            codes.insert(parse_code("versions", &row.map_err(from_rusqlite)?)?);
        }
        Ok(codes)
    }
}
