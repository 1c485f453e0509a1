//! Append-only audit log.

#![allow(clippy::result_large_err)]

use lineage_core::errors::{ExError, LineageError};
use lineage_core::model::{ChangeLogEntry, LineageCode, PendingChangeLog};
use rusqlite::Connection;

use crate::codec::{from_millis, parse_code, parse_json, to_millis};
use crate::errors::{from_rusqlite, Result};

pub struct ChangeLogRepo;

fn to_json(value: &serde_json::Value) -> Result<String> {
    serde_json::to_string(value).map_err(|e| ExError::from(LineageError::from(e)))
}

impl ChangeLogRepo {
    pub fn insert(conn: &Connection, entry: &PendingChangeLog) -> Result<ChangeLogEntry> {
        conn.execute(
            "INSERT INTO change_log (actor_id, timestamp, action_type, subject_code, action_data, before_json, after_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                entry.actor_id,
                to_millis(entry.timestamp),
                entry.action_type,
                entry.subject_code.as_str(),
                to_json(&entry.action_data)?,
                to_json(&entry.before)?,
                to_json(&entry.after)?,
            ],
        )
        .map_err(from_rusqlite)?;

        Ok(entry.clone().into_entry(conn.last_insert_rowid()))
    }

    /// Entries about one lineage, oldest first.
    pub fn for_subject(conn: &Connection, code: &LineageCode) -> Result<Vec<ChangeLogEntry>> {
        const TABLE: &str = "change_log";

        let mut stmt = conn
            .prepare(
                "SELECT id, actor_id, timestamp, action_type, subject_code, action_data, before_json, after_json
                 FROM change_log WHERE subject_code = ?1 ORDER BY id",
            )
            .map_err(from_rusqlite)?;
        let rows = stmt
            .query_map([code.as_str()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })
            .map_err(from_rusqlite)?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, actor_id, timestamp, action_type, subject, data, before, after) =
                row.map_err(from_rusqlite)?;
            entries.push(ChangeLogEntry {
                id,
                actor_id,
                timestamp: from_millis(timestamp)?,
                action_type,
                subject_code: parse_code(TABLE, &subject)?,
                action_data: parse_json(TABLE, &data)?,
                before: parse_json(TABLE, &before)?,
                after: parse_json(TABLE, &after)?,
            });
        }
        Ok(entries)
    }
}
