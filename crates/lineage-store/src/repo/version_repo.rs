//! Published timeline and module overlays: the `versions` table.

#![allow(clippy::result_large_err)]

use chrono::{DateTime, Utc};
use lineage_core::errors::{ExError, LineageError};
use lineage_core::model::{check_monotonic, LineageCode, ModuleId, NewVersion, ObjectType, Version};
use rusqlite::{Connection, OptionalExtension};

use crate::codec::{collect_versions, from_millis, to_millis, VersionRow, VERSION_COLUMNS};
use crate::errors::{from_rusqlite, Result};

pub struct VersionRepo;

impl VersionRepo {
    /// Record a lineage code in the registry (no-op if already there).
    pub fn register_lineage(conn: &Connection, code: &LineageCode, at: DateTime<Utc>) -> Result<()> {
        let sequence = i64::try_from(code.sequence()).map_err(|_| {
            ExError::from(LineageError::InvalidLineageCode {
                code: code.to_string(),
                reason: "sequence out of range".to_string(),
            })
        })?;
        conn.execute(
            "INSERT OR IGNORE INTO lineages (code, object_type, sequence, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                code.as_str(),
                code.object_type().as_str(),
                sequence,
                to_millis(at)
            ],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    /// Allocate and register the next unused code for an object type.
    pub fn allocate_code(
        conn: &Connection,
        object_type: ObjectType,
        at: DateTime<Utc>,
    ) -> Result<LineageCode> {
        let next: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(sequence), 0) + 1 FROM lineages WHERE object_type = ?1",
                [object_type.as_str()],
                |row| row.get(0),
            )
            .map_err(from_rusqlite)?;
        let code = LineageCode::new(object_type, next as u64).map_err(ExError::from)?;
        Self::register_lineage(conn, &code, at)?;
        Ok(code)
    }

    /// Greatest `modified_at` on one (lineage, timeline).
    pub fn latest_modified_at(
        conn: &Connection,
        code: &LineageCode,
        module_id: ModuleId,
    ) -> Result<Option<DateTime<Utc>>> {
        let ms: Option<i64> = conn
            .query_row(
                "SELECT MAX(modified_at) FROM versions WHERE lineage_code = ?1 AND module_id = ?2",
                rusqlite::params![code.as_str(), module_id.get()],
                |row| row.get(0),
            )
            .map_err(from_rusqlite)?;
        ms.map(from_millis).transpose()
    }

    /// Append a version.
    ///
    /// Registers the lineage if needed and rejects appends that would move the
    /// (lineage, timeline) backwards in `modified_at`.
    pub fn append(conn: &Connection, new: &NewVersion) -> Result<Version> {
        Self::register_lineage(conn, &new.code, new.created_at)?;

        let latest = Self::latest_modified_at(conn, &new.code, new.module_id)?;
        check_monotonic(new, latest).map_err(ExError::from)?;

        let payload = serde_json::to_string(&new.payload).map_err(|e| {
            ExError::from(lineage_core::LineageError::from(e)).with_entity_id(new.code.as_str())
        })?;

        conn.execute(
            "INSERT INTO versions (
                version_id, lineage_code, module_id, created_at, modified_at,
                start_validity, end_validity, payload, prior_version_id, action, hidden, deleted
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            rusqlite::params![
                new.version_id.to_string(),
                new.code.as_str(),
                new.module_id.get(),
                to_millis(new.created_at),
                to_millis(new.modified_at),
                to_millis(new.start_validity),
                new.end_validity.map(to_millis),
                payload,
                new.prior_version.map(|id| id.to_string()),
                new.action.as_str(),
                new.hidden,
                new.deleted,
            ],
        )
        .map_err(from_rusqlite)?;

        let seq = conn.last_insert_rowid();
        tracing::debug!(
            lineage_code = %new.code,
            module_id = new.module_id.get(),
            action = new.action.as_str(),
            seq,
            "appended version"
        );
        Ok(new.clone().into_version(seq))
    }

    /// Latest version on one (lineage, timeline), flags ignored.
    pub fn latest(
        conn: &Connection,
        code: &LineageCode,
        module_id: ModuleId,
    ) -> Result<Option<Version>> {
        let sql = format!(
            "SELECT {} FROM versions
             WHERE lineage_code = ?1 AND module_id = ?2
             ORDER BY modified_at DESC, seq DESC
             LIMIT 1",
            VERSION_COLUMNS
        );
        let row = conn
            .query_row(
                &sql,
                rusqlite::params![code.as_str(), module_id.get()],
                VersionRow::from_row,
            )
            .optional()
            .map_err(from_rusqlite)?;
        row.map(VersionRow::into_version).transpose()
    }

    /// Every version of a lineage on every timeline, in insertion order.
    pub fn history(conn: &Connection, code: &LineageCode) -> Result<Vec<Version>> {
        let sql = format!(
            "SELECT {} FROM versions WHERE lineage_code = ?1 ORDER BY seq",
            VERSION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql).map_err(from_rusqlite)?;
        let rows = stmt
            .query_map([code.as_str()], VersionRow::from_row)
            .map_err(from_rusqlite)?;
        collect_versions(rows)
    }

    /// Every version on one timeline, in insertion order.
    pub fn timeline(conn: &Connection, module_id: ModuleId) -> Result<Vec<Version>> {
        let sql = format!(
            "SELECT {} FROM versions WHERE module_id = ?1 ORDER BY seq",
            VERSION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql).map_err(from_rusqlite)?;
        let rows = stmt
            .query_map([module_id.get()], VersionRow::from_row)
            .map_err(from_rusqlite)?;
        collect_versions(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::migrations::apply_migrations;
    use chrono::Duration;
    use lineage_core::model::{now, Action};
    use lineage_core::ExErrorKind;
    use serde_json::json;

    fn setup() -> Connection {
        let mut conn = db::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        conn
    }

    fn c(s: &str) -> LineageCode {
        LineageCode::parse(s).unwrap()
    }

    #[test]
    fn test_append_and_read_back() {
        let conn = setup();
        let t = now();
        let new = NewVersion::new(
            c("ambitie-1"),
            ModuleId::PUBLISHED,
            Action::Create,
            json!({"Title": "A"}),
            t,
        );

        let stored = VersionRepo::append(&conn, &new).unwrap();
        let read = VersionRepo::latest(&conn, &c("ambitie-1"), ModuleId::PUBLISHED)
            .unwrap()
            .unwrap();

        assert_eq!(stored, read);
        assert_eq!(read.payload, json!({"Title": "A"}));
        assert_eq!(read.created_at, t);
    }

    #[test]
    fn test_append_rejects_non_monotonic() {
        let conn = setup();
        let t = now();
        let code = c("ambitie-1");
        VersionRepo::append(
            &conn,
            &NewVersion::new(code.clone(), ModuleId::PUBLISHED, Action::Create, json!({}), t),
        )
        .unwrap();

        let err = VersionRepo::append(
            &conn,
            &NewVersion::new(
                code,
                ModuleId::PUBLISHED,
                Action::Edit,
                json!({}),
                t - Duration::seconds(5),
            ),
        )
        .unwrap_err();

        assert_eq!(err.kind(), ExErrorKind::NonMonotonicVersion);
    }

    #[test]
    fn test_allocate_code_never_reuses() {
        let conn = setup();
        let t = now();
        VersionRepo::register_lineage(&conn, &c("maatregel-4"), t).unwrap();

        let next = VersionRepo::allocate_code(&conn, ObjectType::Maatregel, t).unwrap();
        assert_eq!(next.as_str(), "maatregel-5");
        let other = VersionRepo::allocate_code(&conn, ObjectType::Ambitie, t).unwrap();
        assert_eq!(other.as_str(), "ambitie-1");
    }
}
