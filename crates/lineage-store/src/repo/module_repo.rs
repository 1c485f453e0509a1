//! Modules and their status history.

#![allow(clippy::result_large_err)]

use chrono::{DateTime, Utc};
use lineage_core::errors::{ExError, ExErrorKind, LineageError};
use lineage_core::model::{Module, ModuleId, ModuleState, StatusEntry};
use rusqlite::{Connection, OptionalExtension};

use crate::codec::{from_millis, to_millis};
use crate::errors::{corrupt_row, from_rusqlite, module_not_found, Result};

/// Input for creating a module.
#[derive(Debug, Clone, Default)]
pub struct NewModule {
    /// Explicit id; allocated by the database when `None`.
    pub module_id: Option<ModuleId>,
    pub title: String,
    pub description: String,
}

impl NewModule {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, module_id: ModuleId) -> Self {
        self.module_id = Some(module_id);
        self
    }
}

pub struct ModuleRepo;

impl ModuleRepo {
    /// Create a Draft module with an empty status history.
    pub fn create(conn: &Connection, new: &NewModule, at: DateTime<Utc>) -> Result<Module> {
        if new.module_id.is_some_and(|id| id.get() <= 0) {
            return Err(ExError::new(ExErrorKind::InvalidInput)
                .with_op("create_module")
                .with_message("module ids must be positive; 0 is the published timeline"));
        }

        conn.execute(
            "INSERT INTO modules (module_id, title, description, current_state, row_version, created_at, modified_at)
             VALUES (?1, ?2, ?3, 'draft', 0, ?4, ?4)",
            rusqlite::params![
                new.module_id.map(|id| id.get()),
                new.title,
                new.description,
                to_millis(at)
            ],
        )
        .map_err(from_rusqlite)?;

        let module_id = ModuleId::new(conn.last_insert_rowid());
        tracing::debug!(module_id = module_id.get(), "created module");
        Self::require(conn, module_id)
    }

    pub fn get(conn: &Connection, module_id: ModuleId) -> Result<Option<Module>> {
        let row = conn
            .query_row(
                "SELECT title, description, row_version, created_at, modified_at
                 FROM modules WHERE module_id = ?1",
                [module_id.get()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )
            .optional()
            .map_err(from_rusqlite)?;

        let Some((title, description, row_version, created_at, modified_at)) = row else {
            return Ok(None);
        };

        Ok(Some(Module {
            module_id,
            title,
            description,
            created_at: from_millis(created_at)?,
            modified_at: from_millis(modified_at)?,
            row_version,
            status_history: Self::status_history(conn, module_id)?,
        }))
    }

    /// Like [`ModuleRepo::get`], failing with `NotFound` for a missing module.
    pub fn require(conn: &Connection, module_id: ModuleId) -> Result<Module> {
        Self::get(conn, module_id)?.ok_or_else(|| module_not_found(module_id))
    }

    pub fn status_history(conn: &Connection, module_id: ModuleId) -> Result<Vec<StatusEntry>> {
        let mut stmt = conn
            .prepare(
                "SELECT state, changed_at, actor_id FROM module_status_history
                 WHERE module_id = ?1 ORDER BY id",
            )
            .map_err(from_rusqlite)?;
        let rows = stmt
            .query_map([module_id.get()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })
            .map_err(from_rusqlite)?;

        let mut history = Vec::new();
        for row in rows {
            let (state, changed_at, actor_id) = row.map_err(from_rusqlite)?;
            history.push(StatusEntry {
                state: state
                    .parse()
                    .map_err(|e| corrupt_row("module_status_history", e))?,
                changed_at: from_millis(changed_at)?,
                actor_id,
            });
        }
        Ok(history)
    }

    /// Bump `row_version`, provided nobody else did since `module` was read.
    ///
    /// # Errors
    ///
    /// `Conflict` if the module's row version moved.
    pub fn touch(conn: &Connection, module: &Module, at: DateTime<Utc>) -> Result<i64> {
        let updated = conn
            .execute(
                "UPDATE modules SET row_version = row_version + 1, modified_at = ?1
                 WHERE module_id = ?2 AND row_version = ?3",
                rusqlite::params![to_millis(at), module.module_id.get(), module.row_version],
            )
            .map_err(from_rusqlite)?;
        if updated == 0 {
            return Err(conflict(module));
        }
        Ok(module.row_version + 1)
    }

    /// Move `module` to `state`, appending a status history entry.
    ///
    /// Compare-and-swap on the row version `module` was read with.
    ///
    /// # Errors
    ///
    /// `Conflict` if the module's row version moved.
    pub fn record_state(
        conn: &Connection,
        module: &Module,
        state: ModuleState,
        actor_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Module> {
        let updated = conn
            .execute(
                "UPDATE modules
                 SET current_state = ?1, row_version = row_version + 1, modified_at = ?2
                 WHERE module_id = ?3 AND row_version = ?4",
                rusqlite::params![
                    state.as_str(),
                    to_millis(at),
                    module.module_id.get(),
                    module.row_version
                ],
            )
            .map_err(from_rusqlite)?;
        if updated == 0 {
            return Err(conflict(module));
        }

        conn.execute(
            "INSERT INTO module_status_history (module_id, state, changed_at, actor_id)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![module.module_id.get(), state.as_str(), to_millis(at), actor_id],
        )
        .map_err(from_rusqlite)?;

        tracing::debug!(
            module_id = module.module_id.get(),
            from = module.state().as_str(),
            to = state.as_str(),
            "module state recorded"
        );
        Self::require(conn, module.module_id)
    }
}

fn conflict(module: &Module) -> ExError {
    LineageError::TransitionConflict {
        module_id: module.module_id.get(),
        reason: format!("row version {} is stale", module.row_version),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::migrations::apply_migrations;
    use lineage_core::model::now;

    fn setup() -> Connection {
        let mut conn = db::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        conn
    }

    #[test]
    fn test_create_allocates_positive_ids() {
        let conn = setup();
        let m = ModuleRepo::create(&conn, &NewModule::titled("Omgevingsvisie"), now()).unwrap();
        assert!(m.module_id.get() > 0);
        assert_eq!(m.state(), ModuleState::Draft);
        assert_eq!(m.row_version, 0);
    }

    #[test]
    fn test_create_rejects_reserved_id() {
        let conn = setup();
        let err = ModuleRepo::create(
            &conn,
            &NewModule::titled("x").with_id(ModuleId::PUBLISHED),
            now(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidInput);
    }

    #[test]
    fn test_record_state_appends_history_and_bumps_version() {
        let conn = setup();
        let m = ModuleRepo::create(&conn, &NewModule::titled("M").with_id(ModuleId::new(7)), now())
            .unwrap();

        let m = ModuleRepo::record_state(&conn, &m, ModuleState::Activated, Some("u1"), now())
            .unwrap();

        assert_eq!(m.state(), ModuleState::Activated);
        assert_eq!(m.row_version, 1);
        assert_eq!(m.status_history.len(), 1);
        assert_eq!(m.status_history[0].actor_id.as_deref(), Some("u1"));
    }

    #[test]
    fn test_stale_row_version_is_conflict() {
        let conn = setup();
        let stale = ModuleRepo::create(&conn, &NewModule::titled("M"), now()).unwrap();
        ModuleRepo::touch(&conn, &stale, now()).unwrap();

        let err =
            ModuleRepo::record_state(&conn, &stale, ModuleState::Activated, None, now()).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Conflict);
    }

    #[test]
    fn test_missing_module_is_not_found() {
        let conn = setup();
        let err = ModuleRepo::require(&conn, ModuleId::new(99)).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::NotFound);
    }
}
