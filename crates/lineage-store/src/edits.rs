//! Draft edits on module overlays.
//!
//! Every edit is one write transaction that:
//! 1. loads the module and refuses terminal ones (`ModuleClosed`)
//! 2. activates a Draft module
//! 3. appends one overlay version
//! 4. bumps the module's row version
//!
//! `publish_version` is the odd one out: it writes straight to the published
//! timeline and is meant for imports and bootstrapping.

#![allow(clippy::result_large_err)]

use chrono::{DateTime, Utc};
use lineage_core::errors::{ExError, ExErrorKind, LineageError};
use lineage_core::model::{
    Action, LineageCode, ModuleId, ModuleState, NewVersion, ObjectType, Version,
};
use rusqlite::Connection;
use serde_json::Value;

use crate::db::begin_write;
use crate::errors::{from_rusqlite, Result};
use crate::repo::{ModuleRepo, VersionRepo};

/// Who is editing which module, and when.
#[derive(Debug, Clone)]
pub struct EditContext {
    pub module_id: ModuleId,
    pub actor_id: Option<String>,
    pub at: DateTime<Utc>,
}

impl EditContext {
    pub fn new(module_id: ModuleId, at: DateTime<Utc>) -> Self {
        Self {
            module_id,
            actor_id: None,
            at,
        }
    }

    pub fn by(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }
}

fn nothing_to_derive(code: &LineageCode, module_id: ModuleId) -> ExError {
    LineageError::NothingToDerive {
        code: code.to_string(),
        module_id: module_id.get(),
    }
    .into()
}

fn validate_payload(code: &LineageCode, payload: &Value) -> Result<()> {
    code.object_type()
        .validate(code, payload)
        .map_err(ExError::from)
}

fn edit<F>(conn: &mut Connection, ctx: &EditContext, build: F) -> Result<Version>
where
    F: FnOnce(&Connection) -> Result<NewVersion>,
{
    let tx = begin_write(conn)?;

    let module = ModuleRepo::require(&tx, ctx.module_id)?;
    module.ensure_editable().map_err(ExError::from)?;
    let module = if module.state() == ModuleState::Draft {
        ModuleRepo::record_state(
            &tx,
            &module,
            ModuleState::Activated,
            ctx.actor_id.as_deref(),
            ctx.at,
        )?
    } else {
        module
    };

    let new = build(&*tx)?;
    let version = VersionRepo::append(&tx, &new)?;
    ModuleRepo::touch(&tx, &module, ctx.at)?;

    tx.commit().map_err(from_rusqlite)?;
    Ok(version)
}

/// Latest overlay version that still counts (not hidden, not deleted).
fn live_overlay(
    conn: &Connection,
    code: &LineageCode,
    module_id: ModuleId,
) -> Result<Option<Version>> {
    Ok(VersionRepo::latest(conn, code, module_id)?.filter(|v| !v.hidden && !v.deleted))
}

/// Latest published version that is not a tombstone.
fn live_published(conn: &Connection, code: &LineageCode) -> Result<Option<Version>> {
    Ok(VersionRepo::latest(conn, code, ModuleId::PUBLISHED)?.filter(|v| !v.deleted))
}

/// Start a brand-new lineage inside the module.
///
/// Allocates the next unused code for `object_type`.
pub fn add_new_object(
    conn: &mut Connection,
    ctx: &EditContext,
    object_type: ObjectType,
    payload: Value,
) -> Result<Version> {
    edit(conn, ctx, |tx| {
        let code = VersionRepo::allocate_code(tx, object_type, ctx.at)?;
        validate_payload(&code, &payload)?;
        Ok(NewVersion::new(code, ctx.module_id, Action::Create, payload, ctx.at))
    })
}

/// Bring the current published version of a lineage into the module.
pub fn add_existing_object(
    conn: &mut Connection,
    ctx: &EditContext,
    code: &LineageCode,
) -> Result<Version> {
    edit(conn, ctx, |tx| {
        let published = live_published(tx, code)?
            .ok_or_else(|| nothing_to_derive(code, ModuleId::PUBLISHED))?;
        Ok(NewVersion::new(
            code.clone(),
            ctx.module_id,
            Action::Edit,
            published.payload,
            ctx.at,
        )
        .with_validity(published.start_validity, published.end_validity)
        .with_prior(published.version_id))
    })
}

/// Append a version whose payload is the module's latest payload with the
/// top-level fields of `patch` laid over it.
pub fn patch_object(
    conn: &mut Connection,
    ctx: &EditContext,
    code: &LineageCode,
    patch: Value,
) -> Result<Version> {
    let Value::Object(fields) = patch else {
        return Err(ExError::new(ExErrorKind::InvalidInput)
            .with_op("patch_object")
            .with_entity_id(code.as_str())
            .with_message("patch must be a JSON object"));
    };

    edit(conn, ctx, |tx| {
        let base = live_overlay(tx, code, ctx.module_id)?
            .ok_or_else(|| nothing_to_derive(code, ctx.module_id))?;
        if base.action == Action::Terminate {
            return Err(LineageError::InvalidPayload {
                code: code.to_string(),
                reason: "lineage is terminated in this module".to_string(),
            }
            .into());
        }

        let mut payload = base.payload.clone();
        if let Value::Object(target) = &mut payload {
            target.extend(fields);
        }
        validate_payload(code, &payload)?;

        let action = match base.action {
            Action::Create => Action::Create,
            _ => Action::Edit,
        };
        Ok(
            NewVersion::new(code.clone(), ctx.module_id, action, payload, ctx.at)
                .with_validity(base.start_validity, base.end_validity)
                .with_prior(base.version_id),
        )
    })
}

/// Mark a lineage as removed in the module's prospective view.
pub fn terminate_object(
    conn: &mut Connection,
    ctx: &EditContext,
    code: &LineageCode,
) -> Result<Version> {
    edit(conn, ctx, |tx| {
        let base = match live_overlay(tx, code, ctx.module_id)? {
            Some(v) => v,
            None => live_published(tx, code)?
                .ok_or_else(|| nothing_to_derive(code, ctx.module_id))?,
        };
        Ok(
            NewVersion::new(code.clone(), ctx.module_id, Action::Terminate, base.payload, ctx.at)
                .with_prior(base.version_id),
        )
    })
}

/// Take a lineage out of the module again.
///
/// Appends a hidden, deleted copy of the module's latest version, after
/// which the module no longer says anything about the lineage.
pub fn remove_object(
    conn: &mut Connection,
    ctx: &EditContext,
    code: &LineageCode,
) -> Result<Version> {
    edit(conn, ctx, |tx| {
        let base = live_overlay(tx, code, ctx.module_id)?
            .ok_or_else(|| nothing_to_derive(code, ctx.module_id))?;
        Ok(
            NewVersion::new(code.clone(), ctx.module_id, base.action, base.payload, ctx.at)
                .with_validity(base.start_validity, base.end_validity)
                .with_prior(base.version_id)
                .with_flags(true, true),
        )
    })
}

/// Append directly to the published timeline.
///
/// # Errors
///
/// `InvalidInput` for anything but a published Create/Edit version,
/// `NonMonotonicVersion` if the lineage already has a later published version.
pub fn publish_version(conn: &mut Connection, new: NewVersion) -> Result<Version> {
    if !new.module_id.is_published() || new.action == Action::Terminate || new.hidden || new.deleted
    {
        return Err(ExError::new(ExErrorKind::InvalidInput)
            .with_op("publish_version")
            .with_entity_id(new.code.as_str())
            .with_message("only plain create/edit versions can be published directly"));
    }
    validate_payload(&new.code, &new.payload)?;

    let tx = begin_write(conn)?;
    let version = VersionRepo::append(&tx, &new)?;
    tx.commit().map_err(from_rusqlite)?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::migrations::apply_migrations;
    use crate::repo::NewModule;
    use chrono::Duration;
    use lineage_core::model::now;
    use serde_json::json;

    fn setup() -> Connection {
        let mut conn = db::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        conn
    }

    fn module(conn: &Connection) -> ModuleId {
        ModuleRepo::create(conn, &NewModule::titled("M"), now())
            .unwrap()
            .module_id
    }

    #[test]
    fn test_first_edit_activates_module() {
        let mut conn = setup();
        let m = module(&conn);
        let ctx = EditContext::new(m, now()).by("author");

        let v = add_new_object(&mut conn, &ctx, ObjectType::Ambitie, json!({"Title": "A"})).unwrap();

        assert_eq!(v.code.as_str(), "ambitie-1");
        assert_eq!(v.module_id, m);
        let module = ModuleRepo::require(&conn, m).unwrap();
        assert_eq!(module.state(), ModuleState::Activated);
        assert_eq!(module.row_version, 2);
    }

    #[test]
    fn test_patch_overlays_fields() {
        let mut conn = setup();
        let m = module(&conn);
        let t = now();
        let v = add_new_object(
            &mut conn,
            &EditContext::new(m, t),
            ObjectType::Ambitie,
            json!({"Title": "A", "Omschrijving": "x"}),
        )
        .unwrap();

        let patched = patch_object(
            &mut conn,
            &EditContext::new(m, t + Duration::seconds(1)),
            &v.code,
            json!({"Title": "B"}),
        )
        .unwrap();

        assert_eq!(patched.payload, json!({"Title": "B", "Omschrijving": "x"}));
        assert_eq!(patched.prior_version, Some(v.version_id));
        assert_eq!(patched.action, Action::Create);
    }

    #[test]
    fn test_edit_on_closed_module_fails() {
        let mut conn = setup();
        let m = module(&conn);
        let module = ModuleRepo::require(&conn, m).unwrap();
        let module =
            ModuleRepo::record_state(&conn, &module, ModuleState::Activated, None, now()).unwrap();
        ModuleRepo::record_state(&conn, &module, ModuleState::Closed, None, now()).unwrap();

        let err = add_new_object(
            &mut conn,
            &EditContext::new(m, now()),
            ObjectType::Ambitie,
            json!({"Title": "A"}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::ModuleClosed);
    }

    #[test]
    fn test_add_existing_requires_published_version() {
        let mut conn = setup();
        let m = module(&conn);
        let code = LineageCode::parse("ambitie-3").unwrap();

        let err = add_existing_object(&mut conn, &EditContext::new(m, now()), &code).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::NotFound);
    }

    #[test]
    fn test_publish_rejects_overlay_versions() {
        let mut conn = setup();
        let new = NewVersion::new(
            LineageCode::parse("ambitie-1").unwrap(),
            ModuleId::new(3),
            Action::Create,
            json!({"Title": "A"}),
            now(),
        );
        let err = publish_version(&mut conn, new).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidInput);
    }

    #[test]
    fn test_publish_largest_sequence_registers_lineage() {
        let mut conn = setup();
        let code = LineageCode::parse("ambitie-9223372036854775807").unwrap();
        let new = NewVersion::new(
            code.clone(),
            ModuleId::PUBLISHED,
            Action::Create,
            json!({"Title": "A"}),
            now(),
        );

        let v = publish_version(&mut conn, new).unwrap();

        assert_eq!(v.code, code);
        let stored: i64 = conn
            .query_row(
                "SELECT sequence FROM lineages WHERE code = ?1",
                [code.as_str()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(stored, i64::MAX);
    }

    #[test]
    fn test_remove_hides_lineage_from_module() {
        let mut conn = setup();
        let m = module(&conn);
        let t = now();
        let v = add_new_object(
            &mut conn,
            &EditContext::new(m, t),
            ObjectType::Beleidsdoel,
            json!({"Title": "D"}),
        )
        .unwrap();

        let removed = remove_object(&mut conn, &EditContext::new(m, t), &v.code).unwrap();
        assert!(removed.hidden && removed.deleted);

        let err = patch_object(&mut conn, &EditContext::new(m, t), &v.code, json!({})).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::NotFound);
    }
}
