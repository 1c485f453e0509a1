//! Module state transitions and the completion merge.
//!
//! ## Completion pipeline (in order, one IMMEDIATE transaction):
//! 1. Load the module; optional row-version expectation
//! 2. Check the transition is legal (`Completed -> Completed` is a conflict)
//! 3. Resolve the module-scoped view at `now` in `Effective` mode
//! 4. Hierarchy check plus the caller's validator; blocking errors stop here
//!    with nothing written
//! 5. Record the new state (compare-and-swap on the row version)
//! 6. Append one published version per overlay lineage
//! 7. Commit
//!
//! Any failure before the commit rolls the whole transaction back, so the
//! module keeps its previous state and no partial merge is visible.
//!
//! ## Logging Ownership
//!
//! The engine layer owns lifecycle logging for transitions:
//! - `log_op_start!` at entry
//! - `log_op_end!` on success
//! - `log_op_error!` on failure
//!
//! Lower layers (store, core) use only `tracing::debug!()` for internal details.

#![allow(clippy::result_large_err)]

use chrono::{DateTime, Utc};
use lineage_core::errors::{ExError, LineageError};
use lineage_core::hierarchy;
use lineage_core::lifecycle::{plan_merge, validate_transition, TransitionOptions};
use lineage_core::model::{now, LineageCode, Module, ModuleId, ModuleState, Version};
use lineage_core::registry::ObjectTypeRegistry;
use lineage_core::resolver::{overlay_view, resolve, ResolveMode, VersionSource};
use lineage_core::validation::{self, ModuleValidator, ModuleView};
use lineage_core::{log_op_end, log_op_error, log_op_start};
use lineage_core_types::correlation::RequestContext;
use lineage_store::db::begin_write;
use lineage_store::errors::{from_rusqlite, Result};
use lineage_store::repo::{ModuleRepo, VersionRepo};
use lineage_store::SqliteVersionSource;
use rusqlite::Connection;
use std::collections::{BTreeMap, BTreeSet};

/// What a successful transition produced.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    /// The module as stored after the transition.
    pub module: Module,
    /// Published versions written by a completion merge, ordered by code.
    pub merged: Vec<Version>,
}

/// Move `module_id` to `target`.
///
/// # Errors
///
/// - `NotFound` if the module does not exist
/// - `InvalidTransition` for an illegal move
/// - `Conflict` if the module was completed concurrently, or its row version
///   differs from `options.expected_row_version`
/// - `ValidationFailed` if completion is blocked; the error carries every
///   blocking validation error
/// - `NonMonotonicVersion` / `StorageFailure` if the merge cannot be written
pub fn transition(
    conn: &mut Connection,
    module_id: ModuleId,
    target: ModuleState,
    options: &TransitionOptions,
    registry: &ObjectTypeRegistry,
    validator: &dyn ModuleValidator,
    ctx: &RequestContext,
) -> Result<TransitionOutcome> {
    log_op_start!(
        "transition",
        request_id = ctx.request_id.as_str(),
        module_id = module_id.get(),
        target_state = target.as_str()
    );
    let start = std::time::Instant::now();

    let outcome =
        transition_impl(conn, module_id, target, options, registry, validator, ctx).map_err(
            |e| {
                let e = e.with_context(ctx);
                log_op_error!(
                    "transition",
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    request_id = ctx.request_id.as_str()
                );
                e
            },
        )?;

    log_op_end!(
        "transition",
        duration_ms = start.elapsed().as_millis() as u64,
        request_id = ctx.request_id.as_str(),
        merged_len = outcome.merged.len(),
        row_version = outcome.module.row_version
    );
    Ok(outcome)
}

fn transition_impl(
    conn: &mut Connection,
    module_id: ModuleId,
    target: ModuleState,
    options: &TransitionOptions,
    registry: &ObjectTypeRegistry,
    validator: &dyn ModuleValidator,
    ctx: &RequestContext,
) -> Result<TransitionOutcome> {
    let at = now();
    let tx = begin_write(conn)?;

    let module = ModuleRepo::require(&tx, module_id)?;
    if let Some(expected) = options.expected_row_version {
        if expected != module.row_version {
            return Err(LineageError::TransitionConflict {
                module_id: module_id.get(),
                reason: format!(
                    "expected row version {}, found {}",
                    expected, module.row_version
                ),
            }
            .into());
        }
    }
    validate_transition(module_id, module.state(), target).map_err(ExError::from)?;

    let merge_plan = if target == ModuleState::Completed {
        let source = SqliteVersionSource::new(&tx);
        let overlay = overlay_view(&source, module_id)?;
        check_completion(&source, module_id, &overlay, registry, validator, at)?;
        plan_merge(&overlay, at, options)
    } else {
        Vec::new()
    };

    let module = ModuleRepo::record_state(&tx, &module, target, ctx.actor_id.as_deref(), at)?;
    let mut merged = Vec::with_capacity(merge_plan.len());
    for new in &merge_plan {
        merged.push(VersionRepo::append(&tx, new)?);
    }

    tx.commit().map_err(from_rusqlite)?;
    tracing::debug!(
        module_id = module_id.get(),
        state = target.as_str(),
        merged = merged.len(),
        "transition committed"
    );
    Ok(TransitionOutcome { module, merged })
}

/// Run every pre-completion check against the module-scoped view.
fn check_completion(
    source: &SqliteVersionSource<'_>,
    module_id: ModuleId,
    overlay: &BTreeMap<LineageCode, Version>,
    registry: &ObjectTypeRegistry,
    validator: &dyn ModuleValidator,
    at: DateTime<Utc>,
) -> Result<()> {
    let codes = source.known_codes(Some(module_id))?;
    let resolved = resolve(source, &codes, Some(module_id), at, ResolveMode::Effective)?;
    let touched: BTreeSet<LineageCode> = overlay.keys().cloned().collect();

    let mut errors = hierarchy::check_view(&resolved, registry);
    errors.extend(validator.validate(&ModuleView {
        module_id,
        resolved: &resolved,
        touched: &touched,
    }));

    let blocking = validation::blocking(errors);
    if blocking.is_empty() {
        return Ok(());
    }
    Err(LineageError::ValidationFailed {
        module_id: module_id.get(),
        errors: blocking,
    }
    .into())
}
