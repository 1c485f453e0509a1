//! Hierarchy check on demand.
//!
//! Same check completion runs, without the caller's validator and without
//! writing anything. Useful for showing a module's problems before an author
//! asks to complete it.
//!
//! ## Logging Ownership
//!
//! The engine layer owns lifecycle logging for checks:
//! - `log_op_start!` at entry
//! - `log_op_end!` on success
//! - `log_op_error!` on failure

#![allow(clippy::result_large_err)]

use lineage_core::hierarchy;
use lineage_core::model::{now, ModuleId};
use lineage_core::registry::ObjectTypeRegistry;
use lineage_core::validation::ValidationError;
use lineage_core::{log_op_end, log_op_error, log_op_start};
use lineage_core_types::correlation::RequestContext;
use lineage_store::db::begin_read;
use lineage_store::errors::Result;
use lineage_store::repo::ModuleRepo;
use lineage_store::SqliteVersionSource;
use rusqlite::Connection;

/// Hierarchy errors in the view of `module_id` as of now.
///
/// # Errors
///
/// `NotFound` if the module does not exist.
pub fn check_module(
    conn: &mut Connection,
    module_id: ModuleId,
    registry: &ObjectTypeRegistry,
    ctx: &RequestContext,
) -> Result<Vec<ValidationError>> {
    log_op_start!(
        "check_module",
        request_id = ctx.request_id.as_str(),
        module_id = module_id.get()
    );
    let start = std::time::Instant::now();

    let errors = check_impl(conn, module_id, registry).map_err(|e| {
        let e = e.with_context(ctx);
        log_op_error!(
            "check_module",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64,
            request_id = ctx.request_id.as_str()
        );
        e
    })?;

    log_op_end!(
        "check_module",
        duration_ms = start.elapsed().as_millis() as u64,
        request_id = ctx.request_id.as_str(),
        errors_len = errors.len()
    );
    Ok(errors)
}

fn check_impl(
    conn: &mut Connection,
    module_id: ModuleId,
    registry: &ObjectTypeRegistry,
) -> Result<Vec<ValidationError>> {
    let tx = begin_read(conn)?;
    ModuleRepo::require(&tx, module_id)?;
    let source = SqliteVersionSource::new(&tx);
    let errors = hierarchy::check_module(&source, module_id, now(), registry)?;
    Ok(errors)
}
