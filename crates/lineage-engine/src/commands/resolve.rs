//! Resolution requests.
//!
//! ## Logging Ownership
//!
//! The engine layer owns lifecycle logging for resolution:
//! - `log_op_start!` at entry
//! - `log_op_end!` on success
//! - `log_op_error!` on failure
//!
//! The resolver and the SQLite source use only `tracing::debug!()`.

#![allow(clippy::result_large_err)]

use chrono::{DateTime, Utc};
use lineage_core::model::{LineageCode, ModuleId, Version};
use lineage_core::resolver::{self, ResolveMode};
use lineage_core::{log_op_end, log_op_error, log_op_start};
use lineage_core_types::correlation::RequestContext;
use lineage_store::db::begin_read;
use lineage_store::errors::Result;
use lineage_store::SqliteVersionSource;
use rusqlite::Connection;
use std::collections::{BTreeMap, BTreeSet};

/// Resolve `codes` as seen from `module_id` (or the published timeline) at `as_of`.
///
/// Every query runs inside one read transaction so the answer reflects a
/// single snapshot, even while a completion merge is being written.
///
/// # Errors
///
/// `StorageFailure` for database errors, `Serialization` for corrupt rows.
pub fn resolve(
    conn: &mut Connection,
    codes: &BTreeSet<LineageCode>,
    module_id: Option<ModuleId>,
    as_of: DateTime<Utc>,
    mode: ResolveMode,
    ctx: &RequestContext,
) -> Result<BTreeMap<LineageCode, Version>> {
    log_op_start!(
        "resolve",
        request_id = ctx.request_id.as_str(),
        module_id = module_id.map(|m| m.get()),
        requested_len = codes.len()
    );
    let start = std::time::Instant::now();

    let resolved = resolve_impl(conn, codes, module_id, as_of, mode).map_err(|e| {
        let e = e.with_context(ctx);
        log_op_error!(
            "resolve",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64,
            request_id = ctx.request_id.as_str()
        );
        e
    })?;

    log_op_end!(
        "resolve",
        duration_ms = start.elapsed().as_millis() as u64,
        request_id = ctx.request_id.as_str(),
        resolved_len = resolved.len()
    );
    Ok(resolved)
}

fn resolve_impl(
    conn: &mut Connection,
    codes: &BTreeSet<LineageCode>,
    module_id: Option<ModuleId>,
    as_of: DateTime<Utc>,
    mode: ResolveMode,
) -> Result<BTreeMap<LineageCode, Version>> {
    let tx = begin_read(conn)?;
    let source = SqliteVersionSource::new(&tx);
    resolver::resolve(&source, codes, module_id, as_of, mode)
}

/// Resolve every lineage visible from `module_id` (or the published timeline).
///
/// # Errors
///
/// Same as [`resolve`].
pub fn resolve_all(
    conn: &mut Connection,
    module_id: Option<ModuleId>,
    as_of: DateTime<Utc>,
    mode: ResolveMode,
    ctx: &RequestContext,
) -> Result<BTreeMap<LineageCode, Version>> {
    log_op_start!(
        "resolve_all",
        request_id = ctx.request_id.as_str(),
        module_id = module_id.map(|m| m.get())
    );
    let start = std::time::Instant::now();

    let resolved = resolve_all_impl(conn, module_id, as_of, mode).map_err(|e| {
        let e = e.with_context(ctx);
        log_op_error!(
            "resolve_all",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64,
            request_id = ctx.request_id.as_str()
        );
        e
    })?;

    log_op_end!(
        "resolve_all",
        duration_ms = start.elapsed().as_millis() as u64,
        request_id = ctx.request_id.as_str(),
        resolved_len = resolved.len()
    );
    Ok(resolved)
}

fn resolve_all_impl(
    conn: &mut Connection,
    module_id: Option<ModuleId>,
    as_of: DateTime<Utc>,
    mode: ResolveMode,
) -> Result<BTreeMap<LineageCode, Version>> {
    let tx = begin_read(conn)?;
    let source = SqliteVersionSource::new(&tx);
    let codes = resolver::VersionSource::known_codes(&source, module_id)?;
    resolver::resolve(&source, &codes, module_id, as_of, mode)
}
