//! Relation graph commands.
//!
//! An overwrite replaces every relation touching one lineage with a new set
//! and records a change-log entry, all in one write transaction. Relations of
//! other lineages are never touched.
//!
//! ## Logging Ownership
//!
//! The engine layer owns lifecycle logging for relation operations:
//! - `log_op_start!` at entry
//! - `log_op_end!` on success
//! - `log_op_error!` on failure

#![allow(clippy::result_large_err)]

use lineage_core::errors::ExError;
use lineage_core::model::{
    now, ChangeLogEntry, LineageCode, ObjectType, PeerRelation, RelationInput,
};
use lineage_core::registry::ObjectTypeRegistry;
use lineage_core::relations::plan_overwrite;
use lineage_core::{log_op_end, log_op_error, log_op_start};
use lineage_core_types::correlation::RequestContext;
use lineage_store::db::{begin_read, begin_write};
use lineage_store::errors::{from_rusqlite, Result};
use lineage_store::repo::{ChangeLogRepo, RelationRepo};
use rusqlite::Connection;

/// Replace all relations of `code` with `relations`.
///
/// Peers must be of a type in `allowed_peers`. An empty `relations` removes
/// every relation of `code`.
///
/// # Errors
///
/// - `InvalidPeerType` if a peer's object type is not allowed
/// - `InvalidInput` for a self relation or a peer listed twice
/// - `StorageFailure` for database errors (nothing is written)
pub fn overwrite_relations(
    conn: &mut Connection,
    code: &LineageCode,
    relations: &[RelationInput],
    allowed_peers: &[ObjectType],
    ctx: &RequestContext,
) -> Result<ChangeLogEntry> {
    log_op_start!(
        "overwrite_relations",
        request_id = ctx.request_id.as_str(),
        lineage_code = code.as_str(),
        relations_len = relations.len()
    );
    let start = std::time::Instant::now();

    let entry = overwrite_impl(conn, code, relations, allowed_peers, ctx).map_err(|e| {
        let e = e.with_context(ctx);
        log_op_error!(
            "overwrite_relations",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64,
            request_id = ctx.request_id.as_str()
        );
        e
    })?;

    log_op_end!(
        "overwrite_relations",
        duration_ms = start.elapsed().as_millis() as u64,
        request_id = ctx.request_id.as_str(),
        change_log_id = entry.id
    );
    Ok(entry)
}

/// [`overwrite_relations`] with the peer types the registry allows for `code`.
///
/// # Errors
///
/// Same as [`overwrite_relations`].
pub fn overwrite_relations_with_registry(
    conn: &mut Connection,
    code: &LineageCode,
    relations: &[RelationInput],
    registry: &ObjectTypeRegistry,
    ctx: &RequestContext,
) -> Result<ChangeLogEntry> {
    let allowed = registry.relation_peers(code.object_type());
    overwrite_relations(conn, code, relations, allowed, ctx)
}

fn overwrite_impl(
    conn: &mut Connection,
    code: &LineageCode,
    relations: &[RelationInput],
    allowed_peers: &[ObjectType],
    ctx: &RequestContext,
) -> Result<ChangeLogEntry> {
    let tx = begin_write(conn)?;

    let existing = RelationRepo::touching(&tx, code)?;
    let plan = plan_overwrite(
        code,
        relations,
        allowed_peers,
        existing,
        ctx.actor_id.clone(),
        now(),
    )
    .map_err(ExError::from)?;
    let entry = RelationRepo::apply_overwrite(&tx, &plan)?;

    tx.commit().map_err(from_rusqlite)?;
    Ok(entry)
}

/// Relations of `code`, seen from `code`, ordered by peer.
///
/// # Errors
///
/// `StorageFailure` for database errors.
pub fn list_relations(
    conn: &mut Connection,
    code: &LineageCode,
    ctx: &RequestContext,
) -> Result<Vec<PeerRelation>> {
    log_op_start!(
        "list_relations",
        request_id = ctx.request_id.as_str(),
        lineage_code = code.as_str()
    );
    let start = std::time::Instant::now();

    let relations = list_impl(conn, code).map_err(|e| {
        let e = e.with_context(ctx);
        log_op_error!(
            "list_relations",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64,
            request_id = ctx.request_id.as_str()
        );
        e
    })?;

    log_op_end!(
        "list_relations",
        duration_ms = start.elapsed().as_millis() as u64,
        request_id = ctx.request_id.as_str(),
        relations_len = relations.len()
    );
    Ok(relations)
}

fn list_impl(conn: &mut Connection, code: &LineageCode) -> Result<Vec<PeerRelation>> {
    let tx = begin_read(conn)?;
    RelationRepo::list(&tx, code)
}

/// Change-log entries recorded for `code`, oldest first.
///
/// # Errors
///
/// `StorageFailure` for database errors.
pub fn relation_history(conn: &Connection, code: &LineageCode) -> Result<Vec<ChangeLogEntry>> {
    ChangeLogRepo::for_subject(conn, code)
}
