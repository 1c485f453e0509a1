// Boundary logging of engine commands.
// Each command emits one start event and exactly one end or end_error event,
// correlated by request id.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use lineage_core::lifecycle::TransitionOptions;
use lineage_core::logging_facility::{init_test_capture, CapturedEvent, TestCapture};
use lineage_core::model::{now, ModuleId, ModuleState};
use lineage_core::registry::ObjectTypeRegistry;
use lineage_core::resolver::ResolveMode;
use lineage_core::validation::NoopModuleValidator;
use lineage_core_types::correlation::RequestContext;
use lineage_core_types::schema::{
    EVENT_END, EVENT_END_ERROR, EVENT_START, FIELD_DURATION_MS, FIELD_ERR_CODE, FIELD_MERGED_LEN,
    FIELD_REQUEST_ID, FIELD_RESOLVED_LEN, FIELD_TARGET_STATE,
};
use lineage_engine::commands::resolve::resolve;
use lineage_engine::commands::transition::transition;
use lineage_store::repo::{ModuleRepo, NewModule};
use rusqlite::Connection;
use std::collections::BTreeSet;
use tempfile::TempDir;

fn setup_db() -> (TempDir, Connection) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let mut conn = lineage_store::db::open(&db_path).unwrap();
    lineage_store::migrations::apply_migrations(&mut conn).unwrap();
    (temp_dir, conn)
}

/// Events of `op`/`event` that belong to `ctx`; tests in this binary run in
/// parallel and share one capture.
fn events_for(
    capture: &TestCapture,
    op: &str,
    event: &str,
    ctx: &RequestContext,
) -> Vec<CapturedEvent> {
    capture
        .find(op, event)
        .into_iter()
        .filter(|e| e.field(FIELD_REQUEST_ID) == Some(ctx.request_id.as_str()))
        .collect()
}

#[test]
fn test_resolve_emits_start_and_end() {
    let capture = init_test_capture();
    let (_tmp, mut conn) = setup_db();
    let ctx = RequestContext::new();

    resolve(
        &mut conn,
        &BTreeSet::new(),
        None,
        now(),
        ResolveMode::Latest,
        &ctx,
    )
    .unwrap();

    assert_eq!(events_for(&capture, "resolve", EVENT_START, &ctx).len(), 1);
    let ends = events_for(&capture, "resolve", EVENT_END, &ctx);
    assert_eq!(ends.len(), 1);
    assert_eq!(ends[0].field(FIELD_RESOLVED_LEN), Some("0"));
    assert!(ends[0].field(FIELD_DURATION_MS).is_some());
    assert!(events_for(&capture, "resolve", EVENT_END_ERROR, &ctx).is_empty());
}

#[test]
fn test_failed_transition_emits_error_with_code() {
    let capture = init_test_capture();
    let (_tmp, mut conn) = setup_db();
    let ctx = RequestContext::new();
    let m = ModuleRepo::create(&conn, &NewModule::titled("M"), now())
        .unwrap()
        .module_id;

    let err = transition(
        &mut conn,
        m,
        ModuleState::Closed,
        &TransitionOptions::default(),
        &ObjectTypeRegistry::builtin(),
        &NoopModuleValidator,
        &ctx,
    )
    .unwrap_err();

    // The returned error carries the request's correlation id
    assert_eq!(err.request_id(), Some(&ctx.request_id));

    let starts = events_for(&capture, "transition", EVENT_START, &ctx);
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0].field(FIELD_TARGET_STATE), Some("closed"));

    let errors = events_for(&capture, "transition", EVENT_END_ERROR, &ctx);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field(FIELD_ERR_CODE), Some("ERR_INVALID_TRANSITION"));
    assert!(events_for(&capture, "transition", EVENT_END, &ctx).is_empty());
}

#[test]
fn test_successful_transition_reports_row_version() {
    let capture = init_test_capture();
    let (_tmp, mut conn) = setup_db();
    let ctx = RequestContext::for_actor("logger");
    let m = ModuleRepo::create(
        &conn,
        &NewModule::titled("M").with_id(ModuleId::new(12)),
        now(),
    )
    .unwrap()
    .module_id;

    let outcome = transition(
        &mut conn,
        m,
        ModuleState::Activated,
        &TransitionOptions::default(),
        &ObjectTypeRegistry::builtin(),
        &NoopModuleValidator,
        &ctx,
    )
    .unwrap();

    let ends = events_for(&capture, "transition", EVENT_END, &ctx);
    assert_eq!(ends.len(), 1);
    assert_eq!(ends[0].field(FIELD_MERGED_LEN), Some("0"));
    assert_eq!(
        ends[0].field("row_version"),
        Some(outcome.module.row_version.to_string().as_str())
    );
}
