// Completion merge under failure and contention.
// A merge either publishes every overlay lineage together with the state
// change or leaves no trace; racing completions yield one winner.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::Duration;
use lineage_core::errors::ExErrorKind;
use lineage_core::lifecycle::TransitionOptions;
use lineage_core::model::{now, ModuleId, ModuleState, ObjectType};
use lineage_core::registry::ObjectTypeRegistry;
use lineage_core::validation::NoopModuleValidator;
use lineage_core_types::correlation::RequestContext;
use lineage_engine::commands::transition::transition;
use lineage_store::edits::{add_new_object, EditContext};
use lineage_store::repo::{ModuleRepo, NewModule};
use rusqlite::Connection;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

fn setup_db() -> (TempDir, PathBuf, Connection) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let mut conn = lineage_store::db::open(&db_path).unwrap();
    lineage_store::migrations::apply_migrations(&mut conn).unwrap();
    (temp_dir, db_path, conn)
}

fn module_with_objects(conn: &mut Connection, count: usize) -> ModuleId {
    let m = ModuleRepo::create(conn, &NewModule::titled("Module"), now() - Duration::hours(1))
        .unwrap()
        .module_id;
    let ctx = EditContext::new(m, now() - Duration::minutes(10));
    for i in 0..count {
        add_new_object(
            conn,
            &ctx,
            ObjectType::Ambitie,
            json!({"Title": format!("Ambitie {}", i)}),
        )
        .unwrap();
    }
    m
}

fn complete(conn: &mut Connection, module_id: ModuleId) -> lineage_store::Result<usize> {
    transition(
        conn,
        module_id,
        ModuleState::Completed,
        &TransitionOptions::default(),
        &ObjectTypeRegistry::builtin(),
        &NoopModuleValidator,
        &RequestContext::new(),
    )
    .map(|outcome| outcome.merged.len())
}

fn published_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM versions WHERE module_id = 0", [], |r| r.get(0))
        .unwrap()
}

// ---------------------------------------------------------------------------
// Failure injection
// ---------------------------------------------------------------------------

#[test]
fn test_failed_merge_write_rolls_back_everything() {
    let (_tmp, _path, mut conn) = setup_db();
    let m = module_with_objects(&mut conn, 3);
    let before = ModuleRepo::require(&conn, m).unwrap();

    // Given: the second published insert of the merge will fail
    conn.execute_batch(
        "CREATE TRIGGER fail_second_merge_write BEFORE INSERT ON versions
         WHEN NEW.module_id = 0
          AND (SELECT COUNT(*) FROM versions WHERE module_id = 0) >= 1
         BEGIN
             SELECT RAISE(ABORT, 'injected merge failure');
         END;",
    )
    .unwrap();

    // When
    let err = complete(&mut conn, m).unwrap_err();

    // Then: nothing from the attempt is visible
    assert_eq!(err.kind(), ExErrorKind::StorageFailure);
    assert_eq!(published_count(&conn), 0);
    let after = ModuleRepo::require(&conn, m).unwrap();
    assert_eq!(after.state(), ModuleState::Activated);
    assert_eq!(after.row_version, before.row_version);
    assert_eq!(
        ModuleRepo::status_history(&conn, m).unwrap().len(),
        before.status_history.len()
    );

    // And: once the fault is gone the completion goes through in full
    conn.execute_batch("DROP TRIGGER fail_second_merge_write;")
        .unwrap();
    assert_eq!(complete(&mut conn, m).unwrap(), 3);
    assert_eq!(published_count(&conn), 3);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

fn complete_from_thread(
    path: &Path,
    module_id: ModuleId,
    barrier: Arc<Barrier>,
) -> Result<usize, ExErrorKind> {
    let mut conn = lineage_store::db::open(path).unwrap();
    barrier.wait();
    complete(&mut conn, module_id).map_err(|e| e.kind())
}

#[test]
fn test_concurrent_completions_have_one_winner() {
    let (_tmp, path, mut conn) = setup_db();
    let m = module_with_objects(&mut conn, 2);

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || complete_from_thread(&path, m, barrier))
        })
        .collect();
    let results: Vec<Result<usize, ExErrorKind>> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    let losers: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();
    assert_eq!(winners, vec![&2]);
    assert_eq!(losers, vec![&ExErrorKind::Conflict]);

    // Each lineage was published exactly once
    assert_eq!(published_count(&conn), 2);
    let per_lineage: i64 = conn
        .query_row(
            "SELECT MAX(n) FROM (SELECT COUNT(*) AS n FROM versions
             WHERE module_id = 0 GROUP BY lineage_code)",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(per_lineage, 1);
    assert_eq!(
        ModuleRepo::require(&conn, m).unwrap().state(),
        ModuleState::Completed
    );
}
