// Hierarchy safety of module completion.
// Any object's Hierarchy_Code must point at a lineage that is visible in the
// module's prospective view.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::Duration;
use lineage_core::errors::ExErrorKind;
use lineage_core::hierarchy::RULE_REQUIRED_HIERARCHY_CODE;
use lineage_core::lifecycle::TransitionOptions;
use lineage_core::model::{now, LineageCode, ModuleId, ModuleState, ObjectType};
use lineage_core::registry::ObjectTypeRegistry;
use lineage_core::validation::NoopModuleValidator;
use lineage_core_types::correlation::RequestContext;
use lineage_engine::commands::check::check_module;
use lineage_engine::commands::transition::transition;
use lineage_store::edits::{add_new_object, terminate_object, EditContext};
use lineage_store::errors::Result;
use lineage_store::repo::{ModuleRepo, NewModule};
use rusqlite::Connection;
use serde_json::{json, Value};
use tempfile::TempDir;

fn setup_db() -> (TempDir, Connection) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let mut conn = lineage_store::db::open(&db_path).unwrap();
    lineage_store::migrations::apply_migrations(&mut conn).unwrap();
    (temp_dir, conn)
}

fn new_module(conn: &Connection) -> ModuleId {
    ModuleRepo::create(conn, &NewModule::titled("Module"), now() - Duration::hours(1))
        .unwrap()
        .module_id
}

fn add(
    conn: &mut Connection,
    m: ModuleId,
    object_type: ObjectType,
    payload: Value,
) -> LineageCode {
    add_new_object(conn, &EditContext::new(m, now()), object_type, payload)
        .unwrap()
        .code
}

fn complete(conn: &mut Connection, m: ModuleId) -> Result<()> {
    transition(
        conn,
        m,
        ModuleState::Completed,
        &TransitionOptions::default(),
        &ObjectTypeRegistry::builtin(),
        &NoopModuleValidator,
        &RequestContext::new(),
    )
    .map(|_| ())
}

/// Publish a beleidsdoel and a beleidskeuze under it.
fn published_pair(conn: &mut Connection) -> (LineageCode, LineageCode) {
    let m = new_module(conn);
    let doel = add(conn, m, ObjectType::Beleidsdoel, json!({"Title": "Doel"}));
    let keuze = add(
        conn,
        m,
        ObjectType::Beleidskeuze,
        json!({"Title": "Keuze", "Hierarchy_Code": doel.as_str()}),
    );
    complete(conn, m).unwrap();
    (doel, keuze)
}

#[test]
fn test_parent_created_in_same_module_is_accepted() {
    let (_tmp, mut conn) = setup_db();
    let (doel, keuze) = published_pair(&mut conn);

    assert_eq!(doel.as_str(), "beleidsdoel-1");
    assert_eq!(keuze.as_str(), "beleidskeuze-1");
}

#[test]
fn test_terminating_referenced_parent_blocks_completion() {
    let (_tmp, mut conn) = setup_db();
    let (doel, keuze) = published_pair(&mut conn);

    // Given: a module that terminates the beleidsdoel but keeps the keuze
    let m = new_module(&conn);
    terminate_object(&mut conn, &EditContext::new(m, now()), &doel).unwrap();

    // Then: the check reports the orphaned keuze
    let errors = check_module(
        &mut conn,
        m,
        &ObjectTypeRegistry::builtin(),
        &RequestContext::new(),
    )
    .unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, keuze);
    assert_eq!(errors[0].rule, RULE_REQUIRED_HIERARCHY_CODE);
    assert!(errors[0].is_blocking());

    // And: completion is refused with the same error
    let err = complete(&mut conn, m).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::ValidationFailed);
    assert_eq!(err.validation_errors(), errors.as_slice());
    assert_eq!(
        ModuleRepo::require(&conn, m).unwrap().state(),
        ModuleState::Activated
    );
}

#[test]
fn test_terminating_parent_and_child_together_is_accepted() {
    let (_tmp, mut conn) = setup_db();
    let (doel, keuze) = published_pair(&mut conn);

    let m = new_module(&conn);
    let ctx = EditContext::new(m, now());
    terminate_object(&mut conn, &ctx, &keuze).unwrap();
    terminate_object(&mut conn, &ctx, &doel).unwrap();

    assert!(check_module(
        &mut conn,
        m,
        &ObjectTypeRegistry::builtin(),
        &RequestContext::new()
    )
    .unwrap()
    .is_empty());
    complete(&mut conn, m).unwrap();
}

#[test]
fn test_parent_pointer_checked_on_any_object_type() {
    let (_tmp, mut conn) = setup_db();

    // Given: a published beleidsregel with a gebiedsprogramma pointing at it
    let m = new_module(&conn);
    let regel = add(&mut conn, m, ObjectType::Beleidsregel, json!({"Title": "Regel"}));
    let programma = add(
        &mut conn,
        m,
        ObjectType::Gebiedsprogramma,
        json!({"Title": "Programma", "Hierarchy_Code": regel.as_str()}),
    );
    complete(&mut conn, m).unwrap();

    // When: a second module terminates the beleidsregel
    let m2 = new_module(&conn);
    terminate_object(&mut conn, &EditContext::new(m2, now()), &regel).unwrap();

    // Then: the orphaned gebiedsprogramma is reported and completion refused
    let errors = check_module(
        &mut conn,
        m2,
        &ObjectTypeRegistry::builtin(),
        &RequestContext::new(),
    )
    .unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, programma);
    assert_eq!(errors[0].rule, RULE_REQUIRED_HIERARCHY_CODE);

    let err = complete(&mut conn, m2).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::ValidationFailed);
}

#[test]
fn test_pointer_to_unknown_lineage_is_reported() {
    let (_tmp, mut conn) = setup_db();
    let m = new_module(&conn);
    let maatregel = add(
        &mut conn,
        m,
        ObjectType::Maatregel,
        json!({"Title": "Maatregel", "Hierarchy_Code": "beleidskeuze-77"}),
    );

    let errors = check_module(
        &mut conn,
        m,
        &ObjectTypeRegistry::builtin(),
        &RequestContext::new(),
    )
    .unwrap();

    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, maatregel);
    assert!(errors[0].message.contains("beleidskeuze-77"));
}

#[test]
fn test_missing_hierarchy_code_is_not_checked() {
    let (_tmp, mut conn) = setup_db();
    let m = new_module(&conn);
    add(&mut conn, m, ObjectType::Beleidskeuze, json!({"Title": "Los"}));
    add(
        &mut conn,
        m,
        ObjectType::Maatregel,
        json!({"Title": "Los", "Hierarchy_Code": null}),
    );

    complete(&mut conn, m).unwrap();
}

#[test]
fn test_check_unknown_module_is_not_found() {
    let (_tmp, mut conn) = setup_db();
    let err = check_module(
        &mut conn,
        ModuleId::new(404),
        &ObjectTypeRegistry::builtin(),
        &RequestContext::new(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::NotFound);
}
