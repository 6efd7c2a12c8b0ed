#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{by_id, customer_db, customer_row, customers};
use serde_json::json;
use yuow_core::errors::{PersistenceError, PersistenceOperation, UowError};
use yuow_core::logging_facility::test_capture::{init_test_capture, CapturedEvent, TestCapture};
use yuow_core::{log_op_end, log_op_error, log_op_start, UnitOfWork, UowOptions};
use yuow_core_types::schema::{
    EVENT_END, EVENT_END_ERROR, EVENT_START, FIELD_ATTEMPT, FIELD_ERR_CODE, FIELD_IDENTITY,
    FIELD_ISOLATION, FIELD_OPERATION, FIELD_REPOSITORY, FIELD_TABLE, FIELD_UNIT_ID,
};

/// Unit id of the runner span that emitted `marker`
fn unit_id_of(capture: &TestCapture, marker: &str) -> String {
    capture
        .events()
        .into_iter()
        .find(|e| e.field("marker") == Some(marker))
        .and_then(|e| e.field(FIELD_UNIT_ID).map(str::to_string))
        .expect("marker event inside a unit span")
}

fn runner_events(capture: &TestCapture, unit_id: &str) -> Vec<CapturedEvent> {
    capture
        .events_for("unit_of_work")
        .into_iter()
        .filter(|e| e.field(FIELD_UNIT_ID) == Some(unit_id))
        .collect()
}

#[test]
fn test_log_op_start_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_start_unique_1";

    log_op_start!(op_name, repository = "customers");

    let events = capture.events_for(op_name);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event.as_deref(), Some(EVENT_START));
    assert_eq!(events[0].field("repository"), Some("customers"));
}

#[test]
fn test_log_op_end_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_end_unique_2";

    log_op_end!(op_name, duration_ms = 42);

    let events = capture.events_for(op_name);
    assert_eq!(events.len(), 1, "Should have exactly one end event");
    assert_eq!(events[0].event.as_deref(), Some(EVENT_END));
    assert_eq!(events[0].field("duration_ms"), Some("42"));
}

#[test]
fn test_log_op_error_includes_code() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_unique_3";

    let err: UowError = PersistenceError {
        repository: "customers".into(),
        identity: "A".into(),
        operation: PersistenceOperation::Delete,
    }
    .into();
    log_op_error!(op_name, err, duration_ms = 10);

    capture.assert_event_exists(op_name, EVENT_END_ERROR);
    let event = &capture.events_for(op_name)[0];
    assert_eq!(event.field(FIELD_ERR_CODE), Some("ERR_PERSISTENCE_CONFLICT"));
    assert_eq!(event.field("err.kind"), Some("PersistenceConflict"));
    assert_eq!(
        event.field("error"),
        Some("customers cannot perform an delete operation on entity with identity \"A\"")
    );
}

#[test]
#[should_panic(expected = "Expected event")]
fn test_assert_event_exists_fails_for_missing_event() {
    let capture = init_test_capture();
    capture.assert_event_exists("nonexistent_op_truly_unique_999", EVENT_START);
}

#[test]
fn test_runner_emits_start_and_end_with_correlation() {
    // Given a unit that marks its own span
    let capture = init_test_capture();
    let db = customer_db();
    let uow = UnitOfWork::new(db.clone());

    // When it succeeds on the first attempt
    uow.run(|_| {
        tracing::info!(marker = "runner_success_unique_10");
        Ok(())
    })
    .unwrap();

    // Then the runner logged one start and one end carrying the unit id
    let unit_id = unit_id_of(&capture, "runner_success_unique_10");
    let events = runner_events(&capture, &unit_id);
    let kinds: Vec<_> = events.iter().map(|e| e.event.as_deref()).collect();
    assert_eq!(kinds, vec![Some(EVENT_START), Some(EVENT_END)]);
    assert!(events.iter().all(|e| e.field(FIELD_ATTEMPT) == Some("1")));
    assert_eq!(events[0].field("max_attempts"), Some("3"));
    assert_eq!(events[0].field(FIELD_ISOLATION), Some("read committed"));
}

#[test]
fn test_runner_logs_each_conflicting_attempt() {
    // Given a row bumped externally on every attempt
    let capture = init_test_capture();
    let db = customer_db();
    db.seed("customers", customer_row("A", "X", 1));
    let uow = UnitOfWork::new(db.clone());

    // When the unit runs with two attempts
    let err = uow
        .run_with(UowOptions::new().max_attempts(2), |ctx| {
            tracing::info!(marker = "runner_conflict_unique_11");
            let repo = ctx.get_repository(&customers());
            repo.find_one(by_id("A"))?.unwrap().borrow_mut().change_name("Y");
            let stored = db.row("customers", &by_id("A")).unwrap();
            let next = stored["version"].as_u64().unwrap() + 1;
            db.tamper("customers", &by_id("A"), "version", json!(next));
            Ok(())
        })
        .unwrap_err();
    assert!(err.is_conflict());

    // Then both attempts share the unit id and each ended in error
    let unit_id = unit_id_of(&capture, "runner_conflict_unique_11");
    let errors: Vec<_> = runner_events(&capture, &unit_id)
        .into_iter()
        .filter(|e| e.event.as_deref() == Some(EVENT_END_ERROR))
        .collect();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].field(FIELD_ATTEMPT), Some("1"));
    assert_eq!(errors[1].field(FIELD_ATTEMPT), Some("2"));
    assert!(errors
        .iter()
        .all(|e| e.field(FIELD_ERR_CODE) == Some("ERR_PERSISTENCE_CONFLICT")));
}

#[test]
fn test_flush_logs_written_entities() {
    // Given a new customer
    let capture = init_test_capture();
    let db = customer_db();
    let uow = UnitOfWork::new(db.clone());

    // When it is flushed
    uow.run(|ctx| {
        tracing::info!(marker = "flush_debug_unique_12");
        ctx.get_repository(&customers())
            .add(&yuow_core::track(common::Customer::new("flush-log-A", "X")))?;
        Ok(())
    })
    .unwrap();

    // Then a debug event names the repository, identity and operation
    let unit_id = unit_id_of(&capture, "flush_debug_unique_12");
    let found = capture.count_events(|e| {
        e.field(FIELD_UNIT_ID) == Some(unit_id.as_str())
            && e.field(FIELD_IDENTITY) == Some("flush-log-A")
            && e.field(FIELD_OPERATION) == Some("insert")
            && e.field(FIELD_REPOSITORY) == Some("customers")
    });
    assert_eq!(found, 1);

    // And the mapper's insert names its table
    let inserts = capture.count_events(|e| {
        e.field(FIELD_UNIT_ID) == Some(unit_id.as_str())
            && e.field(FIELD_TABLE) == Some("customers")
            && e.field("message") == Some("mapper insert")
    });
    assert_eq!(inserts, 1);
}
