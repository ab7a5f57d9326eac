use crudkit_core::db::{open_db, open_db_in_memory};
use crudkit_core::model::counter::{Increment, MAX_COUNT};
use crudkit_core::repo::counter_repo::{CounterRepository, SqliteCounterRepository};
use crudkit_core::{CrudError, ResourceService};
use serde_json::json;
use std::thread;
use uuid::Uuid;

const WORKERS: i64 = 8;
const INCREMENTS_PER_WORKER: i64 = 25;

#[test]
fn increment_defaults_to_one() {
    let conn = open_db_in_memory().unwrap();
    let service = ResourceService::new(SqliteCounterRepository::try_new(&conn).unwrap());
    let counter = service.create(&json!({ "name": "IPA" })).unwrap();
    assert_eq!(counter.count, 0);

    let bumped = service
        .increment(&json!({ "id": counter.id.to_string() }))
        .unwrap();
    assert_eq!(bumped.count, 1);

    let lowered = service
        .increment(&json!({ "id": counter.id.to_string(), "by": -3 }))
        .unwrap();
    assert_eq!(lowered.count, -2);
}

#[test]
fn increment_on_missing_counter_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCounterRepository::try_new(&conn).unwrap();
    let missing = Uuid::new_v4();

    let err = repo
        .increment(&Increment { id: missing, by: 1 })
        .unwrap_err();
    assert!(matches!(err, CrudError::NotFound { resource: "counter", id } if id == missing));
}

#[test]
fn count_outside_the_bounds_is_rejected_on_create_and_patch() {
    let conn = open_db_in_memory().unwrap();
    let service = ResourceService::new(SqliteCounterRepository::try_new(&conn).unwrap());

    let err = service
        .create(&json!({ "name": "Huge", "count": i64::MAX }))
        .unwrap_err();
    assert!(matches!(&err, CrudError::Validation(validation) if validation.has_issue("count")));

    let counter = service.create(&json!({ "name": "Porter" })).unwrap();
    let err = service
        .update(&json!({ "id": counter.id.to_string(), "count": MAX_COUNT + 1 }))
        .unwrap_err();
    assert!(matches!(&err, CrudError::Validation(validation) if validation.has_issue("count")));
}

#[test]
fn increment_past_the_bound_is_a_conflict_and_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let service = ResourceService::new(SqliteCounterRepository::try_new(&conn).unwrap());
    let repo = SqliteCounterRepository::try_new(&conn).unwrap();
    let counter = service
        .create(&json!({ "name": "Ceiling", "count": MAX_COUNT }))
        .unwrap();

    let err = repo
        .increment(&Increment {
            id: counter.id,
            by: 1,
        })
        .unwrap_err();
    assert!(matches!(err, CrudError::Conflict { resource: "counter", .. }));

    let lowered = repo
        .increment(&Increment {
            id: counter.id,
            by: -1,
        })
        .unwrap();
    assert_eq!(lowered.count, MAX_COUNT - 1);
}

#[test]
fn counter_delete_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let service = ResourceService::new(SqliteCounterRepository::try_new(&conn).unwrap());
    let counter = service.create(&json!({ "name": "Stout", "count": 4 })).unwrap();
    let id_input = json!({ "id": counter.id.to_string() });

    assert!(service.delete(&id_input).unwrap().deleted);
    assert!(!service.delete(&id_input).unwrap().deleted);
}

#[test]
fn concurrent_increments_are_never_lost() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("counters.db");

    let counter_id = {
        let conn = open_db(&path).unwrap();
        let service = ResourceService::new(SqliteCounterRepository::try_new(&conn).unwrap());
        service
            .create(&json!({ "name": "Lager", "count": 10 }))
            .unwrap()
            .id
    };

    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let path = path.clone();
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let repo = SqliteCounterRepository::try_new(&conn).unwrap();
                for _ in 0..INCREMENTS_PER_WORKER {
                    repo.increment(&Increment {
                        id: counter_id,
                        by: worker + 1,
                    })
                    .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let conn = open_db(&path).unwrap();
    let service = ResourceService::new(SqliteCounterRepository::try_new(&conn).unwrap());
    let finished = service
        .get(&json!({ "id": counter_id.to_string() }))
        .unwrap()
        .unwrap();
    let expected_sum: i64 = (1..=WORKERS).map(|by| by * INCREMENTS_PER_WORKER).sum();
    assert_eq!(finished.count, 10 + expected_sum);
}
