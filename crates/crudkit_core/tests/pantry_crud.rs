use chrono::NaiveDate;
use crudkit_core::db::{open_db, open_db_in_memory};
use crudkit_core::model::pantry::{
    ExpiringQuery, NewCategory, PantryItem, QuantityAdjustment, MAX_QUANTITY,
};
use crudkit_core::repo::pantry_repo::{
    PantryItemRepository, SqliteCategoryRepository, SqlitePantryItemRepository,
};
use crudkit_core::{CrudError, DeleteMode, ResourceRepository, ResourceService};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde_json::json;
use std::str::FromStr;
use std::thread;
use uuid::Uuid;

fn items(conn: &Connection) -> ResourceService<SqlitePantryItemRepository<'_>> {
    ResourceService::new(SqlitePantryItemRepository::try_new(conn).unwrap())
}

fn categories(conn: &Connection) -> ResourceService<SqliteCategoryRepository<'_>> {
    ResourceService::new(SqliteCategoryRepository::try_new(conn).unwrap())
}

fn day(year: i32, month: u32, date: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, date).unwrap()
}

fn set_created_at(conn: &Connection, item: &PantryItem, millis: i64) {
    conn.execute(
        "UPDATE pantry_items SET created_at = ?1 WHERE uuid = ?2;",
        rusqlite::params![millis, item.id.to_string()],
    )
    .unwrap();
}

#[test]
fn create_then_get_returns_the_stored_item() {
    let conn = open_db_in_memory().unwrap();
    let service = items(&conn);

    let created = service
        .create(&json!({
            "name": "Milk",
            "quantity": 2,
            "unit": "l",
            "price": "10.10",
            "expiry_date": "2024-03-08",
            "tags": ["dairy", " fridge "],
        }))
        .unwrap();

    let loaded = service
        .get(&json!({ "id": created.id.to_string() }))
        .unwrap()
        .unwrap();
    assert_eq!(loaded, created);
    assert_eq!(loaded.name, "Milk");
    assert_eq!(loaded.price, Some(Decimal::from_str("10.10").unwrap()));
    assert_eq!(loaded.price.unwrap().to_string(), "10.10");
    assert_eq!(
        loaded.expiry_date.unwrap().date_naive(),
        day(2024, 3, 8)
    );
    assert_eq!(loaded.tags, vec!["dairy".to_string(), "fridge".to_string()]);
}

#[test]
fn get_missing_item_is_none_not_an_error() {
    let conn = open_db_in_memory().unwrap();
    let loaded = items(&conn)
        .get(&json!({ "id": Uuid::new_v4().to_string() }))
        .unwrap();
    assert!(loaded.is_none());
}

#[test]
fn invalid_create_never_reaches_storage() {
    let conn = open_db_in_memory().unwrap();
    let service = items(&conn);

    let err = service
        .create(&json!({ "name": " ", "quantity": -4, "price": "1.005" }))
        .unwrap_err();
    match err {
        CrudError::Validation(validation) => {
            assert_eq!(validation.resource, "pantry_item");
            let paths: Vec<_> = validation.issues.iter().map(|i| i.path.as_str()).collect();
            assert_eq!(paths, vec!["name", "quantity", "price"]);
        }
        other => panic!("unexpected error: {other}"),
    }

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM pantry_items;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn partial_update_touches_only_given_fields() {
    let conn = open_db_in_memory().unwrap();
    let service = items(&conn);
    let created = service
        .create(&json!({ "name": "Rice", "quantity": 1, "unit": "kg" }))
        .unwrap();

    let updated = service
        .update(&json!({ "id": created.id.to_string(), "quantity": 3, "unit": null }))
        .unwrap();

    assert_eq!(updated.name, "Rice");
    assert_eq!(updated.quantity, 3);
    assert_eq!(updated.unit, None);
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at >= created.updated_at);
}

#[test]
fn update_missing_item_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let missing = Uuid::new_v4();

    let err = items(&conn)
        .update(&json!({ "id": missing.to_string(), "quantity": 1 }))
        .unwrap_err();
    assert!(matches!(
        err,
        CrudError::NotFound { resource: "pantry_item", id } if id == missing
    ));
}

#[test]
fn delete_returns_the_removed_item_and_requires_existence() {
    let conn = open_db_in_memory().unwrap();
    let service = items(&conn);
    let created = service.create(&json!({ "name": "Eggs" })).unwrap();
    let id_input = json!({ "id": created.id.to_string() });

    assert_eq!(
        SqlitePantryItemRepository::DELETE_MODE,
        DeleteMode::RequireExisting
    );
    let deleted = service.delete(&id_input).unwrap();
    assert_eq!(deleted.id, created.id);
    assert!(service.get(&id_input).unwrap().is_none());

    let err = service.delete(&id_input).unwrap_err();
    assert_eq!(err.code(), "not_found");
}

#[test]
fn list_is_newest_first() {
    let conn = open_db_in_memory().unwrap();
    let service = items(&conn);
    let first = service.create(&json!({ "name": "first" })).unwrap();
    let second = service.create(&json!({ "name": "second" })).unwrap();
    let third = service.create(&json!({ "name": "third" })).unwrap();
    set_created_at(&conn, &first, 1_000);
    set_created_at(&conn, &second, 2_000);
    set_created_at(&conn, &third, 3_000);

    let names: Vec<String> = service
        .list(&json!(null))
        .unwrap()
        .into_iter()
        .map(|item| item.name)
        .collect();
    assert_eq!(names, vec!["third", "second", "first"]);
}

#[test]
fn list_breaks_created_at_ties_by_insertion_order() {
    let conn = open_db_in_memory().unwrap();
    let service = items(&conn);
    let older = service.create(&json!({ "name": "older" })).unwrap();
    let newer = service.create(&json!({ "name": "newer" })).unwrap();
    set_created_at(&conn, &older, 5_000);
    set_created_at(&conn, &newer, 5_000);

    let listed = service.list(&json!({})).unwrap();
    assert_eq!(listed[0].id, newer.id);
    assert_eq!(listed[1].id, older.id);
}

#[test]
fn list_filters_combine() {
    let conn = open_db_in_memory().unwrap();
    let category = categories(&conn).create(&json!({ "name": "Dairy" })).unwrap();
    let service = items(&conn);
    let category_id = category.id.to_string();
    service
        .create(&json!({ "name": "Milk", "quantity": 2, "category_id": category_id }))
        .unwrap();
    service
        .create(&json!({ "name": "Butter", "quantity": 0, "category_id": category_id }))
        .unwrap();
    service.create(&json!({ "name": "Bread", "quantity": 5 })).unwrap();

    let listed = service
        .list(&json!({ "category_id": category_id, "min_quantity": 1 }))
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "Milk");
}

#[test]
fn unknown_category_reference_is_a_conflict() {
    let conn = open_db_in_memory().unwrap();
    let err = items(&conn)
        .create(&json!({ "name": "Milk", "category_id": Uuid::new_v4().to_string() }))
        .unwrap_err();
    assert!(matches!(err, CrudError::Conflict { resource: "pantry_item", .. }));
}

#[test]
fn duplicate_category_name_is_a_conflict_regardless_of_case() {
    let conn = open_db_in_memory().unwrap();
    let service = categories(&conn);
    service.create(&json!({ "name": "Dairy" })).unwrap();

    let err = service.create(&json!({ "name": "dairy" })).unwrap_err();
    assert!(matches!(err, CrudError::Conflict { resource: "category", .. }));
}

#[test]
fn categories_are_listed_by_name() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCategoryRepository::try_new(&conn).unwrap();
    for name in ["Spices", "bakery", "Dairy"] {
        repo.create(&NewCategory {
            name: name.to_string(),
        })
        .unwrap();
    }

    let names: Vec<String> = ResourceService::new(repo)
        .list(&json!({}))
        .unwrap()
        .into_iter()
        .map(|category| category.name)
        .collect();
    assert_eq!(names, vec!["bakery", "Dairy", "Spices"]);
}

#[test]
fn deleting_a_category_clears_item_references() {
    let conn = open_db_in_memory().unwrap();
    let category = categories(&conn).create(&json!({ "name": "Frozen" })).unwrap();
    let service = items(&conn);
    let item = service
        .create(&json!({ "name": "Peas", "category_id": category.id.to_string() }))
        .unwrap();
    assert_eq!(item.category_id, Some(category.id));

    let deleted = categories(&conn)
        .delete(&json!({ "id": category.id.to_string() }))
        .unwrap();
    assert_eq!(deleted.id, category.id);

    let survivor = service
        .get(&json!({ "id": item.id.to_string() }))
        .unwrap()
        .unwrap();
    assert_eq!(survivor.category_id, None);
    assert_eq!(survivor.name, "Peas");
}

#[test]
fn expiring_window_includes_day_seven_and_excludes_day_eight() {
    let conn = open_db_in_memory().unwrap();
    let service = items(&conn);
    let today = day(2024, 3, 1);
    for (name, expiry) in [
        ("week", Some("2024-03-08")),
        ("eight", Some("2024-03-09")),
        ("today", Some("2024-03-01")),
        ("expired", Some("2024-02-28")),
        ("shelf", None),
    ] {
        service
            .create(&json!({ "name": name, "expiry_date": expiry }))
            .unwrap();
    }

    let expiring = service.expiring_on(&json!({}), today).unwrap();
    let summary: Vec<(&str, i64)> = expiring
        .iter()
        .map(|entry| (entry.item.name.as_str(), entry.days_until_expiry))
        .collect();
    assert_eq!(summary, vec![("today", 0), ("week", 7)]);

    let with_expired = service
        .expiring_on(&json!({ "days": 7, "include_expired": true }), today)
        .unwrap();
    assert_eq!(with_expired[0].item.name, "expired");
    assert_eq!(with_expired[0].days_until_expiry, -2);
    assert_eq!(with_expired.len(), 3);
}

#[test]
fn expiring_window_rejects_out_of_range_days() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePantryItemRepository::try_new(&conn).unwrap();

    let err = repo
        .expiring_within(
            &ExpiringQuery {
                days: -1,
                include_expired: false,
            },
            day(2024, 3, 1),
        )
        .unwrap_err();
    assert_eq!(err.code(), "validation");
}

#[test]
fn quantity_adjustment_never_goes_negative() {
    let conn = open_db_in_memory().unwrap();
    let service = items(&conn);
    let item = service
        .create(&json!({ "name": "Apples", "quantity": 2 }))
        .unwrap();

    let err = service
        .adjust_quantity(&json!({ "id": item.id.to_string(), "delta": -3 }))
        .unwrap_err();
    assert!(matches!(err, CrudError::Conflict { resource: "pantry_item", .. }));

    let adjusted = service
        .adjust_quantity(&json!({ "id": item.id.to_string(), "delta": 5 }))
        .unwrap();
    assert_eq!(adjusted.quantity, 7);

    let drained = service
        .adjust_quantity(&json!({ "id": item.id.to_string(), "delta": -7 }))
        .unwrap();
    assert_eq!(drained.quantity, 0);
}

#[test]
fn quantity_adjustment_on_missing_item_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePantryItemRepository::try_new(&conn).unwrap();

    let err = repo
        .adjust_quantity(&QuantityAdjustment {
            id: Uuid::new_v4(),
            delta: 1,
        })
        .unwrap_err();
    assert_eq!(err.code(), "not_found");
}

#[test]
fn quantity_adjustment_never_exceeds_the_maximum() {
    let conn = open_db_in_memory().unwrap();
    let service = items(&conn);
    let item = service
        .create(&json!({ "name": "Rice", "quantity": MAX_QUANTITY - 1 }))
        .unwrap();

    let err = service
        .adjust_quantity(&json!({ "id": item.id.to_string(), "delta": 2 }))
        .unwrap_err();
    assert!(matches!(err, CrudError::Conflict { resource: "pantry_item", .. }));

    let topped_up = service
        .adjust_quantity(&json!({ "id": item.id.to_string(), "delta": 1 }))
        .unwrap();
    assert_eq!(topped_up.quantity, MAX_QUANTITY);
}

#[test]
fn concurrent_adjustments_sum_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pantry.db");
    let item_id = {
        let conn = open_db(&path).unwrap();
        items(&conn)
            .create(&json!({ "name": "Flour", "quantity": 1000 }))
            .unwrap()
            .id
    };

    let deltas: Vec<i64> = vec![5, -3, 7, -2, 4, -6, 1, 3];
    let handles: Vec<_> = deltas
        .iter()
        .map(|&delta| {
            let path = path.clone();
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let repo = SqlitePantryItemRepository::try_new(&conn).unwrap();
                for _ in 0..10 {
                    repo.adjust_quantity(&QuantityAdjustment { id: item_id, delta })
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let conn = open_db(&path).unwrap();
    let finished = items(&conn)
        .get(&json!({ "id": item_id.to_string() }))
        .unwrap()
        .unwrap();
    let expected: i64 = 1000 + deltas.iter().map(|delta| delta * 10).sum::<i64>();
    assert_eq!(finished.quantity, expected);
}

#[test]
fn concurrent_decrements_never_drive_quantity_negative() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pantry.db");
    let item_id = {
        let conn = open_db(&path).unwrap();
        items(&conn)
            .create(&json!({ "name": "Eggs", "quantity": 10 }))
            .unwrap()
            .id
    };

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let path = path.clone();
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let repo = SqlitePantryItemRepository::try_new(&conn).unwrap();
                let mut taken: i64 = 0;
                for _ in 0..3 {
                    match repo.adjust_quantity(&QuantityAdjustment {
                        id: item_id,
                        delta: -1,
                    }) {
                        Ok(item) => {
                            assert!(item.quantity >= 0);
                            taken += 1;
                        }
                        Err(err) => {
                            assert!(matches!(err, CrudError::Conflict { .. }), "{err}")
                        }
                    }
                }
                taken
            })
        })
        .collect();
    let taken: i64 = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .sum();

    let conn = open_db(&path).unwrap();
    let finished = items(&conn)
        .get(&json!({ "id": item_id.to_string() }))
        .unwrap()
        .unwrap();
    assert_eq!(taken, 10);
    assert_eq!(finished.quantity, 0);
}
