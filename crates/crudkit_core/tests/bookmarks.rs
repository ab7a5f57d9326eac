use crudkit_core::db::open_db_in_memory;
use crudkit_core::repo::bookmark_repo::{SqliteBookmarkRepository, SqliteCollectionRepository};
use crudkit_core::{CrudError, DeleteMode, ResourceRepository, ResourceService};
use rusqlite::Connection;
use serde_json::{json, Value};
use uuid::Uuid;

fn collections(conn: &Connection) -> ResourceService<SqliteCollectionRepository<'_>> {
    ResourceService::new(SqliteCollectionRepository::try_new(conn).unwrap())
}

fn bookmarks(conn: &Connection) -> ResourceService<SqliteBookmarkRepository<'_>> {
    ResourceService::new(SqliteBookmarkRepository::try_new(conn).unwrap())
}

fn bookmark_input(collection_id: Uuid, title: &str) -> Value {
    json!({
        "collection_id": collection_id.to_string(),
        "title": title,
        "url": format!("https://example.com/{title}"),
    })
}

fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn bookmark_roundtrip_applies_defaults() {
    let conn = open_db_in_memory().unwrap();
    let collection = collections(&conn)
        .create(&json!({ "name": "Reading" }))
        .unwrap();
    assert_eq!(collection.description, None);

    let created = bookmarks(&conn)
        .create(&bookmark_input(collection.id, "rust"))
        .unwrap();
    assert_eq!(created.collection_id, collection.id);
    assert!(!created.is_favorite);
    assert!(created.tags.is_empty());
    assert_eq!(created.notes, None);

    let loaded = bookmarks(&conn)
        .get(&json!({ "id": created.id.to_string() }))
        .unwrap()
        .unwrap();
    assert_eq!(loaded, created);
}

#[test]
fn bookmark_requires_an_existing_collection() {
    let conn = open_db_in_memory().unwrap();
    let err = bookmarks(&conn)
        .create(&bookmark_input(Uuid::new_v4(), "orphan"))
        .unwrap_err();
    assert!(matches!(err, CrudError::Conflict { resource: "bookmark", .. }));
    assert_eq!(count_rows(&conn, "bookmarks"), 0);
}

#[test]
fn deleting_a_collection_cascades_to_its_bookmarks() {
    let conn = open_db_in_memory().unwrap();
    let doomed = collections(&conn).create(&json!({ "name": "Old" })).unwrap();
    let kept = collections(&conn).create(&json!({ "name": "Keep" })).unwrap();
    let service = bookmarks(&conn);
    service.create(&bookmark_input(doomed.id, "a")).unwrap();
    service.create(&bookmark_input(doomed.id, "b")).unwrap();
    let survivor = service.create(&bookmark_input(kept.id, "c")).unwrap();

    collections(&conn)
        .delete(&json!({ "id": doomed.id.to_string() }))
        .unwrap();

    let orphans: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM bookmarks WHERE collection_uuid = ?1;",
            [doomed.id.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(orphans, 0);
    let remaining = service.list(&json!({})).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, survivor.id);
}

#[test]
fn deleting_a_missing_collection_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let err = collections(&conn)
        .delete(&json!({ "id": Uuid::new_v4().to_string() }))
        .unwrap_err();
    assert!(matches!(err, CrudError::NotFound { resource: "collection", .. }));
}

#[test]
fn bookmark_delete_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let collection = collections(&conn).create(&json!({ "name": "Tmp" })).unwrap();
    let service = bookmarks(&conn);
    let bookmark = service.create(&bookmark_input(collection.id, "x")).unwrap();
    let id_input = json!({ "id": bookmark.id.to_string() });

    assert_eq!(SqliteBookmarkRepository::DELETE_MODE, DeleteMode::Idempotent);
    assert!(service.delete(&id_input).unwrap().deleted);
    assert!(!service.delete(&id_input).unwrap().deleted);
    assert!(service.get(&id_input).unwrap().is_none());
}

#[test]
fn bookmark_list_filters_by_favorite_and_tag() {
    let conn = open_db_in_memory().unwrap();
    let collection = collections(&conn).create(&json!({ "name": "Mixed" })).unwrap();
    let service = bookmarks(&conn);
    let collection_id = collection.id.to_string();
    service
        .create(&json!({
            "collection_id": collection_id,
            "title": "docs",
            "url": "https://docs.rs",
            "tags": ["rust", "docs"],
            "is_favorite": true,
        }))
        .unwrap();
    service
        .create(&json!({
            "collection_id": collection_id,
            "title": "blog",
            "url": "https://blog.rust-lang.org",
            "tags": ["rust"],
        }))
        .unwrap();
    service
        .create(&json!({
            "collection_id": collection_id,
            "title": "news",
            "url": "http://news.example.com",
        }))
        .unwrap();

    let favorites = service.list(&json!({ "favorites_only": true })).unwrap();
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].title, "docs");

    let rust: Vec<String> = service
        .list(&json!({ "tag": "rust", "collection_id": collection_id }))
        .unwrap()
        .into_iter()
        .map(|bookmark| bookmark.title)
        .collect();
    assert_eq!(rust.len(), 2);
    assert!(rust.contains(&"docs".to_string()));
    assert!(rust.contains(&"blog".to_string()));

    assert!(service.list(&json!({ "tag": "Rust" })).unwrap().is_empty());
}

#[test]
fn bookmark_patch_can_clear_notes_and_move_collections() {
    let conn = open_db_in_memory().unwrap();
    let from = collections(&conn).create(&json!({ "name": "From" })).unwrap();
    let to = collections(&conn).create(&json!({ "name": "To" })).unwrap();
    let service = bookmarks(&conn);
    let mut input = bookmark_input(from.id, "moving");
    input["notes"] = json!("read later");
    let bookmark = service.create(&input).unwrap();
    assert_eq!(bookmark.notes.as_deref(), Some("read later"));

    let updated = service
        .update(&json!({
            "id": bookmark.id.to_string(),
            "collection_id": to.id.to_string(),
            "notes": null,
            "is_favorite": true,
        }))
        .unwrap();
    assert_eq!(updated.collection_id, to.id);
    assert_eq!(updated.notes, None);
    assert!(updated.is_favorite);
    assert_eq!(updated.title, "moving");
}

#[test]
fn collection_id_cannot_be_cleared() {
    let conn = open_db_in_memory().unwrap();
    let err = bookmarks(&conn)
        .update(&json!({ "id": Uuid::new_v4().to_string(), "collection_id": null }))
        .unwrap_err();
    match err {
        CrudError::Validation(validation) => assert!(validation.has_issue("collection_id")),
        other => panic!("unexpected error: {other}"),
    }
}
