//! Collection and bookmark repositories (SQLite).
//!
//! # Invariants
//! - Deleting a collection deletes its bookmarks in the same transaction
//!   (`DeletePolicy::Cascade`); no orphan bookmark survives.
//! - Bookmark delete is idempotent and reports whether a row was removed.

use super::relation::{DeleteMode, DeletePolicy, Relation};
use super::{ensure_connection_ready, ResourceRepository, UpdateBuilder, NEWEST_FIRST};
use crate::error::{classify_write_error, CrudError, CrudResult};
use crate::mapper::{
    bool_from_storage, bool_to_storage, id_from_storage, id_to_storage, list_from_storage,
    list_to_storage, now_millis, timestamp_from_storage,
};
use crate::model::bookmark::{
    Bookmark, BookmarkFilter, BookmarkPatch, Collection, CollectionFilter, CollectionPatch,
    NewBookmark, NewCollection, BOOKMARK, COLLECTION,
};
use crate::model::{new_entity_id, DeleteReceipt, EntityId};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};

const COLLECTION_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    description,
    created_at,
    updated_at
FROM collections";

const BOOKMARK_SELECT_SQL: &str = "SELECT
    uuid,
    collection_uuid,
    title,
    url,
    notes,
    tags,
    is_favorite,
    created_at,
    updated_at
FROM bookmarks";

const COLLECTION_RELATIONS: &[Relation] = &[Relation {
    child_resource: BOOKMARK,
    child_table: "bookmarks",
    foreign_key: "collection_uuid",
    policy: DeletePolicy::Cascade,
}];

/// SQLite-backed collection repository.
pub struct SqliteCollectionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCollectionRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> CrudResult<Self> {
        ensure_connection_ready(
            conn,
            "collections",
            &["uuid", "name", "description", "created_at", "updated_at"],
        )?;
        Ok(Self { conn })
    }
}

impl ResourceRepository for SqliteCollectionRepository<'_> {
    const RESOURCE: &'static str = COLLECTION;
    const DELETE_MODE: DeleteMode = DeleteMode::RequireExisting;
    const RELATIONS: &'static [Relation] = COLLECTION_RELATIONS;

    type Entity = Collection;
    type Create = NewCollection;
    type Patch = CollectionPatch;
    type Filter = CollectionFilter;
    type Deleted = Collection;

    fn create(&self, input: &NewCollection) -> CrudResult<Collection> {
        let id = new_entity_id();
        let now = now_millis();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO collections (uuid, name, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4);",
            params![
                id_to_storage(id),
                input.name.as_str(),
                input.description.as_deref(),
                now
            ],
        )
        .map_err(|err| classify_write_error(COLLECTION, err))?;
        let stored = load_required_collection(&tx, id)?;
        tx.commit()?;
        Ok(stored)
    }

    fn get_by_id(&self, id: EntityId) -> CrudResult<Option<Collection>> {
        load_collection(self.conn, id)
    }

    fn update(&self, id: EntityId, patch: &CollectionPatch) -> CrudResult<Collection> {
        let mut update = UpdateBuilder::new();
        update.set_if("name", patch.name.clone());
        update.set_if("description", patch.description.clone());
        let (sql, binds) = update.into_sql("collections", id, true);

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx
            .execute(&sql, params_from_iter(binds))
            .map_err(|err| classify_write_error(COLLECTION, err))?;
        if changed == 0 {
            return Err(CrudError::not_found(COLLECTION, id));
        }
        let stored = load_required_collection(&tx, id)?;
        tx.commit()?;
        Ok(stored)
    }

    fn delete(&self, id: EntityId) -> CrudResult<Collection> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let existing = load_required_collection(&tx, id)?;
        for relation in Self::RELATIONS {
            relation.apply(&tx, COLLECTION, id)?;
        }
        tx.execute("DELETE FROM collections WHERE uuid = ?1;", [id_to_storage(id)])
            .map_err(|err| classify_write_error(COLLECTION, err))?;
        tx.commit()?;
        Ok(existing)
    }

    fn list(&self, _filter: &CollectionFilter) -> CrudResult<Vec<Collection>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{COLLECTION_SELECT_SQL} {NEWEST_FIRST};"))?;
        let mut rows = stmt.query([])?;
        let mut collections = Vec::new();
        while let Some(row) = rows.next()? {
            collections.push(parse_collection_row(row)?);
        }
        Ok(collections)
    }
}

/// SQLite-backed bookmark repository.
pub struct SqliteBookmarkRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBookmarkRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> CrudResult<Self> {
        ensure_connection_ready(
            conn,
            "bookmarks",
            &[
                "uuid",
                "collection_uuid",
                "title",
                "url",
                "notes",
                "tags",
                "is_favorite",
                "created_at",
                "updated_at",
            ],
        )?;
        Ok(Self { conn })
    }
}

impl ResourceRepository for SqliteBookmarkRepository<'_> {
    const RESOURCE: &'static str = BOOKMARK;
    const DELETE_MODE: DeleteMode = DeleteMode::Idempotent;

    type Entity = Bookmark;
    type Create = NewBookmark;
    type Patch = BookmarkPatch;
    type Filter = BookmarkFilter;
    type Deleted = DeleteReceipt;

    fn create(&self, input: &NewBookmark) -> CrudResult<Bookmark> {
        let id = new_entity_id();
        let now = now_millis();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO bookmarks (
                uuid,
                collection_uuid,
                title,
                url,
                notes,
                tags,
                is_favorite,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8);",
            params![
                id_to_storage(id),
                id_to_storage(input.collection_id),
                input.title.as_str(),
                input.url.as_str(),
                input.notes.as_deref(),
                list_to_storage(&input.tags)?,
                bool_to_storage(input.is_favorite),
                now,
            ],
        )
        .map_err(|err| classify_write_error(BOOKMARK, err))?;
        let stored = load_required_bookmark(&tx, id)?;
        tx.commit()?;
        Ok(stored)
    }

    fn get_by_id(&self, id: EntityId) -> CrudResult<Option<Bookmark>> {
        load_bookmark(self.conn, id)
    }

    fn update(&self, id: EntityId, patch: &BookmarkPatch) -> CrudResult<Bookmark> {
        let mut update = UpdateBuilder::new();
        update.set_if("collection_uuid", patch.collection_id.map(id_to_storage));
        update.set_if("title", patch.title.clone());
        update.set_if("url", patch.url.clone());
        update.set_if("notes", patch.notes.clone());
        if let Some(tags) = &patch.tags {
            update.set("tags", list_to_storage(tags)?);
        }
        update.set_if("is_favorite", patch.is_favorite.map(bool_to_storage));
        let (sql, binds) = update.into_sql("bookmarks", id, true);

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx
            .execute(&sql, params_from_iter(binds))
            .map_err(|err| classify_write_error(BOOKMARK, err))?;
        if changed == 0 {
            return Err(CrudError::not_found(BOOKMARK, id));
        }
        let stored = load_required_bookmark(&tx, id)?;
        tx.commit()?;
        Ok(stored)
    }

    fn delete(&self, id: EntityId) -> CrudResult<DeleteReceipt> {
        let removed = self
            .conn
            .execute("DELETE FROM bookmarks WHERE uuid = ?1;", [id_to_storage(id)])
            .map_err(|err| classify_write_error(BOOKMARK, err))?;
        if removed == 0 {
            debug!("event=bookmark_delete module=repo status=noop id={id}");
        }
        Ok(DeleteReceipt {
            deleted: removed > 0,
        })
    }

    fn list(&self, filter: &BookmarkFilter) -> CrudResult<Vec<Bookmark>> {
        let mut sql = format!("{BOOKMARK_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(collection_id) = filter.collection_id {
            sql.push_str(" AND collection_uuid = ?");
            bind_values.push(Value::Text(id_to_storage(collection_id)));
        }
        if filter.favorites_only {
            sql.push_str(" AND is_favorite = 1");
        }
        if let Some(tag) = &filter.tag {
            sql.push_str(
                " AND tags IS NOT NULL
                  AND EXISTS (SELECT 1 FROM json_each(bookmarks.tags) WHERE json_each.value = ?)",
            );
            bind_values.push(Value::Text(tag.clone()));
        }
        sql.push(' ');
        sql.push_str(NEWEST_FIRST);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut bookmarks = Vec::new();
        while let Some(row) = rows.next()? {
            bookmarks.push(parse_bookmark_row(row)?);
        }
        Ok(bookmarks)
    }
}

fn load_collection(conn: &Connection, id: EntityId) -> CrudResult<Option<Collection>> {
    let mut stmt = conn.prepare(&format!("{COLLECTION_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([id_to_storage(id)])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_collection_row(row)?));
    }
    Ok(None)
}

fn load_required_collection(conn: &Connection, id: EntityId) -> CrudResult<Collection> {
    load_collection(conn, id)?.ok_or_else(|| CrudError::not_found(COLLECTION, id))
}

fn load_bookmark(conn: &Connection, id: EntityId) -> CrudResult<Option<Bookmark>> {
    let mut stmt = conn.prepare(&format!("{BOOKMARK_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([id_to_storage(id)])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_bookmark_row(row)?));
    }
    Ok(None)
}

fn load_required_bookmark(conn: &Connection, id: EntityId) -> CrudResult<Bookmark> {
    load_bookmark(conn, id)?.ok_or_else(|| CrudError::not_found(BOOKMARK, id))
}

fn parse_collection_row(row: &Row<'_>) -> CrudResult<Collection> {
    let uuid_text: String = row.get("uuid")?;
    Ok(Collection {
        id: id_from_storage(&uuid_text, "collections.uuid")?,
        name: row.get("name")?,
        description: row.get("description")?,
        created_at: timestamp_from_storage(row.get("created_at")?, "collections.created_at")?,
        updated_at: timestamp_from_storage(row.get("updated_at")?, "collections.updated_at")?,
    })
}

fn parse_bookmark_row(row: &Row<'_>) -> CrudResult<Bookmark> {
    let uuid_text: String = row.get("uuid")?;
    let collection_text: String = row.get("collection_uuid")?;
    let tags_text: Option<String> = row.get("tags")?;
    Ok(Bookmark {
        id: id_from_storage(&uuid_text, "bookmarks.uuid")?,
        collection_id: id_from_storage(&collection_text, "bookmarks.collection_uuid")?,
        title: row.get("title")?,
        url: row.get("url")?,
        notes: row.get("notes")?,
        tags: list_from_storage(tags_text.as_deref(), "bookmarks.tags")?,
        is_favorite: bool_from_storage(row.get("is_favorite")?, "bookmarks.is_favorite")?,
        created_at: timestamp_from_storage(row.get("created_at")?, "bookmarks.created_at")?,
        updated_at: timestamp_from_storage(row.get("updated_at")?, "bookmarks.updated_at")?,
    })
}
