//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the per-resource CRUD contract (`ResourceRepository`).
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Each call performs one logical write, plus at most one declared
//!   dependent cleanup (see `relation`), inside one transaction.
//! - `get_by_id`/`list` report absence as `None`/empty, never as an error.
//! - `update` and existence-requiring `delete` report a missing row as
//!   `CrudError::NotFound`.
//! - Writes return the row as stored, read back inside the same
//!   transaction.
//! - Default list order is `created_at DESC, rowid DESC`.

use crate::db::migrations::latest_version;
use crate::db::{StorageError, StorageResult};
use crate::error::CrudResult;
use crate::mapper::now_millis;
use crate::model::EntityId;
use crate::validate::InputShape;
use relation::{DeleteMode, Relation};
use rusqlite::types::Value;
use rusqlite::Connection;
use serde::Serialize;

pub mod bookmark_repo;
pub mod counter_repo;
pub mod inventory_repo;
pub mod pantry_repo;
pub mod relation;

/// Newest-first ordering shared by resources that do not declare their own.
pub(crate) const NEWEST_FIRST: &str = "ORDER BY created_at DESC, rowid DESC";

/// CRUD contract implemented once per entity type.
pub trait ResourceRepository {
    /// Resource name used in errors and logs.
    const RESOURCE: &'static str;
    /// Whether deleting a missing id is an error.
    const DELETE_MODE: DeleteMode;
    /// Dependent tables and the policy applied to them on delete.
    const RELATIONS: &'static [Relation] = &[];

    type Entity: Serialize;
    type Create: InputShape;
    type Patch: InputShape;
    type Filter: InputShape;
    /// Either the deleted entity or a `DeleteReceipt`, per resource.
    type Deleted: Serialize;

    fn create(&self, input: &Self::Create) -> CrudResult<Self::Entity>;
    fn get_by_id(&self, id: EntityId) -> CrudResult<Option<Self::Entity>>;
    fn update(&self, id: EntityId, patch: &Self::Patch) -> CrudResult<Self::Entity>;
    fn delete(&self, id: EntityId) -> CrudResult<Self::Deleted>;
    fn list(&self, filter: &Self::Filter) -> CrudResult<Vec<Self::Entity>>;
}

/// Accumulates `SET` assignments for a partial update.
///
/// Only explicitly provided fields are written; `updated_at` is refreshed
/// by `into_sql` when the table declares it.
pub(crate) struct UpdateBuilder {
    assignments: Vec<String>,
    binds: Vec<Value>,
}

impl UpdateBuilder {
    pub(crate) fn new() -> Self {
        Self {
            assignments: Vec::new(),
            binds: Vec::new(),
        }
    }

    pub(crate) fn set(&mut self, column: &str, value: impl Into<Value>) {
        self.binds.push(value.into());
        self.assignments
            .push(format!("{column} = ?{}", self.binds.len()));
    }

    /// Sets `column` when the patch provides it.
    pub(crate) fn set_if<T: Into<Value>>(&mut self, column: &str, value: Option<T>) {
        if let Some(value) = value {
            self.set(column, value);
        }
    }

    /// Returns `(sql, binds)` for `UPDATE <table> ... WHERE uuid = <id>`.
    pub(crate) fn into_sql(
        mut self,
        table: &str,
        id: EntityId,
        touch_updated_at: bool,
    ) -> (String, Vec<Value>) {
        if touch_updated_at {
            self.set("updated_at", now_millis());
        }
        self.binds.push(Value::Text(id.to_string()));
        let sql = if self.assignments.is_empty() {
            format!(
                "UPDATE {table} SET uuid = uuid WHERE uuid = ?{};",
                self.binds.len()
            )
        } else {
            format!(
                "UPDATE {table} SET {} WHERE uuid = ?{};",
                self.assignments.join(", "),
                self.binds.len()
            )
        };
        (sql, self.binds)
    }
}

/// Verifies that `conn` is migrated and carries `table` with `columns`.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    table: &'static str,
    columns: &[&'static str],
) -> StorageResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StorageError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, table)? {
        return Err(StorageError::MissingRequiredTable(table));
    }

    for &column in columns {
        if !table_has_column(conn, table, column)? {
            return Err(StorageError::MissingRequiredColumn { table, column });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> StorageResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> StorageResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
