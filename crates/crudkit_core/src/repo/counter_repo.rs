//! Counter repository (SQLite).
//!
//! # Invariants
//! - `increment` is one `UPDATE ... SET count = count + ?`; concurrent
//!   callers on separate connections never lose an increment.
//! - `count` stays within `-MAX_COUNT..=MAX_COUNT`; an increment that would
//!   leave it writes nothing and is a `Conflict`.
//! - Counter delete is idempotent.

use super::relation::DeleteMode;
use super::{ensure_connection_ready, ResourceRepository, UpdateBuilder, NEWEST_FIRST};
use crate::error::{classify_write_error, CrudError, CrudResult};
use crate::mapper::{id_from_storage, id_to_storage, now_millis, timestamp_from_storage};
use crate::model::counter::{
    Counter, CounterFilter, CounterPatch, Increment, NewCounter, COUNTER, MAX_COUNT,
};
use crate::model::{new_entity_id, DeleteReceipt, EntityId};
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};

const COUNTER_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    count,
    created_at,
    updated_at
FROM counters";

/// Counter-specific operations beyond plain CRUD.
pub trait CounterRepository: ResourceRepository<Entity = Counter> {
    /// Atomically applies `count = count + by` and returns the new state.
    ///
    /// # Errors
    /// - `NotFound` when the counter does not exist.
    /// - `Conflict` when the result would leave `-MAX_COUNT..=MAX_COUNT`.
    fn increment(&self, increment: &Increment) -> CrudResult<Counter>;
}

/// SQLite-backed counter repository.
pub struct SqliteCounterRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCounterRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> CrudResult<Self> {
        ensure_connection_ready(
            conn,
            "counters",
            &["uuid", "name", "count", "created_at", "updated_at"],
        )?;
        Ok(Self { conn })
    }
}

impl ResourceRepository for SqliteCounterRepository<'_> {
    const RESOURCE: &'static str = COUNTER;
    const DELETE_MODE: DeleteMode = DeleteMode::Idempotent;

    type Entity = Counter;
    type Create = NewCounter;
    type Patch = CounterPatch;
    type Filter = CounterFilter;
    type Deleted = DeleteReceipt;

    fn create(&self, input: &NewCounter) -> CrudResult<Counter> {
        let id = new_entity_id();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO counters (uuid, name, count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4);",
            params![id_to_storage(id), input.name.as_str(), input.count, now_millis()],
        )
        .map_err(|err| classify_write_error(COUNTER, err))?;
        let stored = load_required_counter(&tx, id)?;
        tx.commit()?;
        Ok(stored)
    }

    fn get_by_id(&self, id: EntityId) -> CrudResult<Option<Counter>> {
        load_counter(self.conn, id)
    }

    fn update(&self, id: EntityId, patch: &CounterPatch) -> CrudResult<Counter> {
        let mut update = UpdateBuilder::new();
        update.set_if("name", patch.name.clone());
        update.set_if("count", patch.count);
        let (sql, binds) = update.into_sql("counters", id, true);

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx
            .execute(&sql, params_from_iter(binds))
            .map_err(|err| classify_write_error(COUNTER, err))?;
        if changed == 0 {
            return Err(CrudError::not_found(COUNTER, id));
        }
        let stored = load_required_counter(&tx, id)?;
        tx.commit()?;
        Ok(stored)
    }

    fn delete(&self, id: EntityId) -> CrudResult<DeleteReceipt> {
        let removed = self
            .conn
            .execute("DELETE FROM counters WHERE uuid = ?1;", [id_to_storage(id)])
            .map_err(|err| classify_write_error(COUNTER, err))?;
        Ok(DeleteReceipt {
            deleted: removed > 0,
        })
    }

    fn list(&self, _filter: &CounterFilter) -> CrudResult<Vec<Counter>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{COUNTER_SELECT_SQL} {NEWEST_FIRST};"))?;
        let mut rows = stmt.query([])?;
        let mut counters = Vec::new();
        while let Some(row) = rows.next()? {
            counters.push(parse_counter_row(row)?);
        }
        Ok(counters)
    }
}

impl CounterRepository for SqliteCounterRepository<'_> {
    fn increment(&self, increment: &Increment) -> CrudResult<Counter> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE counters
             SET count = count + ?2,
                 updated_at = ?3
             WHERE uuid = ?1
               AND count + ?2 BETWEEN ?4 AND ?5;",
            params![
                id_to_storage(increment.id),
                increment.by,
                now_millis(),
                -MAX_COUNT,
                MAX_COUNT
            ],
        )?;
        if changed == 0 {
            let current = load_required_counter(&tx, increment.id)?;
            return Err(CrudError::conflict(
                COUNTER,
                format!(
                    "count {} cannot be incremented by {} outside -{}..={}",
                    current.count, increment.by, MAX_COUNT, MAX_COUNT
                ),
            ));
        }
        let stored = load_required_counter(&tx, increment.id)?;
        tx.commit()?;
        Ok(stored)
    }
}

fn load_counter(conn: &Connection, id: EntityId) -> CrudResult<Option<Counter>> {
    let mut stmt = conn.prepare(&format!("{COUNTER_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([id_to_storage(id)])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_counter_row(row)?));
    }
    Ok(None)
}

fn load_required_counter(conn: &Connection, id: EntityId) -> CrudResult<Counter> {
    load_counter(conn, id)?.ok_or_else(|| CrudError::not_found(COUNTER, id))
}

fn parse_counter_row(row: &Row<'_>) -> CrudResult<Counter> {
    let uuid_text: String = row.get("uuid")?;
    Ok(Counter {
        id: id_from_storage(&uuid_text, "counters.uuid")?,
        name: row.get("name")?,
        count: row.get("count")?,
        created_at: timestamp_from_storage(row.get("created_at")?, "counters.created_at")?,
        updated_at: timestamp_from_storage(row.get("updated_at")?, "counters.updated_at")?,
    })
}
