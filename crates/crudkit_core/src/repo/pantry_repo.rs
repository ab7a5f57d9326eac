//! Pantry category and item repositories (SQLite).
//!
//! # Responsibility
//! - Persist `categories` and `pantry_items` rows.
//! - Own the atomic quantity adjustment and the expiry-window query.
//!
//! # Invariants
//! - Deleting a category clears `pantry_items.category_uuid`
//!   (`DeletePolicy::ClearReference`); items survive.
//! - Category and item deletes require the row to exist.
//! - Quantity adjustments are one conditional `UPDATE`; concurrent callers
//!   never lose updates and quantity never goes below zero.

use super::relation::{DeleteMode, DeletePolicy, Relation};
use super::{ensure_connection_ready, ResourceRepository, UpdateBuilder, NEWEST_FIRST};
use crate::error::{classify_write_error, CrudError, CrudResult};
use crate::mapper::{
    date_from_storage, date_to_storage, decimal_from_storage, decimal_to_storage, id_from_storage,
    id_to_storage, list_from_storage, list_to_storage, now_millis, timestamp_from_storage,
};
use crate::model::pantry::{
    Category, CategoryFilter, CategoryPatch, ExpiringItem, ExpiringQuery, NewCategory,
    NewPantryItem, PantryItem, PantryItemFilter, PantryItemPatch, QuantityAdjustment, CATEGORY,
    MAX_EXPIRY_WINDOW_DAYS, MAX_QUANTITY, PANTRY_ITEM,
};
use crate::model::{new_entity_id, EntityId};
use crate::validate::ValidationError;
use chrono::{Duration, NaiveDate};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};

const CATEGORY_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    created_at,
    updated_at
FROM categories";

const PANTRY_ITEM_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    quantity,
    unit,
    price,
    expiry_date,
    category_uuid,
    tags,
    created_at,
    updated_at
FROM pantry_items";

const CATEGORY_RELATIONS: &[Relation] = &[Relation {
    child_resource: PANTRY_ITEM,
    child_table: "pantry_items",
    foreign_key: "category_uuid",
    policy: DeletePolicy::ClearReference,
}];

/// SQLite-backed category repository.
pub struct SqliteCategoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCategoryRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> CrudResult<Self> {
        ensure_connection_ready(
            conn,
            "categories",
            &["uuid", "name", "created_at", "updated_at"],
        )?;
        Ok(Self { conn })
    }
}

impl ResourceRepository for SqliteCategoryRepository<'_> {
    const RESOURCE: &'static str = CATEGORY;
    const DELETE_MODE: DeleteMode = DeleteMode::RequireExisting;
    const RELATIONS: &'static [Relation] = CATEGORY_RELATIONS;

    type Entity = Category;
    type Create = NewCategory;
    type Patch = CategoryPatch;
    type Filter = CategoryFilter;
    type Deleted = Category;

    fn create(&self, input: &NewCategory) -> CrudResult<Category> {
        let id = new_entity_id();
        let now = now_millis();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO categories (uuid, name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3);",
            params![id_to_storage(id), input.name.as_str(), now],
        )
        .map_err(|err| classify_write_error(CATEGORY, err))?;
        let stored = load_required_category(&tx, id)?;
        tx.commit()?;
        Ok(stored)
    }

    fn get_by_id(&self, id: EntityId) -> CrudResult<Option<Category>> {
        load_category(self.conn, id)
    }

    fn update(&self, id: EntityId, patch: &CategoryPatch) -> CrudResult<Category> {
        let mut update = UpdateBuilder::new();
        update.set_if("name", patch.name.clone());
        let (sql, binds) = update.into_sql("categories", id, true);

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx
            .execute(&sql, params_from_iter(binds))
            .map_err(|err| classify_write_error(CATEGORY, err))?;
        if changed == 0 {
            return Err(CrudError::not_found(CATEGORY, id));
        }
        let stored = load_required_category(&tx, id)?;
        tx.commit()?;
        Ok(stored)
    }

    fn delete(&self, id: EntityId) -> CrudResult<Category> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let existing = load_required_category(&tx, id)?;
        for relation in Self::RELATIONS {
            relation.apply(&tx, CATEGORY, id)?;
        }
        tx.execute("DELETE FROM categories WHERE uuid = ?1;", [id_to_storage(id)])
            .map_err(|err| classify_write_error(CATEGORY, err))?;
        tx.commit()?;
        Ok(existing)
    }

    fn list(&self, filter: &CategoryFilter) -> CrudResult<Vec<Category>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CATEGORY_SELECT_SQL}
             WHERE (?1 IS NULL OR instr(lower(name), lower(?1)) > 0)
             ORDER BY name COLLATE NOCASE ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([filter.name_contains.as_deref()])?;
        let mut categories = Vec::new();
        while let Some(row) = rows.next()? {
            categories.push(parse_category_row(row)?);
        }
        Ok(categories)
    }
}

/// Pantry-specific operations beyond plain CRUD.
pub trait PantryItemRepository: ResourceRepository<Entity = PantryItem> {
    /// Atomically applies `quantity = quantity + delta`.
    ///
    /// # Errors
    /// - `NotFound` when the item does not exist.
    /// - `Conflict` when the result would leave `0..=MAX_QUANTITY`; nothing is
    ///   written.
    fn adjust_quantity(&self, adjustment: &QuantityAdjustment) -> CrudResult<PantryItem>;

    /// Items expiring within `query.days` of `today`, soonest first.
    fn expiring_within(
        &self,
        query: &ExpiringQuery,
        today: NaiveDate,
    ) -> CrudResult<Vec<ExpiringItem>>;
}

/// SQLite-backed pantry item repository.
pub struct SqlitePantryItemRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePantryItemRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> CrudResult<Self> {
        ensure_connection_ready(
            conn,
            "pantry_items",
            &[
                "uuid",
                "name",
                "quantity",
                "unit",
                "price",
                "expiry_date",
                "category_uuid",
                "tags",
                "created_at",
                "updated_at",
            ],
        )?;
        Ok(Self { conn })
    }
}

impl ResourceRepository for SqlitePantryItemRepository<'_> {
    const RESOURCE: &'static str = PANTRY_ITEM;
    const DELETE_MODE: DeleteMode = DeleteMode::RequireExisting;

    type Entity = PantryItem;
    type Create = NewPantryItem;
    type Patch = PantryItemPatch;
    type Filter = PantryItemFilter;
    type Deleted = PantryItem;

    fn create(&self, input: &NewPantryItem) -> CrudResult<PantryItem> {
        let id = new_entity_id();
        let now = now_millis();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO pantry_items (
                uuid,
                name,
                quantity,
                unit,
                price,
                expiry_date,
                category_uuid,
                tags,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9);",
            params![
                id_to_storage(id),
                input.name.as_str(),
                input.quantity,
                input.unit.as_deref(),
                input.price.map(decimal_to_storage),
                input.expiry_date.map(date_to_storage),
                input.category_id.map(id_to_storage),
                list_to_storage(&input.tags)?,
                now,
            ],
        )
        .map_err(|err| classify_write_error(PANTRY_ITEM, err))?;
        let stored = load_required_item(&tx, id)?;
        tx.commit()?;
        Ok(stored)
    }

    fn get_by_id(&self, id: EntityId) -> CrudResult<Option<PantryItem>> {
        load_item(self.conn, id)
    }

    fn update(&self, id: EntityId, patch: &PantryItemPatch) -> CrudResult<PantryItem> {
        let mut update = UpdateBuilder::new();
        update.set_if("name", patch.name.clone());
        update.set_if("quantity", patch.quantity);
        update.set_if("unit", patch.unit.clone());
        update.set_if(
            "price",
            patch.price.map(|price| price.map(decimal_to_storage)),
        );
        update.set_if(
            "expiry_date",
            patch.expiry_date.map(|date| date.map(date_to_storage)),
        );
        update.set_if(
            "category_uuid",
            patch.category_id.map(|category| category.map(id_to_storage)),
        );
        if let Some(tags) = &patch.tags {
            update.set("tags", list_to_storage(tags)?);
        }
        let (sql, binds) = update.into_sql("pantry_items", id, true);

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx
            .execute(&sql, params_from_iter(binds))
            .map_err(|err| classify_write_error(PANTRY_ITEM, err))?;
        if changed == 0 {
            return Err(CrudError::not_found(PANTRY_ITEM, id));
        }
        let stored = load_required_item(&tx, id)?;
        tx.commit()?;
        Ok(stored)
    }

    fn delete(&self, id: EntityId) -> CrudResult<PantryItem> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let existing = load_required_item(&tx, id)?;
        tx.execute("DELETE FROM pantry_items WHERE uuid = ?1;", [id_to_storage(id)])
            .map_err(|err| classify_write_error(PANTRY_ITEM, err))?;
        tx.commit()?;
        Ok(existing)
    }

    fn list(&self, filter: &PantryItemFilter) -> CrudResult<Vec<PantryItem>> {
        let mut sql = format!("{PANTRY_ITEM_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(category_id) = filter.category_id {
            sql.push_str(" AND category_uuid = ?");
            bind_values.push(Value::Text(id_to_storage(category_id)));
        }
        if let Some(before) = filter.expiring_before {
            sql.push_str(" AND expiry_date IS NOT NULL AND expiry_date <= ?");
            bind_values.push(Value::Text(date_to_storage(before)));
        }
        if let Some(min_quantity) = filter.min_quantity {
            sql.push_str(" AND quantity >= ?");
            bind_values.push(Value::Integer(min_quantity));
        }
        sql.push(' ');
        sql.push_str(NEWEST_FIRST);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        Ok(items)
    }
}

impl PantryItemRepository for SqlitePantryItemRepository<'_> {
    fn adjust_quantity(&self, adjustment: &QuantityAdjustment) -> CrudResult<PantryItem> {
        let id_text = id_to_storage(adjustment.id);
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE pantry_items
             SET quantity = quantity + ?2,
                 updated_at = ?3
             WHERE uuid = ?1
               AND quantity + ?2 BETWEEN 0 AND ?4;",
            params![id_text.as_str(), adjustment.delta, now_millis(), MAX_QUANTITY],
        )?;

        if changed == 0 {
            let current = load_required_item(&tx, adjustment.id)?;
            return Err(CrudError::conflict(
                PANTRY_ITEM,
                format!(
                    "quantity {} cannot be adjusted by {} outside 0..={}",
                    current.quantity, adjustment.delta, MAX_QUANTITY
                ),
            ));
        }

        let stored = load_required_item(&tx, adjustment.id)?;
        tx.commit()?;
        Ok(stored)
    }

    fn expiring_within(
        &self,
        query: &ExpiringQuery,
        today: NaiveDate,
    ) -> CrudResult<Vec<ExpiringItem>> {
        if !(0..=MAX_EXPIRY_WINDOW_DAYS).contains(&query.days) {
            return Err(ValidationError::single(
                PANTRY_ITEM,
                "days",
                format!("must be between 0 and {MAX_EXPIRY_WINDOW_DAYS}"),
            )
            .into());
        }
        let horizon = today + Duration::days(query.days);

        let mut stmt = self.conn.prepare(&format!(
            "{PANTRY_ITEM_SELECT_SQL}
             WHERE expiry_date IS NOT NULL
               AND expiry_date <= ?1
               AND (?2 = 1 OR expiry_date >= ?3)
             ORDER BY expiry_date ASC, created_at DESC, rowid DESC;"
        ))?;
        let mut rows = stmt.query(params![
            date_to_storage(horizon),
            query.include_expired,
            date_to_storage(today),
        ])?;

        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let item = parse_item_row(row)?;
            let days_until_expiry = item
                .expiry_date
                .map(|expiry| (expiry.date_naive() - today).num_days())
                .unwrap_or_default();
            items.push(ExpiringItem {
                item,
                days_until_expiry,
            });
        }
        Ok(items)
    }
}

fn load_category(conn: &Connection, id: EntityId) -> CrudResult<Option<Category>> {
    let mut stmt = conn.prepare(&format!("{CATEGORY_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([id_to_storage(id)])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_category_row(row)?));
    }
    Ok(None)
}

fn load_required_category(conn: &Connection, id: EntityId) -> CrudResult<Category> {
    load_category(conn, id)?.ok_or_else(|| CrudError::not_found(CATEGORY, id))
}

fn load_item(conn: &Connection, id: EntityId) -> CrudResult<Option<PantryItem>> {
    let mut stmt = conn.prepare(&format!("{PANTRY_ITEM_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([id_to_storage(id)])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_item_row(row)?));
    }
    Ok(None)
}

fn load_required_item(conn: &Connection, id: EntityId) -> CrudResult<PantryItem> {
    load_item(conn, id)?.ok_or_else(|| CrudError::not_found(PANTRY_ITEM, id))
}

fn parse_category_row(row: &Row<'_>) -> CrudResult<Category> {
    let uuid_text: String = row.get("uuid")?;
    Ok(Category {
        id: id_from_storage(&uuid_text, "categories.uuid")?,
        name: row.get("name")?,
        created_at: timestamp_from_storage(row.get("created_at")?, "categories.created_at")?,
        updated_at: timestamp_from_storage(row.get("updated_at")?, "categories.updated_at")?,
    })
}

fn parse_item_row(row: &Row<'_>) -> CrudResult<PantryItem> {
    let uuid_text: String = row.get("uuid")?;
    let price = match row.get::<_, Option<String>>("price")? {
        Some(text) => Some(decimal_from_storage(&text, "pantry_items.price")?),
        None => None,
    };
    let expiry_date = match row.get::<_, Option<String>>("expiry_date")? {
        Some(text) => Some(date_from_storage(&text, "pantry_items.expiry_date")?),
        None => None,
    };
    let category_id = match row.get::<_, Option<String>>("category_uuid")? {
        Some(text) => Some(id_from_storage(&text, "pantry_items.category_uuid")?),
        None => None,
    };
    let tags_text: Option<String> = row.get("tags")?;

    Ok(PantryItem {
        id: id_from_storage(&uuid_text, "pantry_items.uuid")?,
        name: row.get("name")?,
        quantity: row.get("quantity")?,
        unit: row.get("unit")?,
        price,
        expiry_date,
        category_id,
        tags: list_from_storage(tags_text.as_deref(), "pantry_items.tags")?,
        created_at: timestamp_from_storage(row.get("created_at")?, "pantry_items.created_at")?,
        updated_at: timestamp_from_storage(row.get("updated_at")?, "pantry_items.updated_at")?,
    })
}
