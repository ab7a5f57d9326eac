//! Product and stock ledger repositories (SQLite).
//!
//! # Responsibility
//! - Persist `products` and the append-only `stock_transactions` ledger.
//! - Keep `products.stock` in step with recorded movements.
//!
//! # Invariants
//! - A product with ledger rows cannot be deleted (`DeletePolicy::Block`).
//! - Recording a movement updates stock and inserts the ledger row in one
//!   `IMMEDIATE` transaction; a movement that would take stock below zero
//!   or above `MAX_STOCK` writes nothing.
//! - Ledger rows are never updated or deleted.

use super::relation::{DeleteMode, DeletePolicy, Relation};
use super::{ensure_connection_ready, ResourceRepository, UpdateBuilder, NEWEST_FIRST};
use crate::error::{classify_write_error, CrudError, CrudResult};
use crate::mapper::{
    decimal_from_storage, decimal_to_storage, id_from_storage, id_to_storage, now_millis,
    timestamp_from_storage, timestamp_to_storage,
};
use crate::model::inventory::{
    NewProduct, NewStockTransaction, Product, ProductFilter, ProductPatch, StockTransaction,
    StockTransactionFilter, MAX_STOCK, PRODUCT, STOCK_TRANSACTION,
};
use crate::model::{new_entity_id, EntityId};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};

const PRODUCT_SELECT_SQL: &str = "SELECT
    uuid,
    sku,
    name,
    unit_price,
    stock,
    created_at,
    updated_at
FROM products";

const STOCK_TRANSACTION_SELECT_SQL: &str = "SELECT
    uuid,
    product_uuid,
    delta,
    note,
    occurred_at,
    created_at
FROM stock_transactions";

const PRODUCT_RELATIONS: &[Relation] = &[Relation {
    child_resource: STOCK_TRANSACTION,
    child_table: "stock_transactions",
    foreign_key: "product_uuid",
    policy: DeletePolicy::Block,
}];

/// SQLite-backed product repository.
pub struct SqliteProductRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProductRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> CrudResult<Self> {
        ensure_connection_ready(
            conn,
            "products",
            &[
                "uuid",
                "sku",
                "name",
                "unit_price",
                "stock",
                "created_at",
                "updated_at",
            ],
        )?;
        Ok(Self { conn })
    }
}

impl ResourceRepository for SqliteProductRepository<'_> {
    const RESOURCE: &'static str = PRODUCT;
    const DELETE_MODE: DeleteMode = DeleteMode::RequireExisting;
    const RELATIONS: &'static [Relation] = PRODUCT_RELATIONS;

    type Entity = Product;
    type Create = NewProduct;
    type Patch = ProductPatch;
    type Filter = ProductFilter;
    type Deleted = Product;

    fn create(&self, input: &NewProduct) -> CrudResult<Product> {
        let id = new_entity_id();
        let now = now_millis();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO products (uuid, sku, name, unit_price, stock, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6);",
            params![
                id_to_storage(id),
                input.sku.as_str(),
                input.name.as_str(),
                decimal_to_storage(input.unit_price),
                input.stock,
                now,
            ],
        )
        .map_err(|err| classify_write_error(PRODUCT, err))?;
        let stored = load_required_product(&tx, id)?;
        tx.commit()?;
        Ok(stored)
    }

    fn get_by_id(&self, id: EntityId) -> CrudResult<Option<Product>> {
        load_product(self.conn, id)
    }

    fn update(&self, id: EntityId, patch: &ProductPatch) -> CrudResult<Product> {
        let mut update = UpdateBuilder::new();
        update.set_if("sku", patch.sku.clone());
        update.set_if("name", patch.name.clone());
        update.set_if("unit_price", patch.unit_price.map(decimal_to_storage));
        update.set_if("stock", patch.stock);
        let (sql, binds) = update.into_sql("products", id, true);

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx
            .execute(&sql, params_from_iter(binds))
            .map_err(|err| classify_write_error(PRODUCT, err))?;
        if changed == 0 {
            return Err(CrudError::not_found(PRODUCT, id));
        }
        let stored = load_required_product(&tx, id)?;
        tx.commit()?;
        Ok(stored)
    }

    fn delete(&self, id: EntityId) -> CrudResult<Product> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let existing = load_required_product(&tx, id)?;
        for relation in Self::RELATIONS {
            relation.apply(&tx, PRODUCT, id)?;
        }
        tx.execute("DELETE FROM products WHERE uuid = ?1;", [id_to_storage(id)])
            .map_err(|err| classify_write_error(PRODUCT, err))?;
        tx.commit()?;
        Ok(existing)
    }

    fn list(&self, filter: &ProductFilter) -> CrudResult<Vec<Product>> {
        let mut sql = format!("{PRODUCT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(threshold) = filter.low_stock_below {
            sql.push_str(" AND stock < ?");
            bind_values.push(Value::Integer(threshold));
        }
        sql.push(' ');
        sql.push_str(NEWEST_FIRST);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut products = Vec::new();
        while let Some(row) = rows.next()? {
            products.push(parse_product_row(row)?);
        }
        Ok(products)
    }
}

/// Append-only stock movement ledger.
pub trait StockTransactionRepository {
    /// Records one movement and applies it to the product's stock.
    ///
    /// # Errors
    /// - `NotFound` when the product does not exist.
    /// - `Conflict` when stock would leave `0..=MAX_STOCK`; nothing is written.
    fn record(&self, input: &NewStockTransaction) -> CrudResult<StockTransaction>;
    fn get_by_id(&self, id: EntityId) -> CrudResult<Option<StockTransaction>>;
    /// Newest movement first.
    fn list(&self, filter: &StockTransactionFilter) -> CrudResult<Vec<StockTransaction>>;
}

/// SQLite-backed stock ledger repository.
pub struct SqliteStockTransactionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStockTransactionRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> CrudResult<Self> {
        ensure_connection_ready(
            conn,
            "stock_transactions",
            &[
                "uuid",
                "product_uuid",
                "delta",
                "note",
                "occurred_at",
                "created_at",
            ],
        )?;
        ensure_connection_ready(conn, "products", &["uuid", "stock", "updated_at"])?;
        Ok(Self { conn })
    }
}

impl StockTransactionRepository for SqliteStockTransactionRepository<'_> {
    fn record(&self, input: &NewStockTransaction) -> CrudResult<StockTransaction> {
        let id = new_entity_id();
        let now = now_millis();
        let occurred_at = input.occurred_at.map_or(now, timestamp_to_storage);
        let product_text = id_to_storage(input.product_id);

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE products
             SET stock = stock + ?2,
                 updated_at = ?3
             WHERE uuid = ?1
               AND stock + ?2 BETWEEN 0 AND ?4;",
            params![product_text.as_str(), input.delta, now, MAX_STOCK],
        )?;
        if changed == 0 {
            let product = load_required_product(&tx, input.product_id)?;
            let reason = if product.stock + input.delta < 0 {
                format!(
                    "insufficient stock for {}: have {}, delta {}",
                    product.sku, product.stock, input.delta
                )
            } else {
                format!(
                    "stock for {} would exceed {}: have {}, delta {}",
                    product.sku, MAX_STOCK, product.stock, input.delta
                )
            };
            return Err(CrudError::conflict(STOCK_TRANSACTION, reason));
        }

        tx.execute(
            "INSERT INTO stock_transactions (
                uuid,
                product_uuid,
                delta,
                note,
                occurred_at,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                id_to_storage(id),
                product_text.as_str(),
                input.delta,
                input.note.as_deref(),
                occurred_at,
                now,
            ],
        )
        .map_err(|err| classify_write_error(STOCK_TRANSACTION, err))?;

        let stored = load_transaction(&tx, id)?
            .ok_or_else(|| CrudError::not_found(STOCK_TRANSACTION, id))?;
        tx.commit()?;
        debug!(
            "event=stock_record module=repo status=ok product={} delta={}",
            input.product_id, input.delta
        );
        Ok(stored)
    }

    fn get_by_id(&self, id: EntityId) -> CrudResult<Option<StockTransaction>> {
        load_transaction(self.conn, id)
    }

    fn list(&self, filter: &StockTransactionFilter) -> CrudResult<Vec<StockTransaction>> {
        let mut sql = format!("{STOCK_TRANSACTION_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(product_id) = filter.product_id {
            sql.push_str(" AND product_uuid = ?");
            bind_values.push(Value::Text(id_to_storage(product_id)));
        }
        sql.push(' ');
        sql.push_str(NEWEST_FIRST);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut transactions = Vec::new();
        while let Some(row) = rows.next()? {
            transactions.push(parse_transaction_row(row)?);
        }
        Ok(transactions)
    }
}

fn load_product(conn: &Connection, id: EntityId) -> CrudResult<Option<Product>> {
    let mut stmt = conn.prepare(&format!("{PRODUCT_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([id_to_storage(id)])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_product_row(row)?));
    }
    Ok(None)
}

fn load_required_product(conn: &Connection, id: EntityId) -> CrudResult<Product> {
    load_product(conn, id)?.ok_or_else(|| CrudError::not_found(PRODUCT, id))
}

fn load_transaction(conn: &Connection, id: EntityId) -> CrudResult<Option<StockTransaction>> {
    let mut stmt = conn.prepare(&format!("{STOCK_TRANSACTION_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([id_to_storage(id)])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_transaction_row(row)?));
    }
    Ok(None)
}

fn parse_product_row(row: &Row<'_>) -> CrudResult<Product> {
    let uuid_text: String = row.get("uuid")?;
    let price_text: String = row.get("unit_price")?;
    Ok(Product {
        id: id_from_storage(&uuid_text, "products.uuid")?,
        sku: row.get("sku")?,
        name: row.get("name")?,
        unit_price: decimal_from_storage(&price_text, "products.unit_price")?,
        stock: row.get("stock")?,
        created_at: timestamp_from_storage(row.get("created_at")?, "products.created_at")?,
        updated_at: timestamp_from_storage(row.get("updated_at")?, "products.updated_at")?,
    })
}

fn parse_transaction_row(row: &Row<'_>) -> CrudResult<StockTransaction> {
    let uuid_text: String = row.get("uuid")?;
    let product_text: String = row.get("product_uuid")?;
    Ok(StockTransaction {
        id: id_from_storage(&uuid_text, "stock_transactions.uuid")?,
        product_id: id_from_storage(&product_text, "stock_transactions.product_uuid")?,
        delta: row.get("delta")?,
        note: row.get("note")?,
        occurred_at: timestamp_from_storage(
            row.get("occurred_at")?,
            "stock_transactions.occurred_at",
        )?,
        created_at: timestamp_from_storage(
            row.get("created_at")?,
            "stock_transactions.created_at",
        )?,
    })
}
