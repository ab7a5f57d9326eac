//! Inventory products and their stock ledger.
//!
//! # Invariants
//! - `sku` is unique; `stock` never goes below zero.
//! - `stock` changes only through recorded stock transactions or an
//!   explicit patch, never through a read-then-write in application code.
//! - A product with ledger rows cannot be deleted.
//! - Stock transactions are immutable once recorded.

use super::EntityId;
use crate::mapper::{serialize_money, MAX_MONEY};
use crate::validate::{
    FieldSpec, FieldType, FieldValue, InputShape, Schema, ValidatedInput, ValidationError,
    ValidationMode,
};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::Serialize;

pub const PRODUCT: &str = "product";
pub const STOCK_TRANSACTION: &str = "stock_transaction";

/// Upper bound on a product's stock, enforced on every write path.
pub const MAX_STOCK: i64 = 1_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: EntityId,
    pub sku: String,
    pub name: String,
    #[serde(serialize_with = "serialize_money")]
    pub unit_price: Decimal,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub unit_price: Decimal,
    pub stock: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductPatch {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub unit_price: Option<Decimal>,
    pub stock: Option<i64>,
}

/// Products are listed newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    /// Only products whose stock is strictly below this value.
    pub low_stock_below: Option<i64>,
}

static PRODUCT_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        PRODUCT,
        vec![
            FieldSpec::required("sku", FieldType::Text)
                .non_empty()
                .max_len(64),
            FieldSpec::required("name", FieldType::Text)
                .non_empty()
                .max_len(120),
            FieldSpec::required("unit_price", FieldType::Decimal { max_scale: 2 })
                .range(0, MAX_MONEY),
            FieldSpec::optional("stock", FieldType::Integer, FieldValue::Integer(0))
                .range(0, MAX_STOCK),
        ],
    )
});

static PRODUCT_FILTER_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        PRODUCT,
        vec![FieldSpec::nullable("low_stock_below", FieldType::Integer).range(0, MAX_STOCK)],
    )
});

impl InputShape for NewProduct {
    fn schema() -> &'static Schema {
        &PRODUCT_SCHEMA
    }

    fn from_validated(input: &ValidatedInput) -> Result<Self, ValidationError> {
        Ok(Self {
            sku: input.require("sku")?,
            name: input.require("name")?,
            unit_price: input.require("unit_price")?,
            stock: input.require("stock")?,
        })
    }
}

impl InputShape for ProductPatch {
    const MODE: ValidationMode = ValidationMode::Patch;

    fn schema() -> &'static Schema {
        &PRODUCT_SCHEMA
    }

    fn from_validated(input: &ValidatedInput) -> Result<Self, ValidationError> {
        Ok(Self {
            sku: input.value("sku"),
            name: input.value("name"),
            unit_price: input.value("unit_price"),
            stock: input.value("stock"),
        })
    }
}

impl InputShape for ProductFilter {
    fn schema() -> &'static Schema {
        &PRODUCT_FILTER_SCHEMA
    }

    fn from_validated(input: &ValidatedInput) -> Result<Self, ValidationError> {
        Ok(Self {
            low_stock_below: input.nullable("low_stock_below"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockTransaction {
    pub id: EntityId,
    pub product_id: EntityId,
    pub delta: i64,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStockTransaction {
    pub product_id: EntityId,
    pub delta: i64,
    pub note: Option<String>,
    /// Defaults to the insert time when absent.
    pub occurred_at: Option<DateTime<Utc>>,
}

/// Ledger rows are listed newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockTransactionFilter {
    pub product_id: Option<EntityId>,
}

static STOCK_TRANSACTION_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        STOCK_TRANSACTION,
        vec![
            FieldSpec::required("product_id", FieldType::Id),
            FieldSpec::required("delta", FieldType::Integer)
                .non_zero()
                .range(-MAX_STOCK, MAX_STOCK),
            FieldSpec::nullable("note", FieldType::Text).max_len(500),
            FieldSpec::nullable("occurred_at", FieldType::Timestamp),
        ],
    )
});

static STOCK_TRANSACTION_FILTER_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        STOCK_TRANSACTION,
        vec![FieldSpec::nullable("product_id", FieldType::Id)],
    )
});

impl InputShape for NewStockTransaction {
    fn schema() -> &'static Schema {
        &STOCK_TRANSACTION_SCHEMA
    }

    fn from_validated(input: &ValidatedInput) -> Result<Self, ValidationError> {
        Ok(Self {
            product_id: input.require("product_id")?,
            delta: input.require("delta")?,
            note: input.nullable("note"),
            occurred_at: input.nullable("occurred_at"),
        })
    }
}

impl InputShape for StockTransactionFilter {
    fn schema() -> &'static Schema {
        &STOCK_TRANSACTION_FILTER_SCHEMA
    }

    fn from_validated(input: &ValidatedInput) -> Result<Self, ValidationError> {
        Ok(Self {
            product_id: input.nullable("product_id"),
        })
    }
}
