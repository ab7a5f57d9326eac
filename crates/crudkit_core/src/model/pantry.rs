//! Pantry categories and items.
//!
//! # Invariants
//! - Category names are unique (case-insensitive).
//! - Item `quantity` never goes below zero.
//! - `price` keeps exactly two decimal places; `expiry_date` is a calendar
//!   day surfaced as midnight UTC.
//! - Deleting a category clears `category_id` on its items.

use super::EntityId;
use crate::mapper::{serialize_money_option, MAX_MONEY};
use crate::validate::{
    FieldSpec, FieldType, FieldValue, InputShape, Schema, ValidatedInput, ValidationError,
    ValidationMode,
};
use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::Serialize;

pub const CATEGORY: &str = "category";
pub const PANTRY_ITEM: &str = "pantry_item";

/// Default look-ahead window for expiring items, in days.
pub const DEFAULT_EXPIRY_WINDOW_DAYS: i64 = 7;
pub const MAX_EXPIRY_WINDOW_DAYS: i64 = 365;
/// Upper bound on an item's quantity, enforced on every write path.
pub const MAX_QUANTITY: i64 = 1_000_000;
const MONEY_SCALE: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: EntityId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryPatch {
    pub name: Option<String>,
}

/// Categories are always listed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryFilter {
    /// Case-insensitive substring match on `name`.
    pub name_contains: Option<String>,
}

static CATEGORY_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        CATEGORY,
        vec![FieldSpec::required("name", FieldType::Text)
            .non_empty()
            .max_len(80)],
    )
});

static CATEGORY_FILTER_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        CATEGORY,
        vec![FieldSpec::nullable("name_contains", FieldType::Text).non_empty()],
    )
});

impl InputShape for NewCategory {
    fn schema() -> &'static Schema {
        &CATEGORY_SCHEMA
    }

    fn from_validated(input: &ValidatedInput) -> Result<Self, ValidationError> {
        Ok(Self {
            name: input.require("name")?,
        })
    }
}

impl InputShape for CategoryPatch {
    const MODE: ValidationMode = ValidationMode::Patch;

    fn schema() -> &'static Schema {
        &CATEGORY_SCHEMA
    }

    fn from_validated(input: &ValidatedInput) -> Result<Self, ValidationError> {
        Ok(Self {
            name: input.value("name"),
        })
    }
}

impl InputShape for CategoryFilter {
    fn schema() -> &'static Schema {
        &CATEGORY_FILTER_SCHEMA
    }

    fn from_validated(input: &ValidatedInput) -> Result<Self, ValidationError> {
        Ok(Self {
            name_contains: input.nullable("name_contains"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PantryItem {
    pub id: EntityId,
    pub name: String,
    pub quantity: i64,
    pub unit: Option<String>,
    #[serde(serialize_with = "serialize_money_option")]
    pub price: Option<Decimal>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub category_id: Option<EntityId>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPantryItem {
    pub name: String,
    pub quantity: i64,
    pub unit: Option<String>,
    pub price: Option<Decimal>,
    pub expiry_date: Option<NaiveDate>,
    pub category_id: Option<EntityId>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PantryItemPatch {
    pub name: Option<String>,
    pub quantity: Option<i64>,
    pub unit: Option<Option<String>>,
    pub price: Option<Option<Decimal>>,
    pub expiry_date: Option<Option<NaiveDate>>,
    pub category_id: Option<Option<EntityId>>,
    pub tags: Option<Vec<String>>,
}

/// Items are listed newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PantryItemFilter {
    pub category_id: Option<EntityId>,
    /// Inclusive upper bound on `expiry_date`; items without one are excluded.
    pub expiring_before: Option<NaiveDate>,
    pub min_quantity: Option<i64>,
}

/// Signed stock change applied atomically to one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantityAdjustment {
    pub id: EntityId,
    pub delta: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiringQuery {
    pub days: i64,
    pub include_expired: bool,
}

impl Default for ExpiringQuery {
    fn default() -> Self {
        Self {
            days: DEFAULT_EXPIRY_WINDOW_DAYS,
            include_expired: false,
        }
    }
}

/// Pantry item inside the expiry window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpiringItem {
    #[serde(flatten)]
    pub item: PantryItem,
    /// Whole days from today to `expiry_date`; negative once expired.
    pub days_until_expiry: i64,
}

static PANTRY_ITEM_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        PANTRY_ITEM,
        vec![
            FieldSpec::required("name", FieldType::Text)
                .non_empty()
                .max_len(120),
            FieldSpec::optional("quantity", FieldType::Integer, FieldValue::Integer(0))
                .range(0, MAX_QUANTITY),
            FieldSpec::nullable("unit", FieldType::Text)
                .non_empty()
                .max_len(20),
            FieldSpec::nullable(
                "price",
                FieldType::Decimal {
                    max_scale: MONEY_SCALE,
                },
            )
            .range(0, MAX_MONEY),
            FieldSpec::nullable("expiry_date", FieldType::Date),
            FieldSpec::nullable("category_id", FieldType::Id),
            FieldSpec::optional("tags", FieldType::TextList, FieldValue::TextList(Vec::new())),
        ],
    )
});

static PANTRY_FILTER_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        PANTRY_ITEM,
        vec![
            FieldSpec::nullable("category_id", FieldType::Id),
            FieldSpec::nullable("expiring_before", FieldType::Date),
            FieldSpec::nullable("min_quantity", FieldType::Integer).range(0, MAX_QUANTITY),
        ],
    )
});

static ADJUSTMENT_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        PANTRY_ITEM,
        vec![
            FieldSpec::required("id", FieldType::Id),
            FieldSpec::required("delta", FieldType::Integer)
                .non_zero()
                .range(-MAX_QUANTITY, MAX_QUANTITY),
        ],
    )
});

static EXPIRING_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        PANTRY_ITEM,
        vec![
            FieldSpec::optional(
                "days",
                FieldType::Integer,
                FieldValue::Integer(DEFAULT_EXPIRY_WINDOW_DAYS),
            )
            .range(0, MAX_EXPIRY_WINDOW_DAYS),
            FieldSpec::optional("include_expired", FieldType::Boolean, FieldValue::Boolean(false)),
        ],
    )
});

impl InputShape for NewPantryItem {
    fn schema() -> &'static Schema {
        &PANTRY_ITEM_SCHEMA
    }

    fn from_validated(input: &ValidatedInput) -> Result<Self, ValidationError> {
        Ok(Self {
            name: input.require("name")?,
            quantity: input.require("quantity")?,
            unit: input.nullable("unit"),
            price: input.nullable("price"),
            expiry_date: input.nullable("expiry_date"),
            category_id: input.nullable("category_id"),
            tags: input.require("tags")?,
        })
    }
}

impl InputShape for PantryItemPatch {
    const MODE: ValidationMode = ValidationMode::Patch;

    fn schema() -> &'static Schema {
        &PANTRY_ITEM_SCHEMA
    }

    fn from_validated(input: &ValidatedInput) -> Result<Self, ValidationError> {
        Ok(Self {
            name: input.value("name"),
            quantity: input.value("quantity"),
            unit: input.field("unit"),
            price: input.field("price"),
            expiry_date: input.field("expiry_date"),
            category_id: input.field("category_id"),
            tags: input.value("tags"),
        })
    }
}

impl InputShape for PantryItemFilter {
    fn schema() -> &'static Schema {
        &PANTRY_FILTER_SCHEMA
    }

    fn from_validated(input: &ValidatedInput) -> Result<Self, ValidationError> {
        Ok(Self {
            category_id: input.nullable("category_id"),
            expiring_before: input.nullable("expiring_before"),
            min_quantity: input.nullable("min_quantity"),
        })
    }
}

impl InputShape for QuantityAdjustment {
    fn schema() -> &'static Schema {
        &ADJUSTMENT_SCHEMA
    }

    fn from_validated(input: &ValidatedInput) -> Result<Self, ValidationError> {
        Ok(Self {
            id: input.require("id")?,
            delta: input.require("delta")?,
        })
    }
}

impl InputShape for ExpiringQuery {
    fn schema() -> &'static Schema {
        &EXPIRING_SCHEMA
    }

    fn from_validated(input: &ValidatedInput) -> Result<Self, ValidationError> {
        Ok(Self {
            days: input.require("days")?,
            include_expired: input.require("include_expired")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{NewPantryItem, PantryItemPatch};
    use crate::validate::InputShape;
    use serde_json::json;

    #[test]
    fn new_item_defaults_quantity_and_tags() {
        let item = NewPantryItem::parse(&json!({ "name": "Oats" })).unwrap();
        assert_eq!(item.quantity, 0);
        assert!(item.tags.is_empty());
        assert_eq!(item.price, None);
    }

    #[test]
    fn negative_quantity_is_rejected() {
        let err = NewPantryItem::parse(&json!({ "name": "Oats", "quantity": -1 })).unwrap_err();
        assert!(err.has_issue("quantity"));
    }

    #[test]
    fn patch_keeps_omitted_fields_untouched() {
        let patch = PantryItemPatch::parse(&json!({ "unit": null, "quantity": 3 })).unwrap();
        assert_eq!(patch.quantity, Some(3));
        assert_eq!(patch.unit, Some(None));
        assert_eq!(patch.name, None);
        assert_eq!(patch.price, None);
    }
}
