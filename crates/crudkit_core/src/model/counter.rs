//! Named counters (the "beer counter" shape).

use super::EntityId;
use crate::validate::{
    FieldSpec, FieldType, FieldValue, InputShape, Schema, ValidatedInput, ValidationError,
    ValidationMode,
};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;

pub const COUNTER: &str = "counter";

/// Counters stay within `-MAX_COUNT..=MAX_COUNT`.
pub const MAX_COUNT: i64 = 1_000_000_000_000;
const MAX_STEP: i64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Counter {
    pub id: EntityId,
    pub name: String,
    pub count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCounter {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterPatch {
    pub name: Option<String>,
    pub count: Option<i64>,
}

/// Counters are listed newest first; no filters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterFilter;

/// Atomic `count = count + by`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Increment {
    pub id: EntityId,
    pub by: i64,
}

static COUNTER_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        COUNTER,
        vec![
            FieldSpec::required("name", FieldType::Text)
                .non_empty()
                .max_len(80),
            FieldSpec::optional("count", FieldType::Integer, FieldValue::Integer(0))
                .range(-MAX_COUNT, MAX_COUNT),
        ],
    )
});

static COUNTER_FILTER_SCHEMA: Lazy<Schema> = Lazy::new(|| Schema::new(COUNTER, vec![]));

static INCREMENT_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        COUNTER,
        vec![
            FieldSpec::required("id", FieldType::Id),
            FieldSpec::optional("by", FieldType::Integer, FieldValue::Integer(1))
                .range(-MAX_STEP, MAX_STEP),
        ],
    )
});

impl InputShape for NewCounter {
    fn schema() -> &'static Schema {
        &COUNTER_SCHEMA
    }

    fn from_validated(input: &ValidatedInput) -> Result<Self, ValidationError> {
        Ok(Self {
            name: input.require("name")?,
            count: input.require("count")?,
        })
    }
}

impl InputShape for CounterPatch {
    const MODE: ValidationMode = ValidationMode::Patch;

    fn schema() -> &'static Schema {
        &COUNTER_SCHEMA
    }

    fn from_validated(input: &ValidatedInput) -> Result<Self, ValidationError> {
        Ok(Self {
            name: input.value("name"),
            count: input.value("count"),
        })
    }
}

impl InputShape for CounterFilter {
    fn schema() -> &'static Schema {
        &COUNTER_FILTER_SCHEMA
    }

    fn from_validated(_input: &ValidatedInput) -> Result<Self, ValidationError> {
        Ok(Self)
    }
}

impl InputShape for Increment {
    fn schema() -> &'static Schema {
        &INCREMENT_SCHEMA
    }

    fn from_validated(input: &ValidatedInput) -> Result<Self, ValidationError> {
        Ok(Self {
            id: input.require("id")?,
            by: input.require("by")?,
        })
    }
}
