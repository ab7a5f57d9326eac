//! Validated field values and typed accessors.

use super::ValidationError;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use uuid::Uuid;

/// One coerced payload value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Decimal(Decimal),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Id(Uuid),
    TextList(Vec<String>),
}

/// Conversion from a coerced value into a Rust type.
pub trait FromFieldValue: Sized {
    fn from_field_value(value: &FieldValue) -> Option<Self>;
}

impl FromFieldValue for String {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Text(text) => Some(text.clone()),
            _ => None,
        }
    }
}

impl FromFieldValue for i64 {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Integer(number) => Some(*number),
            _ => None,
        }
    }
}

impl FromFieldValue for f64 {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Float(number) => Some(*number),
            _ => None,
        }
    }
}

impl FromFieldValue for bool {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Boolean(flag) => Some(*flag),
            _ => None,
        }
    }
}

impl FromFieldValue for Decimal {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Decimal(number) => Some(*number),
            _ => None,
        }
    }
}

impl FromFieldValue for NaiveDate {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Date(date) => Some(*date),
            _ => None,
        }
    }
}

impl FromFieldValue for DateTime<Utc> {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Timestamp(at) => Some(*at),
            _ => None,
        }
    }
}

impl FromFieldValue for Uuid {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Id(id) => Some(*id),
            _ => None,
        }
    }
}

impl FromFieldValue for Vec<String> {
    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::TextList(items) => Some(items.clone()),
            _ => None,
        }
    }
}

/// Output of a successful `Schema::validate` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedInput {
    resource: &'static str,
    values: BTreeMap<&'static str, FieldValue>,
}

impl ValidatedInput {
    pub(crate) fn new(resource: &'static str, values: BTreeMap<&'static str, FieldValue>) -> Self {
        Self { resource, values }
    }

    pub fn resource(&self) -> &'static str {
        self.resource
    }

    /// Returns whether the field is present (including explicit null).
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    /// Present and non-null value.
    pub fn value<T: FromFieldValue>(&self, name: &str) -> Option<T> {
        self.values.get(name).and_then(T::from_field_value)
    }

    /// Patch view of one field.
    ///
    /// - `None`: omitted, leave the stored value untouched.
    /// - `Some(None)`: explicit null, clear the stored value.
    /// - `Some(Some(v))`: replace with `v`.
    pub fn field<T: FromFieldValue>(&self, name: &str) -> Option<Option<T>> {
        match self.values.get(name)? {
            FieldValue::Null => Some(None),
            other => T::from_field_value(other).map(Some),
        }
    }

    /// Value of a field the schema guarantees to be present and non-null.
    pub fn require<T: FromFieldValue>(&self, name: &str) -> Result<T, ValidationError> {
        self.value(name).ok_or_else(|| {
            ValidationError::single(self.resource, name, "is required and must not be null")
        })
    }

    /// Present value, with explicit null mapped to `None`.
    pub fn nullable<T: FromFieldValue>(&self, name: &str) -> Option<T> {
        self.field(name).flatten()
    }
}
