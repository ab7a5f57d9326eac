//! Declared field schemas and payload coercion.

use super::value::{FieldValue, ValidatedInput};
use super::{FieldIssue, ValidationError, ValidationMode};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

/// Declared type of one payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    /// JSON integer only; `3.0` is rejected.
    Integer,
    /// Finite JSON number.
    Float,
    Boolean,
    /// Exact decimal from a JSON number or numeric string, rescaled to
    /// `max_scale` fractional digits.
    Decimal { max_scale: u32 },
    /// `YYYY-MM-DD`, or an RFC 3339 timestamp whose written calendar date
    /// is kept as-is (no shift to UTC).
    Date,
    /// RFC 3339 timestamp, normalized to UTC.
    Timestamp,
    /// Non-empty UUID string.
    Id,
    /// Array of non-blank strings, each trimmed.
    TextList,
}

impl FieldType {
    fn describe(self) -> &'static str {
        match self {
            Self::Text => "a string",
            Self::Integer => "an integer",
            Self::Float => "a finite number",
            Self::Boolean => "a boolean",
            Self::Decimal { .. } => "a decimal number",
            Self::Date => "a date (YYYY-MM-DD)",
            Self::Timestamp => "an RFC 3339 timestamp",
            Self::Id => "an id",
            Self::TextList => "an array of strings",
        }
    }
}

/// One declared field with presence rules and constraints.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: &'static str,
    ty: FieldType,
    required: bool,
    nullable: bool,
    default: FieldValue,
    non_empty: bool,
    non_zero: bool,
    max_len: Option<usize>,
    range: Option<(i64, i64)>,
    pattern: Option<(&'static Regex, &'static str)>,
}

impl FieldSpec {
    fn base(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: false,
            nullable: false,
            default: FieldValue::Null,
            non_empty: false,
            non_zero: false,
            max_len: None,
            range: None,
            pattern: None,
        }
    }

    /// Field that must be present and non-null on create.
    pub fn required(name: &'static str, ty: FieldType) -> Self {
        Self {
            required: true,
            ..Self::base(name, ty)
        }
    }

    /// Non-nullable field that falls back to `default` when omitted.
    pub fn optional(name: &'static str, ty: FieldType, default: FieldValue) -> Self {
        Self {
            default,
            ..Self::base(name, ty)
        }
    }

    /// Field that may be omitted or null; omitted means null.
    pub fn nullable(name: &'static str, ty: FieldType) -> Self {
        Self {
            nullable: true,
            ..Self::base(name, ty)
        }
    }

    /// Lets a required field carry an explicit null.
    pub fn allow_null(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Rejects blank text; accepted text is trimmed.
    pub fn non_empty(mut self) -> Self {
        self.non_empty = true;
        self
    }

    pub fn non_zero(mut self) -> Self {
        self.non_zero = true;
        self
    }

    pub fn max_len(mut self, max_chars: usize) -> Self {
        self.max_len = Some(max_chars);
        self
    }

    /// Inclusive numeric bounds for integer, float and decimal fields.
    pub fn range(mut self, min: i64, max: i64) -> Self {
        self.range = Some((min, max));
        self
    }

    pub fn matches(mut self, pattern: &'static Regex, reason: &'static str) -> Self {
        self.pattern = Some((pattern, reason));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn coerce(&self, raw: &Value) -> Result<FieldValue, FieldIssue> {
        let value = coerce_type(self.name, self.ty, raw)?;
        self.check_constraints(value)
    }

    fn check_constraints(&self, value: FieldValue) -> Result<FieldValue, FieldIssue> {
        let issue = |reason: String| FieldIssue::new(self.name, reason);

        let value = match value {
            FieldValue::Text(text) if self.non_empty => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Err(issue("must not be empty".to_string()));
                }
                FieldValue::Text(trimmed.to_string())
            }
            other => other,
        };

        if let (Some(max_chars), FieldValue::Text(text)) = (self.max_len, &value) {
            if text.chars().count() > max_chars {
                return Err(issue(format!("must be at most {max_chars} characters")));
            }
        }

        if let (Some((pattern, reason)), FieldValue::Text(text)) = (self.pattern, &value) {
            if !pattern.is_match(text) {
                return Err(issue(reason.to_string()));
            }
        }

        if self.non_zero {
            let is_zero = match &value {
                FieldValue::Integer(number) => *number == 0,
                FieldValue::Float(number) => *number == 0.0,
                FieldValue::Decimal(number) => number.is_zero(),
                _ => false,
            };
            if is_zero {
                return Err(issue("must not be zero".to_string()));
            }
        }

        if let Some((min, max)) = self.range {
            let in_range = match &value {
                FieldValue::Integer(number) => (min..=max).contains(number),
                FieldValue::Float(number) => *number >= min as f64 && *number <= max as f64,
                FieldValue::Decimal(number) => {
                    *number >= Decimal::from(min) && *number <= Decimal::from(max)
                }
                _ => true,
            };
            if !in_range {
                return Err(issue(format!("must be between {min} and {max}")));
            }
        }

        Ok(value)
    }
}

/// Named set of fields for one input shape.
#[derive(Debug, Clone)]
pub struct Schema {
    resource: &'static str,
    fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn new(resource: &'static str, fields: Vec<FieldSpec>) -> Self {
        Self { resource, fields }
    }

    pub fn resource(&self) -> &'static str {
        self.resource
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Validates `payload` against this schema.
    ///
    /// A `null` payload is treated as an empty object so filter shapes with
    /// only optional fields accept "no input".
    ///
    /// # Errors
    /// - Returns every issue found, never a partial result.
    pub fn validate(
        &self,
        payload: &Value,
        mode: ValidationMode,
    ) -> Result<ValidatedInput, ValidationError> {
        let empty = Map::new();
        let object = match payload {
            Value::Object(object) => object,
            Value::Null => &empty,
            _ => {
                return Err(ValidationError::single(
                    self.resource,
                    "$",
                    "expected an object",
                ))
            }
        };

        let mut values = BTreeMap::new();
        let mut issues = Vec::new();

        for spec in &self.fields {
            match object.get(spec.name) {
                None => {
                    if mode == ValidationMode::Patch {
                        continue;
                    }
                    if spec.required {
                        issues.push(FieldIssue::new(spec.name, "is required"));
                    } else {
                        values.insert(spec.name, spec.default.clone());
                    }
                }
                Some(Value::Null) => {
                    if spec.nullable {
                        values.insert(spec.name, FieldValue::Null);
                    } else {
                        issues.push(FieldIssue::new(spec.name, "must not be null"));
                    }
                }
                Some(raw) => match spec.coerce(raw) {
                    Ok(value) => {
                        values.insert(spec.name, value);
                    }
                    Err(issue) => issues.push(issue),
                },
            }
        }

        for key in object.keys() {
            if !self.fields.iter().any(|spec| spec.name == key.as_str()) {
                issues.push(FieldIssue::new(key.as_str(), "is not a known field"));
            }
        }

        if issues.is_empty() {
            Ok(ValidatedInput::new(self.resource, values))
        } else {
            Err(ValidationError {
                resource: self.resource,
                issues,
            })
        }
    }
}

fn coerce_type(name: &'static str, ty: FieldType, raw: &Value) -> Result<FieldValue, FieldIssue> {
    let mismatch = || FieldIssue::new(name, format!("expected {}", ty.describe()));

    match ty {
        FieldType::Text => raw
            .as_str()
            .map(|text| FieldValue::Text(text.to_string()))
            .ok_or_else(mismatch),
        FieldType::Integer => raw.as_i64().map(FieldValue::Integer).ok_or_else(mismatch),
        FieldType::Float => match raw.as_f64() {
            Some(number) if number.is_finite() => Ok(FieldValue::Float(number)),
            _ => Err(mismatch()),
        },
        FieldType::Boolean => raw.as_bool().map(FieldValue::Boolean).ok_or_else(mismatch),
        FieldType::Decimal { max_scale } => {
            let parsed = match raw {
                Value::Number(number) => parse_decimal(&number.to_string()),
                Value::String(text) => parse_decimal(text.trim()),
                _ => None,
            };
            let mut number = parsed.ok_or_else(mismatch)?;
            if number.normalize().scale() > max_scale {
                return Err(FieldIssue::new(
                    name,
                    format!("must have at most {max_scale} decimal places"),
                ));
            }
            number.rescale(max_scale);
            Ok(FieldValue::Decimal(number))
        }
        FieldType::Date => raw
            .as_str()
            .and_then(|text| parse_date(text.trim()))
            .map(FieldValue::Date)
            .ok_or_else(mismatch),
        FieldType::Timestamp => raw
            .as_str()
            .and_then(|text| DateTime::parse_from_rfc3339(text.trim()).ok())
            .map(|at| FieldValue::Timestamp(at.with_timezone(&Utc)))
            .ok_or_else(mismatch),
        FieldType::Id => {
            let text = raw.as_str().ok_or_else(mismatch)?.trim();
            if text.is_empty() {
                return Err(FieldIssue::new(name, "must not be empty"));
            }
            Uuid::parse_str(text)
                .map(FieldValue::Id)
                .map_err(|_| FieldIssue::new(name, "is not a valid id"))
        }
        FieldType::TextList => {
            let items = raw.as_array().ok_or_else(mismatch)?;
            let mut normalized = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let text = item.as_str().map(str::trim).unwrap_or_default();
                if text.is_empty() {
                    return Err(FieldIssue::new(
                        format!("{name}[{index}]"),
                        "must be a non-empty string",
                    ));
                }
                normalized.push(text.to_string());
            }
            Ok(FieldValue::TextList(normalized))
        }
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|at| at.date_naive()))
}
