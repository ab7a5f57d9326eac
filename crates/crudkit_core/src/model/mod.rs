//! Domain model for every persisted resource.
//!
//! # Responsibility
//! - Define entity read models returned to callers.
//! - Define typed create/patch/filter input shapes and their schemas.
//!
//! # Invariants
//! - Every entity is identified by a stable, immutable `EntityId`.
//! - `created_at` is set once at insert; `updated_at` (when declared) is
//!   refreshed by every mutating write.
//! - Patch shapes use `Option<T>` for "omitted vs replaced" and
//!   `Option<Option<T>>` when the field is nullable.

use crate::validate::{FieldSpec, FieldType, InputShape, Schema, ValidatedInput, ValidationError};
use once_cell::sync::Lazy;
use serde::Serialize;
use uuid::Uuid;

pub mod bookmark;
pub mod counter;
pub mod inventory;
pub mod pantry;

/// Stable identifier of every entity.
pub type EntityId = Uuid;

/// Generates a fresh identifier for a new row.
pub fn new_entity_id() -> EntityId {
    Uuid::new_v4()
}

/// Input shape addressing one entity: `{ "id": "<uuid>" }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdInput {
    pub id: EntityId,
}

static ID_SCHEMA: Lazy<Schema> =
    Lazy::new(|| Schema::new("id", vec![FieldSpec::required("id", FieldType::Id)]));

impl InputShape for IdInput {
    fn schema() -> &'static Schema {
        &ID_SCHEMA
    }

    fn from_validated(input: &ValidatedInput) -> Result<Self, ValidationError> {
        Ok(Self {
            id: input.require("id")?,
        })
    }
}

/// Result of a delete on resources whose delete is idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteReceipt {
    /// `false` when no row existed.
    pub deleted: bool,
}
