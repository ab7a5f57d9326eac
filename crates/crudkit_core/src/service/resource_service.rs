//! Generic CRUD service over any `ResourceRepository`.
//!
//! # Responsibility
//! - Parse `create`/`get`/`update`/`delete`/`list` payloads with the
//!   resource's schemas and forward them to the repository.
//! - Host resource-specific extras (`adjust_quantity`, `expiring`,
//!   `increment`) behind repository trait bounds.
//!
//! # Invariants
//! - `update` input is `{ "id": ..., <patch fields> }`; id and patch issues
//!   are reported together.
//! - `list` accepts `null` as an empty filter.

use crate::error::CrudResult;
use crate::model::counter::{Counter, Increment};
use crate::model::pantry::{ExpiringItem, ExpiringQuery, PantryItem, QuantityAdjustment};
use crate::model::{EntityId, IdInput};
use crate::repo::counter_repo::CounterRepository;
use crate::repo::pantry_repo::PantryItemRepository;
use crate::repo::ResourceRepository;
use crate::validate::{InputShape, ValidationError};
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};

/// Use-case service wrapper for one resource repository.
pub struct ResourceService<R: ResourceRepository> {
    repo: R,
}

impl<R: ResourceRepository> ResourceService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn create(&self, input: &Value) -> CrudResult<R::Entity> {
        let input = R::Create::parse(input).map_err(|err| err.for_resource(R::RESOURCE))?;
        self.repo.create(&input)
    }

    /// Returns `None` when no entity has the id.
    pub fn get(&self, input: &Value) -> CrudResult<Option<R::Entity>> {
        let id = parse_id(R::RESOURCE, input)?;
        self.repo.get_by_id(id)
    }

    pub fn update(&self, input: &Value) -> CrudResult<R::Entity> {
        let (id, patch) = split_update_input::<R::Patch>(R::RESOURCE, input)?;
        self.repo.update(id, &patch)
    }

    pub fn delete(&self, input: &Value) -> CrudResult<R::Deleted> {
        let id = parse_id(R::RESOURCE, input)?;
        self.repo.delete(id)
    }

    pub fn list(&self, input: &Value) -> CrudResult<Vec<R::Entity>> {
        let filter = R::Filter::parse(input).map_err(|err| err.for_resource(R::RESOURCE))?;
        self.repo.list(&filter)
    }
}

impl<R: PantryItemRepository> ResourceService<R> {
    /// Applies `{ "id", "delta" }` atomically to the item's quantity.
    pub fn adjust_quantity(&self, input: &Value) -> CrudResult<PantryItem> {
        let adjustment = QuantityAdjustment::parse(input)?;
        self.repo.adjust_quantity(&adjustment)
    }

    /// Items expiring within `{ "days", "include_expired" }` of today (UTC).
    pub fn expiring(&self, input: &Value) -> CrudResult<Vec<ExpiringItem>> {
        self.expiring_on(input, Utc::now().date_naive())
    }

    /// Same as `expiring` with an explicit reference day.
    pub fn expiring_on(&self, input: &Value, today: NaiveDate) -> CrudResult<Vec<ExpiringItem>> {
        let query = ExpiringQuery::parse(input)?;
        self.repo.expiring_within(&query, today)
    }
}

impl<R: CounterRepository> ResourceService<R> {
    /// Applies `{ "id", "by" }` atomically; `by` defaults to 1.
    pub fn increment(&self, input: &Value) -> CrudResult<Counter> {
        let increment = Increment::parse(input)?;
        self.repo.increment(&increment)
    }
}

pub(crate) fn parse_id(resource: &'static str, input: &Value) -> Result<EntityId, ValidationError> {
    IdInput::parse(input)
        .map(|parsed| parsed.id)
        .map_err(|err| err.for_resource(resource))
}

/// Splits `{ "id", ...patch }` into the target id and a typed patch.
fn split_update_input<P: InputShape>(
    resource: &'static str,
    input: &Value,
) -> Result<(EntityId, P), ValidationError> {
    let Some(object) = input.as_object() else {
        return Err(ValidationError::single(resource, "$", "must be a JSON object"));
    };

    let mut fields = object.clone();
    let id_payload = match fields.remove("id") {
        Some(id) => json!({ "id": id }),
        None => json!({}),
    };

    let id = parse_id(resource, &id_payload);
    let patch = P::parse(&Value::Object(fields)).map_err(|err| err.for_resource(resource));
    match (id, patch) {
        (Ok(id), Ok(patch)) => Ok((id, patch)),
        (Err(id_err), Err(patch_err)) => Err(id_err.merge(patch_err)),
        (Err(err), Ok(_)) | (Ok(_), Err(err)) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::split_update_input;
    use crate::model::counter::CounterPatch;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn update_input_separates_id_from_patch_fields() {
        let id = Uuid::new_v4();
        let (parsed_id, patch) = split_update_input::<CounterPatch>(
            "counter",
            &json!({ "id": id.to_string(), "name": "IPA" }),
        )
        .unwrap();
        assert_eq!(parsed_id, id);
        assert_eq!(patch.name.as_deref(), Some("IPA"));
        assert_eq!(patch.count, None);
    }

    #[test]
    fn missing_id_and_bad_patch_are_reported_together() {
        let err = split_update_input::<CounterPatch>("counter", &json!({ "count": "ten" }))
            .unwrap_err();
        assert_eq!(err.resource, "counter");
        assert!(err.has_issue("id"));
        assert!(err.has_issue("count"));
    }

    #[test]
    fn non_object_update_input_is_rejected() {
        let err = split_update_input::<CounterPatch>("counter", &json!([1, 2])).unwrap_err();
        assert!(err.has_issue("$"));
    }
}
