//! Bookmark collections and bookmarks.
//!
//! # Invariants
//! - Every bookmark belongs to exactly one existing collection.
//! - Deleting a collection deletes its bookmarks.
//! - Bookmark delete is idempotent.

use super::EntityId;
use crate::validate::{
    FieldSpec, FieldType, FieldValue, InputShape, Schema, ValidatedInput, ValidationError,
    ValidationMode,
};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

pub const COLLECTION: &str = "collection";
pub const BOOKMARK: &str = "bookmark";

static HTTP_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("valid url regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collection {
    pub id: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCollection {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

/// Collections are listed newest first; no filters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionFilter;

static COLLECTION_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        COLLECTION,
        vec![
            FieldSpec::required("name", FieldType::Text)
                .non_empty()
                .max_len(80),
            FieldSpec::nullable("description", FieldType::Text).max_len(500),
        ],
    )
});

static COLLECTION_FILTER_SCHEMA: Lazy<Schema> = Lazy::new(|| Schema::new(COLLECTION, vec![]));

impl InputShape for NewCollection {
    fn schema() -> &'static Schema {
        &COLLECTION_SCHEMA
    }

    fn from_validated(input: &ValidatedInput) -> Result<Self, ValidationError> {
        Ok(Self {
            name: input.require("name")?,
            description: input.nullable("description"),
        })
    }
}

impl InputShape for CollectionPatch {
    const MODE: ValidationMode = ValidationMode::Patch;

    fn schema() -> &'static Schema {
        &COLLECTION_SCHEMA
    }

    fn from_validated(input: &ValidatedInput) -> Result<Self, ValidationError> {
        Ok(Self {
            name: input.value("name"),
            description: input.field("description"),
        })
    }
}

impl InputShape for CollectionFilter {
    fn schema() -> &'static Schema {
        &COLLECTION_FILTER_SCHEMA
    }

    fn from_validated(_input: &ValidatedInput) -> Result<Self, ValidationError> {
        Ok(Self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bookmark {
    pub id: EntityId,
    pub collection_id: EntityId,
    pub title: String,
    pub url: String,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBookmark {
    pub collection_id: EntityId,
    pub title: String,
    pub url: String,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub is_favorite: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarkPatch {
    pub collection_id: Option<EntityId>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub notes: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub is_favorite: Option<bool>,
}

/// Bookmarks are listed newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarkFilter {
    pub collection_id: Option<EntityId>,
    pub favorites_only: bool,
    /// Exact, case-sensitive tag match.
    pub tag: Option<String>,
}

static BOOKMARK_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        BOOKMARK,
        vec![
            FieldSpec::required("collection_id", FieldType::Id),
            FieldSpec::required("title", FieldType::Text)
                .non_empty()
                .max_len(200),
            FieldSpec::required("url", FieldType::Text)
                .non_empty()
                .max_len(2048)
                .matches(&HTTP_URL_RE, "must be an http(s) URL"),
            FieldSpec::nullable("notes", FieldType::Text),
            FieldSpec::optional("tags", FieldType::TextList, FieldValue::TextList(Vec::new())),
            FieldSpec::optional("is_favorite", FieldType::Boolean, FieldValue::Boolean(false)),
        ],
    )
});

static BOOKMARK_FILTER_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        BOOKMARK,
        vec![
            FieldSpec::nullable("collection_id", FieldType::Id),
            FieldSpec::optional("favorites_only", FieldType::Boolean, FieldValue::Boolean(false)),
            FieldSpec::nullable("tag", FieldType::Text).non_empty(),
        ],
    )
});

impl InputShape for NewBookmark {
    fn schema() -> &'static Schema {
        &BOOKMARK_SCHEMA
    }

    fn from_validated(input: &ValidatedInput) -> Result<Self, ValidationError> {
        Ok(Self {
            collection_id: input.require("collection_id")?,
            title: input.require("title")?,
            url: input.require("url")?,
            notes: input.nullable("notes"),
            tags: input.require("tags")?,
            is_favorite: input.require("is_favorite")?,
        })
    }
}

impl InputShape for BookmarkPatch {
    const MODE: ValidationMode = ValidationMode::Patch;

    fn schema() -> &'static Schema {
        &BOOKMARK_SCHEMA
    }

    fn from_validated(input: &ValidatedInput) -> Result<Self, ValidationError> {
        Ok(Self {
            collection_id: input.value("collection_id"),
            title: input.value("title"),
            url: input.value("url"),
            notes: input.field("notes"),
            tags: input.value("tags"),
            is_favorite: input.value("is_favorite"),
        })
    }
}

impl InputShape for BookmarkFilter {
    fn schema() -> &'static Schema {
        &BOOKMARK_FILTER_SCHEMA
    }

    fn from_validated(input: &ValidatedInput) -> Result<Self, ValidationError> {
        Ok(Self {
            collection_id: input.nullable("collection_id"),
            favorites_only: input.require("favorites_only")?,
            tag: input.nullable("tag"),
        })
    }
}
