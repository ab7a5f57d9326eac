//! Input validation for untrusted request payloads.
//!
//! # Responsibility
//! - Check a raw JSON payload against a declared field schema before any
//!   persistence call runs.
//! - Produce a fully-defaulted, strongly-typed `ValidatedInput`.
//!
//! # Invariants
//! - Collect-all policy: every field is checked and all issues are
//!   reported together in schema order, unknown keys last.
//! - Omitted fields take their declared default (create mode) or stay
//!   absent (patch mode); explicit `null` survives only on nullable fields.

mod schema;
mod value;

pub use schema::{FieldSpec, FieldType, Schema};
pub use value::{FieldValue, FromFieldValue, ValidatedInput};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// How omitted and required fields are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Required fields must be present; omitted optional fields get defaults.
    Create,
    /// Only present keys are validated; nothing is defaulted.
    Patch,
}

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    /// Field name, `name[index]` for list elements, `$` for the payload root.
    pub path: String,
    pub reason: String,
}

impl FieldIssue {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Input failed schema checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {resource} input: {}", render_issues(.issues))]
pub struct ValidationError {
    pub resource: &'static str,
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn single(
        resource: &'static str,
        path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            resource,
            issues: vec![FieldIssue::new(path, reason)],
        }
    }

    /// Re-attributes the issues to `resource`.
    pub fn for_resource(self, resource: &'static str) -> Self {
        Self { resource, ..self }
    }

    /// Appends the issues of `other`, keeping this error's resource.
    pub fn merge(mut self, other: ValidationError) -> Self {
        self.issues.extend(other.issues);
        self
    }

    /// Returns whether any issue names `path`.
    pub fn has_issue(&self, path: &str) -> bool {
        self.issues.iter().any(|issue| issue.path == path)
    }
}

fn render_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("{} {}", issue.path, issue.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// A typed input value built from a validated payload.
///
/// Implemented by every create, patch and filter shape so services can
/// turn raw payloads into repository arguments in one step.
pub trait InputShape: Sized {
    const MODE: ValidationMode = ValidationMode::Create;

    fn schema() -> &'static Schema;

    fn from_validated(input: &ValidatedInput) -> Result<Self, ValidationError>;

    fn parse(payload: &Value) -> Result<Self, ValidationError> {
        let validated = Self::schema().validate(payload, Self::MODE)?;
        Self::from_validated(&validated)
    }
}
