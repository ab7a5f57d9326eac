//! Error taxonomy shared by validators, repositories and services.
//!
//! # Invariants
//! - `Validation` never reaches storage.
//! - `NotFound` and `Conflict` are expected outcomes callers branch on;
//!   `Storage` is everything else the persistence layer reports.

use crate::db::StorageError;
use crate::model::EntityId;
use crate::validate::ValidationError;
use rusqlite::ffi;
use thiserror::Error;

pub type CrudResult<T> = Result<T, CrudError>;

#[derive(Debug, Error)]
pub enum CrudError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{resource} not found: {id}")]
    NotFound {
        resource: &'static str,
        id: EntityId,
    },
    #[error("{resource} conflict: {reason}")]
    Conflict {
        resource: &'static str,
        reason: String,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CrudError {
    pub fn not_found(resource: &'static str, id: EntityId) -> Self {
        Self::NotFound { resource, id }
    }

    pub fn conflict(resource: &'static str, reason: impl Into<String>) -> Self {
        Self::Conflict {
            resource,
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code for this error class.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Storage(_) => "storage",
        }
    }
}

impl From<rusqlite::Error> for CrudError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Sqlite(value))
    }
}

/// Classifies a failed write against `resource`.
///
/// Unique, primary-key and foreign-key violations become `Conflict`; every
/// other SQLite failure stays a `Storage` error.
pub fn classify_write_error(resource: &'static str, err: rusqlite::Error) -> CrudError {
    if let rusqlite::Error::SqliteFailure(failure, message) = &err {
        let reason = match failure.extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                Some("unique constraint violated")
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Some("referenced row does not exist"),
            _ => None,
        };
        if let Some(reason) = reason {
            let detail = message.as_deref().unwrap_or("constraint failed");
            return CrudError::conflict(resource, format!("{reason} ({detail})"));
        }
    }
    err.into()
}

#[cfg(test)]
mod tests {
    use super::{classify_write_error, CrudError};
    use rusqlite::Connection;

    #[test]
    fn unique_violation_is_classified_as_conflict() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (name TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err = conn
            .execute("INSERT INTO t VALUES ('a');", [])
            .unwrap_err();

        let classified = classify_write_error("thing", err);
        assert!(matches!(classified, CrudError::Conflict { resource: "thing", .. }));
        assert_eq!(classified.code(), "conflict");
    }

    #[test]
    fn other_failures_stay_storage_errors() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn.execute("INSERT INTO missing VALUES (1);", []).unwrap_err();

        let classified = classify_write_error("thing", err);
        assert_eq!(classified.code(), "storage");
    }
}
