//! Wire-level error envelope.

use crudkit_core::{CrudError, FieldIssue};
use serde::Serialize;
use thiserror::Error;

pub const UNKNOWN_PROCEDURE: &str = "unknown_procedure";

/// Error returned by `call`, serializable as
/// `{ "code", "message", "issues"? }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{code}: {message}")]
pub struct RpcError {
    /// `validation|not_found|conflict|storage|unknown_procedure`.
    pub code: &'static str,
    pub message: String,
    /// Per-field issues; only validation errors carry any.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<FieldIssue>,
}

impl RpcError {
    pub fn unknown_procedure(name: &str) -> Self {
        Self {
            code: UNKNOWN_PROCEDURE,
            message: format!("no procedure named `{name}`"),
            issues: Vec::new(),
        }
    }

    /// Client errors are the caller's to fix; everything else is ours.
    pub fn is_client_error(&self) -> bool {
        self.code != "storage"
    }
}

impl From<CrudError> for RpcError {
    fn from(err: CrudError) -> Self {
        let code = err.code();
        let message = err.to_string();
        let issues = match err {
            CrudError::Validation(validation) => validation.issues,
            _ => Vec::new(),
        };
        Self {
            code,
            message,
            issues,
        }
    }
}
