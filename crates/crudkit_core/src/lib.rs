//! Core CRUD contract: validation, persistence and response mapping.
//! This crate is the single source of truth for resource invariants.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod mapper;
pub mod model;
pub mod repo;
pub mod service;
pub mod validate;

pub use config::AppConfig;
pub use db::{open_db, open_db_in_memory, StorageError, StorageResult};
pub use error::{CrudError, CrudResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::{DeleteReceipt, EntityId};
pub use repo::relation::{DeleteMode, DeletePolicy, Relation};
pub use repo::ResourceRepository;
pub use service::{ResourceService, StockLedgerService};
pub use validate::{FieldIssue, InputShape, ValidationError};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
