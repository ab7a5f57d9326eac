//! Core use-case services.
//!
//! # Responsibility
//! - Turn raw JSON inputs into typed repository calls.
//! - Keep the RPC and CLI layers decoupled from storage details.
//!
//! # Invariants
//! - Every input is validated before the repository is touched.
//! - Each service call performs exactly one repository operation.

pub mod ledger_service;
pub mod resource_service;

pub use ledger_service::StockLedgerService;
pub use resource_service::ResourceService;
