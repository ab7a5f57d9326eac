//! Stock ledger use-case service.
//!
//! # Invariants
//! - The ledger exposes `record`, `get` and `list` only; recorded
//!   movements are never edited.

use super::resource_service::parse_id;
use crate::error::CrudResult;
use crate::model::inventory::{
    NewStockTransaction, StockTransaction, StockTransactionFilter, STOCK_TRANSACTION,
};
use crate::repo::inventory_repo::StockTransactionRepository;
use crate::validate::InputShape;
use serde_json::Value;

pub struct StockLedgerService<R: StockTransactionRepository> {
    repo: R,
}

impl<R: StockTransactionRepository> StockLedgerService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Records a movement and applies it to the product's stock.
    pub fn record(&self, input: &Value) -> CrudResult<StockTransaction> {
        let input = NewStockTransaction::parse(input)?;
        self.repo.record(&input)
    }

    pub fn get(&self, input: &Value) -> CrudResult<Option<StockTransaction>> {
        let id = parse_id(STOCK_TRANSACTION, input)?;
        self.repo.get_by_id(id)
    }

    pub fn list(&self, input: &Value) -> CrudResult<Vec<StockTransaction>> {
        let filter = StockTransactionFilter::parse(input)?;
        self.repo.list(&filter)
    }
}
