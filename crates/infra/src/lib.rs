//! Infrastructure layer: stock store, movement log, ledger transactions,
//! business-event orchestration, configuration.

pub mod catalog;
pub mod config;
pub mod error;
pub mod ledger;
pub mod movement_log;
pub mod orchestration;
pub mod retry;
mod stock_store;

#[cfg(test)]
mod integration_tests;

pub use catalog::{Catalog, InMemoryCatalog, ProductInfo, WarehouseInfo};
pub use config::{ConfigError, LedgerConfig};
pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use ledger::{Discrepancy, LedgerTransaction, ReconciliationReport, StockLedger};
pub use movement_log::{InMemoryMovementLog, MovementFilter, MovementLog, MovementLogError, MovementPage, Pagination};
pub use orchestration::{ManualMovement, PurchaseReceipt, SaleReceipt, TransferReceipt, TransferRequest};
pub use retry::RetryPolicy;
