//! Inventory domain module: stock records, movements, allocation.
//!
//! This crate contains business rules for the stock ledger, implemented purely as
//! deterministic domain logic (no IO, no locking, no storage).

pub mod allocation;
pub mod low_stock;
pub mod movement;
pub mod stock;

pub use allocation::{Allocation, AllocationPlan, Candidate, allocate};
pub use low_stock::{LowStockEntry, check_low_stock};
pub use movement::{Direction, Movement, MovementDraft, MovementId, Reference, TransferId};
pub use stock::{StockKey, StockRecord, ensure_positive_amount, next_quantity};
