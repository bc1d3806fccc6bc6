//! Sales collaborator: sales as read-only causal inputs to the ledger.
//!
//! Sales name no warehouse; the ledger allocates each line across warehouses.

pub mod sale;

pub use sale::{Sale, SaleId, SaleLine};
