//! Append-only movement log.
//!
//! The log is the audit trail of every committed quantity change. Replaying it
//! per `(product, warehouse)` reproduces the current stock records.

pub mod in_memory;
pub mod query;
pub mod r#trait;

pub use in_memory::InMemoryMovementLog;
pub use query::{MovementFilter, MovementPage, Pagination};
pub use r#trait::{MovementLog, MovementLogError};
