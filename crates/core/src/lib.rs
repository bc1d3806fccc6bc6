//! `stockledger-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod money;

pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, ProductId, UserId, WarehouseId};
pub use money::{DEFAULT_TOTAL_TOLERANCE, Money, reconcile_total};
