//! Domain error model.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::id::{ProductId, WarehouseId};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, stock shortfalls, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An OUT movement or a sale would drive stock below zero.
    ///
    /// `warehouse_id` is `None` for aggregate (all-warehouse) checks.
    #[error(
        "insufficient stock for product {product_id}{}: requested {requested}, available {available}",
        warehouse_suffix(.warehouse_id)
    )]
    InsufficientStock {
        product_id: ProductId,
        warehouse_id: Option<WarehouseId>,
        requested: i64,
        available: i64,
    },

    /// A quantity was zero, negative, or out of range.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// A submitted total disagrees with the total computed from the lines.
    #[error("total mismatch: computed {computed}, submitted {submitted}")]
    TotalMismatch { computed: Decimal, submitted: Decimal },

    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced product or warehouse does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A conflict occurred (lock contention, duplicate completion).
    ///
    /// Conflicts are transient: the caller may retry.
    #[error("conflict: {0}")]
    Conflict(String),
}

fn warehouse_suffix(warehouse_id: &Option<WarehouseId>) -> String {
    match warehouse_id {
        Some(w) => format!(" in warehouse {w}"),
        None => String::new(),
    }
}

impl DomainError {
    pub fn insufficient_stock(
        product_id: ProductId,
        warehouse_id: Option<WarehouseId>,
        requested: i64,
        available: i64,
    ) -> Self {
        Self::InsufficientStock {
            product_id,
            warehouse_id,
            requested,
            available,
        }
    }

    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::InvalidAmount(msg.into())
    }

    pub fn total_mismatch(computed: Decimal, submitted: Decimal) -> Self {
        Self::TotalMismatch {
            computed,
            submitted,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Whether retrying the same request may succeed without any input change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
