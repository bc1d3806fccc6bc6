use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, ProductId, WarehouseId};

use crate::movement::Direction;

/// Identity of a stock record: one product in one warehouse.
///
/// Ordering is `(product_id, warehouse_id)`; transactions acquire record locks in
/// this order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
}

impl StockKey {
    pub fn new(product_id: ProductId, warehouse_id: WarehouseId) -> Self {
        Self {
            product_id,
            warehouse_id,
        }
    }
}

impl core::fmt::Display for StockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}@{}", self.product_id, self.warehouse_id)
    }
}

/// Current quantity of one product in one warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub key: StockKey,
    pub quantity: i64,
    /// Number of committed movements applied to this record.
    pub version: u64,
}

impl StockRecord {
    pub fn new(key: StockKey, quantity: i64, version: u64) -> Self {
        Self {
            key,
            quantity,
            version,
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.key.product_id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.key.warehouse_id
    }
}

/// Reject zero, negative amounts before anything is read or written.
pub fn ensure_positive_amount(amount: i64) -> DomainResult<()> {
    if amount <= 0 {
        return Err(DomainError::invalid_amount(format!(
            "amount must be a positive integer (got {amount})"
        )));
    }
    Ok(())
}

/// Quantity a record would hold after applying one movement.
///
/// - IN always succeeds (barring overflow)
/// - OUT fails with `InsufficientStock` when the result would be negative
pub fn next_quantity(
    key: StockKey,
    current: i64,
    direction: Direction,
    amount: i64,
) -> DomainResult<i64> {
    ensure_positive_amount(amount)?;

    match direction {
        Direction::In => current
            .checked_add(amount)
            .ok_or_else(|| DomainError::invalid_amount("quantity overflow")),
        Direction::Out => {
            let next = current - amount;
            if next < 0 {
                return Err(DomainError::insufficient_stock(
                    key.product_id,
                    Some(key.warehouse_id),
                    amount,
                    current,
                ));
            }
            Ok(next)
        }
    }
}
