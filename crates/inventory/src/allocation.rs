//! Allocation engine: decides which warehouses a sale draws from.
//!
//! Policy: largest stock first. Candidates are ordered by quantity descending,
//! ties broken by ascending warehouse id, and drained greedily. This keeps the
//! number of partially emptied warehouses (and of movement rows per sale) low,
//! and yields the same plan for the same inputs.
//!
//! The plan is advisory. The movement applier re-validates every entry against
//! the locked record when it is applied.

use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, ProductId, WarehouseId};

use crate::stock::ensure_positive_amount;

/// Stock available for allocation in one warehouse.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
}

impl Candidate {
    pub fn new(warehouse_id: WarehouseId, quantity: i64) -> Self {
        Self {
            warehouse_id,
            quantity,
        }
    }
}

/// One planned draw: take `amount` units from `warehouse_id`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub warehouse_id: WarehouseId,
    pub amount: i64,
}

/// Ordered allocation plan for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub product_id: ProductId,
    pub required: i64,
    pub entries: Vec<Allocation>,
}

impl AllocationPlan {
    pub fn total(&self) -> i64 {
        self.entries.iter().map(|a| a.amount).sum()
    }

    /// Plan as `(warehouse, amount)` pairs, in draw order.
    pub fn pairs(&self) -> Vec<(WarehouseId, i64)> {
        self.entries
            .iter()
            .map(|a| (a.warehouse_id, a.amount))
            .collect()
    }
}

/// Plan how to take `required` units of `product_id` from `candidates`.
///
/// Fails with `InsufficientStock` (aggregate, no warehouse) before building any
/// entry when the candidates cannot cover the requirement together.
pub fn allocate(
    product_id: ProductId,
    required: i64,
    candidates: &[Candidate],
) -> DomainResult<AllocationPlan> {
    ensure_positive_amount(required)?;

    let mut ordered: Vec<Candidate> = candidates.iter().copied().filter(|c| c.quantity > 0).collect();
    ordered.sort_by(|a, b| {
        b.quantity
            .cmp(&a.quantity)
            .then_with(|| a.warehouse_id.cmp(&b.warehouse_id))
    });

    // Saturating: only compared against `required`, which fits in i64.
    let available = ordered.iter().fold(0i64, |acc, c| acc.saturating_add(c.quantity));
    if available < required {
        return Err(DomainError::insufficient_stock(
            product_id, None, required, available,
        ));
    }

    let mut remaining = required;
    let mut entries = Vec::new();
    for candidate in ordered {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(candidate.quantity);
        entries.push(Allocation {
            warehouse_id: candidate.warehouse_id,
            amount: take,
        });
        remaining -= take;
    }

    Ok(AllocationPlan {
        product_id,
        required,
        entries,
    })
}
