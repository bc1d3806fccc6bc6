use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{
    AggregateId, DomainError, DomainResult, Money, ProductId, UserId, WarehouseId,
    reconcile_total,
};

/// Purchase identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseId(pub AggregateId);

impl PurchaseId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PurchaseId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Purchase line: product, quantity received, unit cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub cost_price: Money,
}

impl PurchaseLine {
    pub fn subtotal(&self) -> DomainResult<Money> {
        self.cost_price.times(self.quantity)
    }
}

/// A purchase as submitted by the purchasing collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub warehouse_id: WarehouseId,
    pub actor: Option<UserId>,
    /// Total claimed by the caller; checked against the computed total.
    pub submitted_total: Option<Money>,
    pub purchased_at: DateTime<Utc>,
    pub lines: Vec<PurchaseLine>,
}

impl Purchase {
    pub fn new(id: PurchaseId, warehouse_id: WarehouseId, actor: Option<UserId>) -> Self {
        Self {
            id,
            warehouse_id,
            actor,
            submitted_total: None,
            purchased_at: Utc::now(),
            lines: Vec::new(),
        }
    }

    pub fn with_line(mut self, product_id: ProductId, quantity: i64, cost_price: Money) -> Self {
        self.lines.push(PurchaseLine {
            product_id,
            quantity,
            cost_price,
        });
        self
    }

    pub fn with_submitted_total(mut self, total: Money) -> Self {
        self.submitted_total = Some(total);
        self
    }

    /// Server-side total: sum of `quantity × cost_price` over all lines.
    pub fn computed_total(&self) -> DomainResult<Money> {
        Money::checked_sum(self.lines.iter().map(PurchaseLine::subtotal))
    }

    /// Line-level checks that must pass before any stock is touched.
    pub fn validate(&self) -> DomainResult<()> {
        if self.lines.is_empty() {
            return Err(DomainError::validation("purchase must have at least one line"));
        }
        for (idx, line) in self.lines.iter().enumerate() {
            if line.quantity <= 0 {
                return Err(DomainError::invalid_amount(format!(
                    "purchase line {} quantity must be positive (got {})",
                    idx + 1,
                    line.quantity
                )));
            }
            if line.cost_price.is_negative() {
                return Err(DomainError::validation(format!(
                    "purchase line {} cost price cannot be negative",
                    idx + 1
                )));
            }
        }
        Ok(())
    }

    /// Validate lines, then reconcile the submitted total (if any).
    ///
    /// Returns the computed total, which is the one to persist.
    pub fn checked_total(&self, tolerance: Decimal) -> DomainResult<Money> {
        self.validate()?;
        let computed = self.computed_total()?;
        if let Some(submitted) = self.submitted_total {
            reconcile_total(computed, submitted, tolerance)?;
        }
        Ok(computed)
    }
}
