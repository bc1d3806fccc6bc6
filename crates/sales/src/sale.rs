use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{
    AggregateId, DomainError, DomainResult, Money, ProductId, UserId, reconcile_total,
};

/// Sale identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaleId(pub AggregateId);

impl SaleId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SaleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Sale line: product, quantity, unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
}

impl SaleLine {
    pub fn subtotal(&self) -> DomainResult<Money> {
        self.unit_price.times(self.quantity)
    }
}

/// A sale as submitted by the sales collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    pub actor: Option<UserId>,
    pub submitted_total: Option<Money>,
    pub sold_at: DateTime<Utc>,
    pub lines: Vec<SaleLine>,
}

impl Sale {
    pub fn new(id: SaleId, actor: Option<UserId>) -> Self {
        Self {
            id,
            actor,
            submitted_total: None,
            sold_at: Utc::now(),
            lines: Vec::new(),
        }
    }

    pub fn with_line(mut self, product_id: ProductId, quantity: i64, unit_price: Money) -> Self {
        self.lines.push(SaleLine {
            product_id,
            quantity,
            unit_price,
        });
        self
    }

    pub fn with_submitted_total(mut self, total: Money) -> Self {
        self.submitted_total = Some(total);
        self
    }

    pub fn computed_total(&self) -> DomainResult<Money> {
        Money::checked_sum(self.lines.iter().map(SaleLine::subtotal))
    }

    /// Quantity required per product across all lines.
    ///
    /// Two lines for the same product must be covered together by the pre-flight
    /// stock check, so they are summed here.
    pub fn required_by_product(&self) -> DomainResult<BTreeMap<ProductId, i64>> {
        let mut required = BTreeMap::new();
        for line in &self.lines {
            let total = required.entry(line.product_id).or_insert(0i64);
            *total = total.checked_add(line.quantity).ok_or_else(|| {
                DomainError::invalid_amount(format!(
                    "required quantity of product {} overflows",
                    line.product_id
                ))
            })?;
        }
        Ok(required)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.lines.is_empty() {
            return Err(DomainError::validation("sale must have at least one line"));
        }
        for (idx, line) in self.lines.iter().enumerate() {
            if line.quantity <= 0 {
                return Err(DomainError::invalid_amount(format!(
                    "sale line {} quantity must be positive (got {})",
                    idx + 1,
                    line.quantity
                )));
            }
            if line.unit_price.amount() <= Decimal::ZERO {
                return Err(DomainError::validation(format!(
                    "sale line {} unit price must be positive",
                    idx + 1
                )));
            }
        }
        Ok(())
    }

    /// Validate lines and per-product sums, then reconcile the submitted total
    /// (if any).
    pub fn checked_total(&self, tolerance: Decimal) -> DomainResult<Money> {
        self.validate()?;
        self.required_by_product()?;
        let computed = self.computed_total()?;
        if let Some(submitted) = self.submitted_total {
            reconcile_total(computed, submitted, tolerance)?;
        }
        Ok(computed)
    }
}
