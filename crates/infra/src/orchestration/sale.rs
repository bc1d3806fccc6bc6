use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, Money};
use stockledger_inventory::{AllocationPlan, Direction, Movement, Reference, StockKey, allocate};
use stockledger_sales::{Sale, SaleId};

use crate::catalog::Catalog;
use crate::error::LedgerResult;
use crate::ledger::StockLedger;
use crate::movement_log::MovementLog;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleReceipt {
    pub sale_id: SaleId,
    pub total: Money,
    /// One plan per line, in line order.
    pub allocations: Vec<AllocationPlan>,
    pub movements: Vec<Movement>,
}

impl<L, C> StockLedger<L, C>
where
    L: MovementLog,
    C: Catalog,
{
    /// Ship a sale from whichever active warehouses hold the stock.
    ///
    /// Locks every record of every sold product in an active warehouse, checks
    /// the summed requirement per product, then allocates and applies line by
    /// line against the transaction's working quantities.
    pub fn complete_sale(&self, sale: &Sale) -> LedgerResult<SaleReceipt> {
        let total = sale.checked_total(self.config().total_tolerance)?;
        let required = sale.required_by_product()?;
        for product_id in required.keys() {
            self.require_product(*product_id)?;
        }

        let reference = Reference::sale(sale.id);
        let claim = self.claim(&reference)?;

        let (allocations, movements) = self.with_retry("complete_sale", || {
            // Re-read on every attempt: a retry may see records created meanwhile.
            let keys: BTreeSet<StockKey> = required
                .keys()
                .flat_map(|product_id| self.eligible_keys(*product_id))
                .collect();

            self.transaction(keys, |tx| {
                for (product_id, quantity) in &required {
                    let available = tx
                        .candidates(*product_id)
                        .iter()
                        .fold(0i64, |acc, c| acc.saturating_add(c.quantity.max(0)));
                    if available < *quantity {
                        return Err(DomainError::insufficient_stock(
                            *product_id,
                            None,
                            *quantity,
                            available,
                        )
                        .into());
                    }
                }

                let mut plans = Vec::with_capacity(sale.lines.len());
                for line in &sale.lines {
                    let plan = allocate(line.product_id, line.quantity, &tx.candidates(line.product_id))?;
                    for entry in &plan.entries {
                        tx.apply(
                            StockKey::new(line.product_id, entry.warehouse_id),
                            Direction::Out,
                            entry.amount,
                            reference.clone(),
                            sale.actor,
                        )?;
                    }
                    plans.push(plan);
                }
                Ok(plans)
            })
        })?;
        claim.confirm();

        tracing::info!(
            sale_id = %sale.id,
            lines = sale.lines.len(),
            movements = movements.len(),
            %total,
            "sale completed"
        );

        Ok(SaleReceipt {
            sale_id: sale.id,
            total,
            allocations,
            movements,
        })
    }
}
