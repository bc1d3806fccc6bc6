use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use stockledger_core::Money;
use stockledger_inventory::{Direction, Movement, Reference, StockKey};
use stockledger_purchasing::{Purchase, PurchaseId};

use crate::catalog::Catalog;
use crate::error::LedgerResult;
use crate::ledger::StockLedger;
use crate::movement_log::MovementLog;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub purchase_id: PurchaseId,
    /// Server-computed total.
    pub total: Money,
    pub movements: Vec<Movement>,
}

impl<L, C> StockLedger<L, C>
where
    L: MovementLog,
    C: Catalog,
{
    /// Receive a purchase into its warehouse: one IN movement per line, in
    /// line order, all in one transaction.
    pub fn complete_purchase(&self, purchase: &Purchase) -> LedgerResult<PurchaseReceipt> {
        let total = purchase.checked_total(self.config().total_tolerance)?;
        self.require_warehouse(purchase.warehouse_id)?;
        for line in &purchase.lines {
            self.require_product(line.product_id)?;
        }

        let reference = Reference::purchase(purchase.id);
        let claim = self.claim(&reference)?;

        let keys: BTreeSet<StockKey> = purchase
            .lines
            .iter()
            .map(|line| StockKey::new(line.product_id, purchase.warehouse_id))
            .collect();

        let ((), movements) = self.with_retry("complete_purchase", || {
            self.transaction(keys.iter().copied(), |tx| {
                for line in &purchase.lines {
                    tx.apply(
                        StockKey::new(line.product_id, purchase.warehouse_id),
                        Direction::In,
                        line.quantity,
                        reference.clone(),
                        purchase.actor,
                    )?;
                }
                Ok(())
            })
        })?;
        claim.confirm();

        tracing::info!(
            purchase_id = %purchase.id,
            warehouse_id = %purchase.warehouse_id,
            lines = purchase.lines.len(),
            %total,
            "purchase completed"
        );

        Ok(PurchaseReceipt {
            purchase_id: purchase.id,
            total,
            movements,
        })
    }
}
