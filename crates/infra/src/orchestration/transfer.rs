use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, ProductId, UserId, WarehouseId};
use stockledger_inventory::{Direction, Movement, Reference, StockKey, TransferId, ensure_positive_amount};

use crate::catalog::Catalog;
use crate::error::LedgerResult;
use crate::ledger::StockLedger;
use crate::movement_log::MovementLog;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub product_id: ProductId,
    pub from_warehouse_id: WarehouseId,
    pub to_warehouse_id: WarehouseId,
    pub quantity: i64,
    pub actor: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub transfer_id: TransferId,
    pub out_movement: Movement,
    pub in_movement: Movement,
}

impl<L, C> StockLedger<L, C>
where
    L: MovementLog,
    C: Catalog,
{
    pub fn transfer_stock(
        &self,
        product_id: ProductId,
        from_warehouse_id: WarehouseId,
        to_warehouse_id: WarehouseId,
        quantity: i64,
        actor: Option<UserId>,
    ) -> LedgerResult<TransferReceipt> {
        self.transfer(TransferRequest {
            product_id,
            from_warehouse_id,
            to_warehouse_id,
            quantity,
            actor,
        })
    }

    /// Move stock between warehouses: OUT on the source, then IN on the
    /// destination, committed together or not at all.
    pub fn transfer(&self, request: TransferRequest) -> LedgerResult<TransferReceipt> {
        if request.from_warehouse_id == request.to_warehouse_id {
            return Err(DomainError::validation("source and destination warehouses must differ").into());
        }
        ensure_positive_amount(request.quantity)?;
        self.require_product(request.product_id)?;
        self.require_warehouse(request.from_warehouse_id)?;
        self.require_warehouse(request.to_warehouse_id)?;

        let transfer_id = TransferId::new();
        let source = StockKey::new(request.product_id, request.from_warehouse_id);
        let destination = StockKey::new(request.product_id, request.to_warehouse_id);

        let ((), movements) = self.with_retry("transfer_stock", || {
            self.transaction([source, destination], |tx| {
                tx.apply(
                    source,
                    Direction::Out,
                    request.quantity,
                    Reference::transfer_out(transfer_id),
                    request.actor,
                )?;
                tx.apply(
                    destination,
                    Direction::In,
                    request.quantity,
                    Reference::transfer_in(transfer_id),
                    request.actor,
                )?;
                Ok(())
            })
        })?;

        let mut legs = movements.into_iter();
        let (Some(out_movement), Some(in_movement)) = (legs.next(), legs.next()) else {
            return Err(DomainError::invariant("transfer did not commit both legs").into());
        };

        tracing::info!(
            %transfer_id,
            product_id = %request.product_id,
            from = %request.from_warehouse_id,
            to = %request.to_warehouse_id,
            quantity = request.quantity,
            "transfer completed"
        );

        Ok(TransferReceipt {
            transfer_id,
            out_movement,
            in_movement,
        })
    }
}
