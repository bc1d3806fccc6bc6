use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, ProductId, UserId, WarehouseId};
use stockledger_inventory::{Direction, Movement, MovementDraft, Reference, StockKey, ensure_positive_amount};

use crate::catalog::Catalog;
use crate::error::LedgerResult;
use crate::ledger::StockLedger;
use crate::movement_log::MovementLog;

/// Caller-entered stock adjustment (count correction, damage write-off, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualMovement {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub direction: Direction,
    pub amount: i64,
    /// Free text; must not be blank.
    pub reference: String,
    pub actor: Option<UserId>,
    pub notes: Option<String>,
}

impl<L, C> StockLedger<L, C>
where
    L: MovementLog,
    C: Catalog,
{
    /// Apply a single movement in its own transaction.
    pub fn apply_movement(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        direction: Direction,
        amount: i64,
        reference: Reference,
        actor: Option<UserId>,
    ) -> LedgerResult<Movement> {
        let key = StockKey::new(product_id, warehouse_id);
        self.apply_single(MovementDraft::new(key, direction, amount, reference, actor))
    }

    pub fn record_manual_movement(&self, request: ManualMovement) -> LedgerResult<Movement> {
        let reference = Reference::manual(request.reference)?;
        let key = StockKey::new(request.product_id, request.warehouse_id);
        let draft = MovementDraft::new(key, request.direction, request.amount, reference, request.actor)
            .with_notes(request.notes);
        self.apply_single(draft)
    }

    fn apply_single(&self, draft: MovementDraft) -> LedgerResult<Movement> {
        ensure_positive_amount(draft.amount)?;
        self.require_product(draft.key.product_id)?;
        self.require_warehouse(draft.key.warehouse_id)?;

        let key = draft.key;
        let ((), mut movements) = self.with_retry("apply_movement", || {
            let draft = draft.clone();
            self.transaction([key], move |tx| tx.apply_draft(draft).map(|_| ()))
        })?;

        let movement = movements
            .pop()
            .ok_or_else(|| DomainError::invariant("movement was not committed"))?;

        tracing::info!(
            key = %movement.key(),
            direction = %movement.direction,
            amount = movement.amount,
            reference = %movement.reference,
            sequence = movement.sequence,
            "movement recorded"
        );
        Ok(movement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::config::LedgerConfig;
    use crate::error::ErrorKind;

    fn setup() -> (StockLedger, ProductId, WarehouseId) {
        let catalog = InMemoryCatalog::new();
        let p = ProductId::new();
        let w = WarehouseId::new();
        catalog.add_product(p, 0);
        catalog.add_warehouse(w, "Main");
        (StockLedger::in_memory(catalog, LedgerConfig::default()), p, w)
    }

    fn manual(p: ProductId, w: WarehouseId, direction: Direction, amount: i64) -> ManualMovement {
        ManualMovement {
            product_id: p,
            warehouse_id: w,
            direction,
            amount,
            reference: "cycle count".to_string(),
            actor: Some(UserId::new()),
            notes: Some("aisle 4".to_string()),
        }
    }

    #[test]
    fn manual_in_then_out_updates_stock_and_log() {
        let (ledger, p, w) = setup();

        let m = ledger.record_manual_movement(manual(p, w, Direction::In, 10)).unwrap();
        assert_eq!(m.reference.as_str(), "cycle count");
        assert_eq!(m.notes.as_deref(), Some("aisle 4"));

        ledger.record_manual_movement(manual(p, w, Direction::Out, 4)).unwrap();
        assert_eq!(ledger.get_stock(p, w).unwrap(), 6);
        assert_eq!(ledger.movements_for(p, w).unwrap().len(), 2);
    }

    #[test]
    fn movements_serialize_with_wire_direction_names() {
        let (ledger, p, w) = setup();
        let m = ledger.record_manual_movement(manual(p, w, Direction::In, 1)).unwrap();

        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["direction"], "IN");
        assert_eq!(json["reference"], "cycle count");
        assert_eq!(json["sequence"], 1);
    }

    #[test]
    fn out_beyond_stock_changes_nothing() {
        let (ledger, p, w) = setup();
        ledger.record_manual_movement(manual(p, w, Direction::In, 2)).unwrap();

        let err = ledger.record_manual_movement(manual(p, w, Direction::Out, 3)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert_eq!(ledger.get_stock(p, w).unwrap(), 2);
        assert_eq!(ledger.movements_for(p, w).unwrap().len(), 1);
    }

    #[test]
    fn bad_input_is_rejected_before_anything_is_written() {
        let (ledger, p, w) = setup();

        let blank = ManualMovement {
            reference: "   ".to_string(),
            ..manual(p, w, Direction::In, 1)
        };
        assert_eq!(ledger.record_manual_movement(blank).unwrap_err().kind(), ErrorKind::Validation);

        let zero = manual(p, w, Direction::In, 0);
        assert_eq!(ledger.record_manual_movement(zero).unwrap_err().kind(), ErrorKind::InvalidAmount);

        let unknown = manual(p, WarehouseId::new(), Direction::In, 1);
        assert_eq!(ledger.record_manual_movement(unknown).unwrap_err().kind(), ErrorKind::NotFound);

        assert!(ledger.recent_movements(None).unwrap().is_empty());
    }

    #[test]
    fn get_stock_is_stable_without_movements() {
        let (ledger, p, w) = setup();
        ledger
            .apply_movement(p, w, Direction::In, 3, Reference::purchase("seed"), None)
            .unwrap();
        assert_eq!(ledger.get_stock(p, w).unwrap(), ledger.get_stock(p, w).unwrap());
    }
}
