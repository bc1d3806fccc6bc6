//! Low-stock signal (read-only; never triggers any action).

use serde::{Deserialize, Serialize};

use stockledger_core::{ProductId, WarehouseId};

use crate::stock::StockRecord;

/// A stock record below its product's minimum stock threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockEntry {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub min_stock: i64,
}

impl LowStockEntry {
    /// Units missing to reach the threshold.
    pub fn shortfall(&self) -> i64 {
        self.min_stock - self.quantity
    }
}

/// `Some(entry)` when the record holds strictly less than `min_stock`.
pub fn check_low_stock(record: &StockRecord, min_stock: i64) -> Option<LowStockEntry> {
    (record.quantity < min_stock).then(|| LowStockEntry {
        product_id: record.product_id(),
        warehouse_id: record.warehouse_id(),
        quantity: record.quantity,
        min_stock,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stock::StockKey;

    fn record(quantity: i64) -> StockRecord {
        StockRecord::new(StockKey::new(ProductId::new(), WarehouseId::new()), quantity, 1)
    }

    #[test]
    fn below_threshold_is_reported_with_shortfall() {
        let entry = check_low_stock(&record(2), 5).unwrap();
        assert_eq!(entry.quantity, 2);
        assert_eq!(entry.min_stock, 5);
        assert_eq!(entry.shortfall(), 3);
    }

    #[test]
    fn threshold_itself_is_not_low() {
        assert!(check_low_stock(&record(5), 5).is_none());
        assert!(check_low_stock(&record(0), 0).is_none());
    }
}
