//! Current stock records, one lockable cell per `(product, warehouse)`.
//!
//! Cells are created lazily the first time a transaction asks for a key. A
//! cell stays invisible to readers (`materialized == false`) until a committed
//! movement touches it, so a rolled-back transaction leaves no visible record.
//! Cells that never materialize are dropped again once no transaction holds
//! them.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use stockledger_core::ProductId;
use stockledger_inventory::{StockKey, StockRecord};

#[derive(Debug, Default)]
pub(crate) struct StockCell {
    pub(crate) quantity: i64,
    pub(crate) version: u64,
    pub(crate) materialized: bool,
}

impl StockCell {
    pub(crate) fn record(&self, key: StockKey) -> Option<StockRecord> {
        self.materialized
            .then(|| StockRecord::new(key, self.quantity, self.version))
    }
}

pub(crate) type SharedCell = Arc<Mutex<StockCell>>;

#[derive(Debug, Default)]
pub struct InMemoryStockStore {
    cells: RwLock<HashMap<StockKey, SharedCell>>,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cell for `key`, creating an unmaterialized one if needed.
    pub(crate) fn cell(&self, key: StockKey) -> SharedCell {
        if let Some(cell) = self.cells.read().get(&key) {
            return Arc::clone(cell);
        }
        let mut cells = self.cells.write();
        Arc::clone(cells.entry(key).or_default())
    }

    /// Drop the cells of `keys` that were never committed and that no one
    /// else holds. Returns how many were removed.
    pub(crate) fn prune_unmaterialized<'k>(&self, keys: impl IntoIterator<Item = &'k StockKey>) -> usize {
        let mut cells = self.cells.write();
        let mut removed = 0;
        for key in keys {
            // With the map write-locked, a count of 1 means no transaction or
            // reader has a handle to this cell, and none can obtain one.
            let unused = cells.get(key).is_some_and(|cell| {
                Arc::strong_count(cell) == 1 && cell.try_lock().is_some_and(|c| !c.materialized)
            });
            if unused {
                cells.remove(key);
                removed += 1;
            }
        }
        removed
    }

    pub(crate) fn existing(&self, key: StockKey) -> Option<SharedCell> {
        self.cells.read().get(&key).cloned()
    }

    /// Keys with a cell for `product_id`, in lock order.
    pub(crate) fn keys_for_product(&self, product_id: ProductId) -> Vec<StockKey> {
        let mut keys: Vec<StockKey> = self
            .cells
            .read()
            .keys()
            .filter(|k| k.product_id == product_id)
            .copied()
            .collect();
        keys.sort();
        keys
    }

    /// All keys, in lock order.
    pub(crate) fn all_keys(&self) -> Vec<StockKey> {
        let mut keys: Vec<StockKey> = self.cells.read().keys().copied().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_core::WarehouseId;

    #[test]
    fn cells_are_shared_per_key_and_start_invisible() {
        let store = InMemoryStockStore::new();
        let key = StockKey::new(ProductId::new(), WarehouseId::new());

        let a = store.cell(key);
        let b = store.cell(key);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.lock().record(key), None);

        {
            let mut cell = a.lock();
            cell.quantity = 4;
            cell.version = 1;
            cell.materialized = true;
        }
        assert_eq!(b.lock().record(key), Some(StockRecord::new(key, 4, 1)));
    }

    #[test]
    fn only_idle_uncommitted_cells_are_pruned() {
        let store = InMemoryStockStore::new();
        let product = ProductId::new();
        let [idle, held, committed] =
            [(); 3].map(|_| StockKey::new(product, WarehouseId::new()));

        store.cell(idle);
        let handle = store.cell(held);
        store.cell(committed).lock().materialized = true;

        assert_eq!(store.prune_unmaterialized(&[idle, held, committed]), 1);
        assert!(store.existing(idle).is_none());
        assert!(store.existing(held).is_some());
        assert!(store.existing(committed).is_some());

        drop(handle);
        assert_eq!(store.prune_unmaterialized(&[held]), 1);
        assert_eq!(store.all_keys(), vec![committed]);
    }

    #[test]
    fn keys_are_returned_in_lock_order() {
        let store = InMemoryStockStore::new();
        let product = ProductId::new();
        let mut expected: Vec<StockKey> =
            (0..4).map(|_| StockKey::new(product, WarehouseId::new())).collect();
        for key in expected.iter().rev() {
            store.cell(*key);
        }
        store.cell(StockKey::new(ProductId::new(), WarehouseId::new()));

        expected.sort();
        assert_eq!(store.keys_for_product(product), expected);
        assert_eq!(store.all_keys().len(), 5);
    }
}
