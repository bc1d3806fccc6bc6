//! Product and warehouse lookups the ledger depends on.
//!
//! The ledger does not own catalog data; it only needs existence checks, the
//! warehouse `active` flag (allocation eligibility) and product `min_stock`
//! (low-stock listing).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use stockledger_core::{ProductId, WarehouseId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub product_id: ProductId,
    /// Per-warehouse threshold below which a record is reported as low stock.
    pub min_stock: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseInfo {
    pub warehouse_id: WarehouseId,
    pub name: String,
    /// Inactive warehouses are skipped by sale allocation.
    pub active: bool,
}

pub trait Catalog: Send + Sync {
    fn product(&self, product_id: ProductId) -> Option<ProductInfo>;

    fn warehouse(&self, warehouse_id: WarehouseId) -> Option<WarehouseInfo>;
}

impl<S> Catalog for Arc<S>
where
    S: Catalog + ?Sized,
{
    fn product(&self, product_id: ProductId) -> Option<ProductInfo> {
        (**self).product(product_id)
    }

    fn warehouse(&self, warehouse_id: WarehouseId) -> Option<WarehouseInfo> {
        (**self).warehouse(warehouse_id)
    }
}

/// In-memory catalog for tests and embedded use.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<ProductId, ProductInfo>>,
    warehouses: RwLock<HashMap<WarehouseId, WarehouseInfo>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_product(&self, product_id: ProductId, min_stock: i64) {
        self.products.write().insert(
            product_id,
            ProductInfo {
                product_id,
                min_stock,
            },
        );
    }

    pub fn add_warehouse(&self, warehouse_id: WarehouseId, name: impl Into<String>) {
        self.warehouses.write().insert(
            warehouse_id,
            WarehouseInfo {
                warehouse_id,
                name: name.into(),
                active: true,
            },
        );
    }

    /// Returns `false` if the warehouse is unknown.
    pub fn set_warehouse_active(&self, warehouse_id: WarehouseId, active: bool) -> bool {
        match self.warehouses.write().get_mut(&warehouse_id) {
            Some(w) => {
                w.active = active;
                true
            }
            None => false,
        }
    }
}

impl Catalog for InMemoryCatalog {
    fn product(&self, product_id: ProductId) -> Option<ProductInfo> {
        self.products.read().get(&product_id).cloned()
    }

    fn warehouse(&self, warehouse_id: WarehouseId) -> Option<WarehouseInfo> {
        self.warehouses.read().get(&warehouse_id).cloned()
    }
}
