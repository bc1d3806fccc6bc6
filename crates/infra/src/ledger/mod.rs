//! The stock ledger: current stock records, the movement log, and the
//! transactional boundary that keeps them in step.
//!
//! ## Concurrency
//!
//! Every write runs in a [`LedgerTransaction`] that locks all stock records it
//! may touch before reading any of them. Locks are taken in ascending
//! `StockKey` order against a single deadline, so two transactions can never
//! wait on each other in a cycle. If the deadline passes, every lock taken so
//! far is released and the operation fails with `Conflict`, which the ledger
//! retries according to its [`RetryPolicy`].

mod applier;
pub mod reconcile;
pub mod transaction;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{info, warn};

use stockledger_core::{DomainError, ProductId, WarehouseId};
use stockledger_inventory::{
    AllocationPlan, Candidate, LowStockEntry, Movement, Reference, StockKey, StockRecord,
    allocate, check_low_stock, ensure_positive_amount,
};

use crate::catalog::{Catalog, InMemoryCatalog};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::movement_log::{InMemoryMovementLog, MovementFilter, MovementLog, MovementPage, Pagination};
use crate::retry::RetryPolicy;
use crate::stock_store::{InMemoryStockStore, SharedCell};

pub use reconcile::{Discrepancy, ReconciliationReport};
pub use transaction::LedgerTransaction;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ClaimState {
    InFlight,
    Completed,
}

pub struct StockLedger<L = InMemoryMovementLog, C = InMemoryCatalog> {
    stock: InMemoryStockStore,
    log: L,
    catalog: C,
    config: LedgerConfig,
    retry: RetryPolicy,
    claims: Mutex<HashMap<Reference, ClaimState>>,
}

impl<L, C> StockLedger<L, C>
where
    L: MovementLog,
    C: Catalog,
{
    pub fn new(log: L, catalog: C, config: LedgerConfig) -> Self {
        let retry = config.retry_policy();
        Self {
            stock: InMemoryStockStore::new(),
            log,
            catalog,
            config,
            retry,
            claims: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    // ---------------------------------------------------------------------
    // Transactions
    // ---------------------------------------------------------------------

    /// Lock `keys` (in key order), run `f` against them, and commit what it staged.
    ///
    /// Any error from `f` or from the commit leaves records and log untouched.
    pub fn transaction<T, F>(
        &self,
        keys: impl IntoIterator<Item = StockKey>,
        f: F,
    ) -> LedgerResult<(T, Vec<Movement>)>
    where
        F: FnOnce(&mut LedgerTransaction<'_>) -> LedgerResult<T>,
    {
        let keys: BTreeSet<StockKey> = keys.into_iter().collect();
        let result = self.run_locked(&keys, f);
        // Drop cells no committed movement reached, e.g. the destination of a
        // failed transfer.
        self.stock.prune_unmaterialized(&keys);
        result
    }

    fn run_locked<T, F>(&self, keys: &BTreeSet<StockKey>, f: F) -> LedgerResult<(T, Vec<Movement>)>
    where
        F: FnOnce(&mut LedgerTransaction<'_>) -> LedgerResult<T>,
    {
        let cells: Vec<(StockKey, SharedCell)> =
            keys.iter().map(|key| (*key, self.stock.cell(*key))).collect();

        let deadline = Instant::now() + self.config.lock_timeout;
        let mut records = BTreeMap::new();
        for (key, cell) in &cells {
            let guard = cell
                .try_lock_until(deadline)
                .ok_or_else(|| lock_timeout(*key, self.config.lock_timeout))?;
            records.insert(*key, guard);
        }

        let mut tx = LedgerTransaction::new(records);
        let value = f(&mut tx)?;
        let movements = tx.commit(&self.log)?;
        Ok((value, movements))
    }

    /// Run `op`, retrying it while it fails with a retryable error.
    pub(crate) fn with_retry<T>(
        &self,
        operation: &'static str,
        mut op: impl FnMut() -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let mut attempt = 0;
        loop {
            match op() {
                Err(err) if err.is_retryable() && self.retry.should_retry(attempt) => {
                    attempt += 1;
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(operation, attempt, ?delay, error = %err, "retrying after conflict");
                    std::thread::sleep(delay);
                }
                other => return other,
            }
        }
    }

    // ---------------------------------------------------------------------
    // Business-event claims
    // ---------------------------------------------------------------------

    /// Mark `reference` as in progress. Fails with `Conflict` if it is already
    /// completed or being completed.
    pub(crate) fn claim(&self, reference: &Reference) -> LedgerResult<Claim<'_>> {
        let mut claims = self.claims.lock();
        if let Some(state) = claims.get(reference) {
            let what = match state {
                ClaimState::InFlight => "is already being completed",
                ClaimState::Completed => "was already completed",
            };
            return Err(DomainError::conflict(format!("{reference} {what}")).into());
        }
        claims.insert(reference.clone(), ClaimState::InFlight);
        Ok(Claim {
            claims: &self.claims,
            reference: reference.clone(),
            confirmed: false,
        })
    }

    /// Whether the business event behind `reference` completed successfully.
    pub fn is_completed(&self, reference: &Reference) -> bool {
        self.claims.lock().get(reference) == Some(&ClaimState::Completed)
    }

    // ---------------------------------------------------------------------
    // Catalog checks
    // ---------------------------------------------------------------------

    pub(crate) fn require_product(&self, product_id: ProductId) -> LedgerResult<()> {
        self.catalog
            .product(product_id)
            .map(|_| ())
            .ok_or_else(|| DomainError::not_found(format!("product {product_id}")).into())
    }

    pub(crate) fn require_warehouse(&self, warehouse_id: WarehouseId) -> LedgerResult<()> {
        self.catalog
            .warehouse(warehouse_id)
            .map(|_| ())
            .ok_or_else(|| DomainError::not_found(format!("warehouse {warehouse_id}")).into())
    }

    /// Keys of `product_id` in active warehouses.
    pub(crate) fn eligible_keys(&self, product_id: ProductId) -> Vec<StockKey> {
        self.stock
            .keys_for_product(product_id)
            .into_iter()
            .filter(|key| {
                self.catalog
                    .warehouse(key.warehouse_id)
                    .is_some_and(|w| w.active)
            })
            .collect()
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    fn read_cell(&self, key: StockKey, cell: &SharedCell) -> LedgerResult<Option<StockRecord>> {
        let deadline = Instant::now() + self.config.lock_timeout;
        let guard = cell
            .try_lock_until(deadline)
            .ok_or_else(|| lock_timeout(key, self.config.lock_timeout))?;
        Ok(guard.record(key))
    }

    /// Committed records for `product_id` (every product if `None`), in key order.
    fn snapshot(&self, product_id: Option<ProductId>) -> LedgerResult<Vec<StockRecord>> {
        let keys = match product_id {
            Some(p) => self.stock.keys_for_product(p),
            None => self.stock.all_keys(),
        };
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(cell) = self.stock.existing(key) {
                if let Some(record) = self.read_cell(key, &cell)? {
                    records.push(record);
                }
            }
        }
        Ok(records)
    }

    /// Committed quantity of a product in a warehouse; 0 if no record exists.
    pub fn get_stock(&self, product_id: ProductId, warehouse_id: WarehouseId) -> LedgerResult<i64> {
        self.require_product(product_id)?;
        self.require_warehouse(warehouse_id)?;
        let key = StockKey::new(product_id, warehouse_id);
        match self.stock.existing(key) {
            Some(cell) => Ok(self.read_cell(key, &cell)?.map_or(0, |r| r.quantity)),
            None => Ok(0),
        }
    }

    /// Sum of committed quantities of a product across all warehouses.
    pub fn total_stock(&self, product_id: ProductId) -> LedgerResult<i64> {
        self.require_product(product_id)?;
        self.snapshot(Some(product_id))?
            .iter()
            .try_fold(0i64, |total, r| total.checked_add(r.quantity))
            .ok_or_else(|| {
                DomainError::invalid_amount(format!("total stock of product {product_id} overflows")).into()
            })
    }

    /// Every committed record of a product, in warehouse order.
    pub fn stock_records(&self, product_id: ProductId) -> LedgerResult<Vec<StockRecord>> {
        self.require_product(product_id)?;
        self.snapshot(Some(product_id))
    }

    /// Read-only allocation plan against current stock in active warehouses.
    ///
    /// Nothing is locked beyond the individual reads; the plan may be stale by
    /// the time it is used. Sales re-plan under lock.
    pub fn allocate_for_sale(&self, product_id: ProductId, quantity: i64) -> LedgerResult<AllocationPlan> {
        ensure_positive_amount(quantity)?;
        self.require_product(product_id)?;
        let candidates: Vec<Candidate> = self
            .snapshot(Some(product_id))?
            .into_iter()
            .filter(|r| {
                self.catalog
                    .warehouse(r.warehouse_id())
                    .is_some_and(|w| w.active)
            })
            .map(|r| Candidate::new(r.warehouse_id(), r.quantity))
            .collect();
        Ok(allocate(product_id, quantity, &candidates)?)
    }

    /// Records whose quantity is strictly below their product's `min_stock`.
    pub fn list_low_stock(&self) -> LedgerResult<Vec<LowStockEntry>> {
        let entries: Vec<LowStockEntry> = self
            .snapshot(None)?
            .iter()
            .filter_map(|record| {
                let product = self.catalog.product(record.product_id())?;
                check_low_stock(record, product.min_stock)
            })
            .collect();
        info!(count = entries.len(), "low stock listed");
        Ok(entries)
    }

    /// Movements of one record, oldest first.
    pub fn movements_for(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> LedgerResult<Vec<Movement>> {
        Ok(self.log.for_record(StockKey::new(product_id, warehouse_id))?)
    }

    /// Movements caused by one business event, oldest first.
    pub fn movements_by_reference(&self, reference: &Reference) -> LedgerResult<Vec<Movement>> {
        Ok(self.log.by_reference(reference)?)
    }

    /// Newest movements first. `limit` defaults to, and is capped by, the
    /// configured recent-movements limit.
    pub fn recent_movements(&self, limit: Option<usize>) -> LedgerResult<Vec<Movement>> {
        let max = self.config.recent_movements_limit;
        let limit = limit.map_or(max, |l| l.min(max));
        Ok(self.log.recent(limit)?)
    }

    pub fn query_movements(
        &self,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> LedgerResult<MovementPage> {
        Ok(self.log.query(filter, pagination)?)
    }
}

impl StockLedger {
    /// Ledger over an in-memory log and the given catalog.
    pub fn in_memory(catalog: InMemoryCatalog, config: LedgerConfig) -> Self {
        Self::new(InMemoryMovementLog::new(), catalog, config)
    }
}

fn lock_timeout(key: StockKey, timeout: Duration) -> LedgerError {
    warn!(%key, ?timeout, "stock record lock timed out");
    DomainError::conflict(format!(
        "timed out after {timeout:?} waiting for stock record {key}"
    ))
    .into()
}

/// In-progress claim on a business event. Released on drop unless confirmed.
pub(crate) struct Claim<'a> {
    claims: &'a Mutex<HashMap<Reference, ClaimState>>,
    reference: Reference,
    confirmed: bool,
}

impl Claim<'_> {
    pub(crate) fn confirm(mut self) {
        self.claims
            .lock()
            .insert(self.reference.clone(), ClaimState::Completed);
        self.confirmed = true;
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if !self.confirmed {
            self.claims.lock().remove(&self.reference);
        }
    }
}
