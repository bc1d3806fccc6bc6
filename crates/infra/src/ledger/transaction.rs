//! Ledger transaction: a set of locked stock records plus staged movements.
//!
//! A transaction holds the locks of every record it declared, in key order,
//! for its whole lifetime. Movements are applied against working quantities
//! and only reach the records and the log on `commit`. Dropping a transaction
//! without committing discards everything.

use std::collections::BTreeMap;

use parking_lot::MutexGuard;

use stockledger_core::{DomainError, ProductId};
use stockledger_inventory::{Candidate, Movement, MovementDraft, StockKey};

use crate::error::LedgerResult;
use crate::movement_log::MovementLog;
use crate::stock_store::StockCell;

pub struct LedgerTransaction<'c> {
    records: BTreeMap<StockKey, MutexGuard<'c, StockCell>>,
    pub(super) working: BTreeMap<StockKey, i64>,
    pub(super) drafts: Vec<MovementDraft>,
}

impl<'c> LedgerTransaction<'c> {
    pub(crate) fn new(records: BTreeMap<StockKey, MutexGuard<'c, StockCell>>) -> Self {
        let working = records
            .iter()
            .map(|(key, cell)| (*key, cell.quantity))
            .collect();
        Self {
            records,
            working,
            drafts: Vec::new(),
        }
    }

    /// Working quantity of a locked record (including staged movements).
    pub fn quantity(&self, key: StockKey) -> Option<i64> {
        self.working.get(&key).copied()
    }

    pub fn is_locked(&self, key: StockKey) -> bool {
        self.working.contains_key(&key)
    }

    /// Locked records of `product_id` as allocation candidates.
    pub fn candidates(&self, product_id: ProductId) -> Vec<Candidate> {
        self.working
            .iter()
            .filter(|(key, _)| key.product_id == product_id)
            .map(|(key, quantity)| Candidate::new(key.warehouse_id, *quantity))
            .collect()
    }

    pub fn staged(&self) -> &[MovementDraft] {
        &self.drafts
    }

    /// Append staged movements to the log, then write the new quantities into
    /// the still-locked records.
    ///
    /// Both writes happen while every lock is held, so no reader can observe a
    /// record ahead of (or behind) the log.
    pub(crate) fn commit<L: MovementLog + ?Sized>(self, log: &L) -> LedgerResult<Vec<Movement>> {
        let Self {
            mut records,
            working,
            drafts,
        } = self;

        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        for draft in &drafts {
            match working.get(&draft.key) {
                Some(quantity) if *quantity >= 0 => {}
                Some(quantity) => {
                    return Err(DomainError::invariant(format!(
                        "record {} would commit negative quantity {quantity}",
                        draft.key
                    ))
                    .into());
                }
                None => {
                    return Err(DomainError::invariant(format!(
                        "record {} is not locked by this transaction",
                        draft.key
                    ))
                    .into());
                }
            }
        }

        let committed = log.append(drafts)?;

        for movement in &committed {
            let key = movement.key();
            if let (Some(cell), Some(quantity)) = (records.get_mut(&key), working.get(&key)) {
                cell.quantity = *quantity;
                cell.version += 1;
                cell.materialized = true;
            }
        }

        Ok(committed)
    }
}

impl core::fmt::Debug for LedgerTransaction<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LedgerTransaction")
            .field("working", &self.working)
            .field("staged", &self.drafts.len())
            .finish()
    }
}
