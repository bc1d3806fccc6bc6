//! Rebuild stock from the movement log and compare it with the live records.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use stockledger_inventory::{Movement, StockKey};

use super::{StockLedger, lock_timeout};
use crate::catalog::Catalog;
use crate::error::LedgerResult;
use crate::movement_log::MovementLog;

/// One record whose stored quantity disagrees with its movement history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub key: StockKey,
    /// `None` when movements exist but no committed record does.
    pub recorded: Option<i64>,
    pub derived: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub records_checked: usize,
    pub movements_replayed: usize,
    pub discrepancies: Vec<Discrepancy>,
}

impl ReconciliationReport {
    pub fn is_consistent(&self) -> bool {
        self.discrepancies.is_empty()
    }
}

/// Fold movements (in sequence order) into a quantity per record.
pub fn replay<'a>(movements: impl IntoIterator<Item = &'a Movement>) -> BTreeMap<StockKey, i64> {
    let mut quantities = BTreeMap::new();
    for movement in movements {
        *quantities.entry(movement.key()).or_insert(0) += movement.signed_amount();
    }
    quantities
}

impl<L, C> StockLedger<L, C>
where
    L: MovementLog,
    C: Catalog,
{
    /// Check that every record equals the replay of its movements.
    ///
    /// All record locks are taken (in key order) before the log is read, so
    /// no transaction can commit in between and the comparison is exact.
    pub fn reconcile(&self) -> LedgerResult<ReconciliationReport> {
        let keys = self.stock.all_keys();
        let cells: Vec<_> = keys
            .iter()
            .filter_map(|key| self.stock.existing(*key).map(|cell| (*key, cell)))
            .collect();

        let deadline = Instant::now() + self.config.lock_timeout;
        let mut guards = Vec::with_capacity(cells.len());
        for (key, cell) in &cells {
            let guard = cell
                .try_lock_until(deadline)
                .ok_or_else(|| lock_timeout(*key, self.config.lock_timeout))?;
            guards.push((*key, guard));
        }

        let locked: BTreeSet<StockKey> = guards.iter().map(|(key, _)| *key).collect();
        let movements = self.log.all()?;
        // Movements on keys created after the snapshot belong to later commits.
        let derived = replay(movements.iter().filter(|m| locked.contains(&m.key())));

        let mut discrepancies = Vec::new();
        let mut records_checked = 0;
        for (key, guard) in &guards {
            let expected = derived.get(key).copied();
            match (guard.materialized, expected) {
                (true, _) => {
                    records_checked += 1;
                    let replayed = expected.unwrap_or(0);
                    if guard.quantity != replayed {
                        discrepancies.push(Discrepancy {
                            key: *key,
                            recorded: Some(guard.quantity),
                            derived: replayed,
                        });
                    }
                }
                (false, Some(replayed)) => discrepancies.push(Discrepancy {
                    key: *key,
                    recorded: None,
                    derived: replayed,
                }),
                (false, None) => {}
            }
        }
        drop(guards);

        let report = ReconciliationReport {
            records_checked,
            movements_replayed: movements.len(),
            discrepancies,
        };
        if report.is_consistent() {
            info!(
                records = report.records_checked,
                movements = report.movements_replayed,
                "reconciliation passed"
            );
        } else {
            error!(
                discrepancies = report.discrepancies.len(),
                "reconciliation found drift between records and movements"
            );
        }
        Ok(report)
    }
}
