//! Integration tests for the ledger under concurrent use.
//!
//! Verifies:
//! - Racing sales never oversell
//! - Transfers are atomic and deadlock-free in both directions
//! - Records always equal the replay of the movement log
//! - Lock timeouts surface as `Conflict` without side effects

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier, mpsc};
    use std::thread;
    use std::time::Duration;

    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    use stockledger_core::{AggregateId, Money, ProductId, WarehouseId};
    use stockledger_inventory::{Direction, Movement, MovementDraft, Reference, StockKey};
    use stockledger_observability::LogFormat;
    use stockledger_purchasing::{Purchase, PurchaseId};
    use stockledger_sales::{Sale, SaleId};

    use crate::catalog::InMemoryCatalog;
    use crate::config::LedgerConfig;
    use crate::error::{ErrorKind, LedgerResult};
    use crate::ledger::StockLedger;
    use crate::movement_log::{InMemoryMovementLog, MovementLog, MovementLogError};
    use crate::orchestration::ManualMovement;

    struct World {
        ledger: Arc<StockLedger>,
        product: ProductId,
        warehouses: Vec<WarehouseId>,
    }

    fn world(warehouses: usize, config: LedgerConfig) -> World {
        stockledger_observability::init_with(LogFormat::Text);

        let catalog = InMemoryCatalog::new();
        let product = ProductId::new();
        catalog.add_product(product, 2);
        let warehouses: Vec<WarehouseId> = (0..warehouses)
            .map(|n| {
                let w = WarehouseId::new();
                catalog.add_warehouse(w, format!("W{n}"));
                w
            })
            .collect();
        World {
            ledger: Arc::new(StockLedger::in_memory(catalog, config)),
            product,
            warehouses,
        }
    }

    fn receive(ledger: &StockLedger, warehouse: WarehouseId, product: ProductId, qty: i64) {
        let purchase = Purchase::new(PurchaseId::new(AggregateId::new()), warehouse, None)
            .with_line(product, qty, Money::new(dec!(1.00)));
        ledger.complete_purchase(&purchase).unwrap();
    }

    fn one_line_sale(product: ProductId, qty: i64) -> Sale {
        Sale::new(SaleId::new(AggregateId::new()), None).with_line(product, qty, Money::new(dec!(3.00)))
    }

    #[test]
    fn racing_sales_for_the_last_units_never_oversell() {
        for _ in 0..20 {
            let w = world(1, LedgerConfig::default());
            receive(&w.ledger, w.warehouses[0], w.product, 5);

            let barrier = Arc::new(Barrier::new(2));
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let ledger = Arc::clone(&w.ledger);
                    let barrier = Arc::clone(&barrier);
                    let product = w.product;
                    thread::spawn(move || {
                        barrier.wait();
                        ledger.complete_sale(&one_line_sale(product, 5))
                    })
                })
                .collect();

            let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            let successes = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(successes, 1, "exactly one sale must win: {results:?}");
            for err in results.iter().filter_map(|r| r.as_ref().err()) {
                assert!(
                    matches!(err.kind(), ErrorKind::InsufficientStock | ErrorKind::Conflict),
                    "unexpected failure: {err}"
                );
            }
            assert_eq!(w.ledger.get_stock(w.product, w.warehouses[0]).unwrap(), 0);
            assert!(w.ledger.reconcile().unwrap().is_consistent());
        }
    }

    #[test]
    fn opposite_transfers_do_not_deadlock_and_conserve_stock() {
        let w = world(2, LedgerConfig::default());
        let (a, b) = (w.warehouses[0], w.warehouses[1]);
        receive(&w.ledger, a, w.product, 100);
        receive(&w.ledger, b, w.product, 100);

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let ledger = Arc::clone(&w.ledger);
                let product = w.product;
                let (from, to) = if n % 2 == 0 { (a, b) } else { (b, a) };
                thread::spawn(move || {
                    for _ in 0..50 {
                        match ledger.transfer_stock(product, from, to, 3, None) {
                            Ok(_) => {}
                            Err(e) => assert_eq!(e.kind(), ErrorKind::InsufficientStock, "{e}"),
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(w.ledger.total_stock(w.product).unwrap(), 200);
        let report = w.ledger.reconcile().unwrap();
        assert!(report.is_consistent(), "{report:?}");
        assert_eq!(report.records_checked, 2);

        // Every transfer committed both legs.
        let movements = w.ledger.log().all().unwrap();
        let outs = movements.iter().filter(|m| m.reference.as_str().starts_with("TRANSFER-OUT:")).count();
        let ins = movements.iter().filter(|m| m.reference.as_str().starts_with("TRANSFER-IN:")).count();
        assert_eq!(outs, ins);
    }

    #[test]
    fn reconcile_is_clean_after_mixed_concurrent_activity() {
        let w = world(3, LedgerConfig::default());
        for warehouse in &w.warehouses {
            receive(&w.ledger, *warehouse, w.product, 20);
        }

        let handles: Vec<_> = (0..6)
            .map(|n| {
                let ledger = Arc::clone(&w.ledger);
                let product = w.product;
                let warehouses = w.warehouses.clone();
                thread::spawn(move || {
                    for i in 0..30usize {
                        let here = warehouses[(n + i) % warehouses.len()];
                        let there = warehouses[(n + i + 1) % warehouses.len()];
                        let _ = match (n + i) % 4 {
                            0 => ledger.complete_sale(&one_line_sale(product, 2)).map(|_| ()),
                            1 => ledger.transfer_stock(product, here, there, 1, None).map(|_| ()),
                            2 => ledger
                                .record_manual_movement(ManualMovement {
                                    product_id: product,
                                    warehouse_id: here,
                                    direction: Direction::In,
                                    amount: 1,
                                    reference: format!("restock {n}/{i}"),
                                    actor: None,
                                    notes: None,
                                })
                                .map(|_| ()),
                            _ => ledger
                                .apply_movement(product, here, Direction::Out, 1, Reference::sale(format!("{n}-{i}")), None)
                                .map(|_| ()),
                        };
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let report = w.ledger.reconcile().unwrap();
        assert!(report.is_consistent(), "{report:?}");
        for record in w.ledger.stock_records(w.product).unwrap() {
            assert!(record.quantity >= 0);
        }

        // Sequences are gapless and timestamps never go backwards.
        let movements = w.ledger.log().all().unwrap();
        for pair in movements.windows(2) {
            assert_eq!(pair[1].sequence, pair[0].sequence + 1);
            assert!(pair[1].created_at >= pair[0].created_at);
        }
    }

    #[test]
    fn concurrent_duplicate_purchase_completes_once() {
        let w = world(1, LedgerConfig::default());
        let purchase = Arc::new(
            Purchase::new(PurchaseId::new(AggregateId::new()), w.warehouses[0], None)
                .with_line(w.product, 4, Money::new(dec!(2.00))),
        );

        let barrier = Arc::new(Barrier::new(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ledger = Arc::clone(&w.ledger);
                let purchase = Arc::clone(&purchase);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    ledger.complete_purchase(&purchase)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| e.kind() == ErrorKind::Conflict)
        );
        assert_eq!(w.ledger.get_stock(w.product, w.warehouses[0]).unwrap(), 4);
    }

    #[test]
    fn blocked_transaction_times_out_as_conflict() {
        let config = LedgerConfig::default()
            .with_lock_timeout(Duration::from_millis(30))
            .with_conflict_retries(1);
        let w = world(2, config);
        let (a, b) = (w.warehouses[0], w.warehouses[1]);
        receive(&w.ledger, a, w.product, 10);

        // Hold the source record's lock from another thread.
        let (locked_tx, locked_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let holder = {
            let ledger = Arc::clone(&w.ledger);
            let key = StockKey::new(w.product, a);
            thread::spawn(move || {
                ledger
                    .transaction([key], |_tx| {
                        let _ = locked_tx.send(());
                        let _ = release_rx.recv_timeout(Duration::from_secs(5));
                        Ok(())
                    })
                    .map(|_| ())
            })
        };
        locked_rx.recv_timeout(Duration::from_secs(1)).unwrap();

        let err = w.ledger.transfer_stock(w.product, a, b, 2, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.is_retryable());

        release_tx.send(()).unwrap();
        holder.join().unwrap().unwrap();

        assert_eq!(w.ledger.get_stock(w.product, a).unwrap(), 10);
        assert_eq!(w.ledger.get_stock(w.product, b).unwrap(), 0);
        assert_eq!(w.ledger.recent_movements(None).unwrap().len(), 1);

        // Once the lock is free the same transfer goes through.
        w.ledger.transfer_stock(w.product, a, b, 2, None).unwrap();
        assert_eq!(w.ledger.get_stock(w.product, b).unwrap(), 2);
    }

    /// Log that refuses every append.
    #[derive(Default)]
    struct UnavailableLog(InMemoryMovementLog);

    impl MovementLog for UnavailableLog {
        fn append(&self, _drafts: Vec<MovementDraft>) -> Result<Vec<Movement>, MovementLogError> {
            Err(MovementLogError::Unavailable("disk full".to_string()))
        }

        fn for_record(&self, key: StockKey) -> Result<Vec<Movement>, MovementLogError> {
            self.0.for_record(key)
        }

        fn by_reference(&self, reference: &Reference) -> Result<Vec<Movement>, MovementLogError> {
            self.0.by_reference(reference)
        }

        fn recent(&self, limit: usize) -> Result<Vec<Movement>, MovementLogError> {
            self.0.recent(limit)
        }

        fn all(&self) -> Result<Vec<Movement>, MovementLogError> {
            self.0.all()
        }
    }

    #[test]
    fn log_failure_leaves_records_untouched() {
        let catalog = InMemoryCatalog::new();
        let product = ProductId::new();
        let (a, b) = (WarehouseId::new(), WarehouseId::new());
        catalog.add_product(product, 0);
        catalog.add_warehouse(a, "A");
        catalog.add_warehouse(b, "B");
        let ledger = StockLedger::new(UnavailableLog::default(), catalog, LedgerConfig::default());

        let purchase = Purchase::new(PurchaseId::new(AggregateId::new()), a, None)
            .with_line(product, 3, Money::new(dec!(1.00)));
        let err = ledger.complete_purchase(&purchase).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);

        assert_eq!(ledger.get_stock(product, a).unwrap(), 0);
        assert!(ledger.stock_records(product).unwrap().is_empty());
        assert!(!ledger.is_completed(&Reference::purchase(purchase.id)));
        assert!(ledger.reconcile().unwrap().is_consistent());
    }

    #[derive(Debug, Clone)]
    enum Step {
        In(usize, i64),
        Out(usize, i64),
        Transfer(usize, usize, i64),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (0..3usize, 1..20i64).prop_map(|(w, n)| Step::In(w, n)),
            (0..3usize, 1..20i64).prop_map(|(w, n)| Step::Out(w, n)),
            (0..3usize, 0..3usize, 1..20i64).prop_map(|(a, b, n)| Step::Transfer(a, b, n)),
        ]
    }

    fn run(ledger: &StockLedger, product: ProductId, warehouses: &[WarehouseId], step: &Step) -> LedgerResult<()> {
        match *step {
            Step::In(w, n) => ledger
                .apply_movement(product, warehouses[w], Direction::In, n, Reference::purchase("prop"), None)
                .map(|_| ()),
            Step::Out(w, n) => ledger
                .apply_movement(product, warehouses[w], Direction::Out, n, Reference::sale("prop"), None)
                .map(|_| ()),
            Step::Transfer(a, b, n) => ledger
                .transfer_stock(product, warehouses[a], warehouses[b], n, None)
                .map(|_| ()),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

        #[test]
        fn records_always_equal_their_replayed_movements(steps in prop::collection::vec(step(), 1..40)) {
            let w = world(3, LedgerConfig::default());
            for step in &steps {
                let _ = run(&w.ledger, w.product, &w.warehouses, step);

                for warehouse in &w.warehouses {
                    let quantity = w.ledger.get_stock(w.product, *warehouse).unwrap();
                    let replayed: i64 = w
                        .ledger
                        .movements_for(w.product, *warehouse)
                        .unwrap()
                        .iter()
                        .map(Movement::signed_amount)
                        .sum();
                    prop_assert!(quantity >= 0);
                    prop_assert_eq!(quantity, replayed);
                }
            }
            prop_assert!(w.ledger.reconcile().unwrap().is_consistent());
        }
    }
}
