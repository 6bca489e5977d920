//! Property tests: level aggregates stay consistent with resting orders

use std::collections::HashMap;

use book_engine::{Engine, EngineConfig, EventOutcome, OrderEvent, RecoveryMode, Side};
use proptest::prelude::*;

const WINDOW: u32 = 64;
const IDS: u32 = 32;
/// Registry small enough that ids collide and the table fills
const SMALL_CAPACITY: usize = 8;
const COLLIDING_IDS: u32 = 64;
/// Window much narrower than the price range so the base keeps moving
const DRIFT_WINDOW: u32 = 32;
const DRIFT_PRICES: u32 = 300;

#[derive(Debug, Clone)]
enum Op {
    Add { id: u32, side: Side, price: u32, qty: u32 },
    Cancel { id: u32 },
    Execute { id: u32, qty: u32 },
}

impl Op {
    fn event(&self) -> OrderEvent {
        match *self {
            Op::Add { id, side, price, qty } => OrderEvent::add(id, side, price, qty),
            Op::Cancel { id } => OrderEvent::cancel(id),
            Op::Execute { id, qty } => OrderEvent::execute(id, qty),
        }
    }
}

fn side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Bid), Just(Side::Ask)]
}

fn ops_over(ids: u32, prices: u32) -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..ids, side(), 0..prices, 0..100u32)
            .prop_map(|(id, side, price, qty)| Op::Add { id, side, price, qty }),
        1 => (0..ids).prop_map(|id| Op::Cancel { id }),
        2 => (0..ids, 0..150u32).prop_map(|(id, qty)| Op::Execute { id, qty }),
    ]
}

fn op() -> impl Strategy<Value = Op> {
    ops_over(IDS, WINDOW)
}

/// Resting orders as `id -> (side, price, qty)`
struct Model {
    orders: HashMap<u32, (Side, u32, u32)>,
    capacity: usize,
    table_full: u64,
}

impl Default for Model {
    fn default() -> Self {
        Self::with_capacity(64)
    }
}

impl Model {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            orders: HashMap::new(),
            capacity,
            table_full: 0,
        }
    }

    fn apply(&mut self, op: &Op) {
        match *op {
            Op::Add { id, side, price, qty } => {
                if self.orders.contains_key(&id) {
                    return;
                }
                if self.orders.len() == self.capacity {
                    self.table_full += 1;
                    return;
                }
                self.orders.insert(id, (side, price, qty));
            }
            Op::Cancel { id } => {
                self.orders.remove(&id);
            }
            Op::Execute { id, qty } => {
                if let Some(order) = self.orders.get_mut(&id) {
                    order.2 -= qty.min(order.2);
                    if order.2 == 0 {
                        self.orders.remove(&id);
                    }
                }
            }
        }
    }

    fn level(&self, side: Side, price: u32) -> u64 {
        self.orders
            .values()
            .filter(|(s, p, _)| *s == side && *p == price)
            .map(|(_, _, q)| u64::from(*q))
            .sum()
    }

    fn best(&self, side: Side) -> Option<u32> {
        let prices = self
            .orders
            .values()
            .filter(|(s, _, q)| *s == side && *q > 0)
            .map(|(_, p, _)| *p);
        match side {
            Side::Bid => prices.max(),
            Side::Ask => prices.min(),
        }
    }
}

/// Orders plus the window they were credited to, as `id -> (side, price, qty, credited)`
///
/// An order loses its credit once its price leaves the window, even if the
/// window later slides back over it.
struct DriftModel {
    base: u32,
    orders: HashMap<u32, (Side, u32, u32, bool)>,
}

impl DriftModel {
    fn new() -> Self {
        Self {
            base: 0,
            orders: HashMap::new(),
        }
    }

    fn contains(&self, price: u32) -> bool {
        price >= self.base && price < self.base + DRIFT_WINDOW
    }

    fn apply(&mut self, op: &Op) {
        match *op {
            Op::Add { id, side, price, qty } => {
                if price < self.base {
                    self.base = price;
                } else if price >= self.base + DRIFT_WINDOW {
                    self.base = price - DRIFT_WINDOW + 1;
                }
                let base = self.base;
                for order in self.orders.values_mut() {
                    if order.1 < base || order.1 >= base + DRIFT_WINDOW {
                        order.3 = false;
                    }
                }
                self.orders.entry(id).or_insert((side, price, qty, true));
            }
            Op::Cancel { id } => {
                self.orders.remove(&id);
            }
            Op::Execute { id, qty } => {
                if let Some(order) = self.orders.get_mut(&id) {
                    order.2 -= qty.min(order.2);
                    if order.2 == 0 {
                        self.orders.remove(&id);
                    }
                }
            }
        }
    }

    fn level(&self, side: Side, price: u32) -> u64 {
        self.orders
            .values()
            .filter(|(s, p, _, credited)| *credited && *s == side && *p == price)
            .map(|(_, _, q, _)| u64::from(*q))
            .sum()
    }

    fn best(&self, side: Side) -> Option<u32> {
        let prices = self
            .orders
            .values()
            .filter(|(s, _, q, credited)| *credited && *s == side && *q > 0)
            .map(|(_, p, _, _)| *p);
        match side {
            Side::Bid => prices.max(),
            Side::Ask => prices.min(),
        }
    }
}

fn engine(recovery: RecoveryMode) -> Engine {
    Engine::new(EngineConfig {
        registry_capacity: 64,
        window_size: WINDOW as usize,
        window_base: 0,
        recovery,
    })
    .unwrap()
}

fn assert_consistent(engine: &Engine, model: &Model) -> Result<(), TestCaseError> {
    prop_assert_eq!(engine.live_orders(), model.orders.len());
    for (id, (side, price, qty)) in &model.orders {
        let order = engine.order(*id);
        prop_assert_eq!(order.map(|o| (o.side, o.price, o.quantity)), Some((*side, *price, *qty)));
    }
    for side in [Side::Bid, Side::Ask] {
        for price in 0..WINDOW {
            prop_assert_eq!(engine.level_quantity(side, price), model.level(side, price));
        }
        let quote = match side {
            Side::Bid => engine.best_bid(),
            Side::Ask => engine.best_ask(),
        };
        if quote.valid {
            prop_assert!(quote.quantity > 0);
            prop_assert_eq!(quote.quantity, engine.level_quantity(side, quote.price));
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn levels_match_resting_orders(ops in prop::collection::vec(op(), 1..200)) {
        let mut engine = engine(RecoveryMode::Lazy);
        let mut model = Model::default();

        for op in &ops {
            engine.process(&op.event());
            model.apply(op);
            assert_consistent(&engine, &model)?;
        }
        prop_assert_eq!(engine.stats().quantity_clamps, 0);
        prop_assert_eq!(engine.stats().dropped_table_full, 0);
    }

    #[test]
    fn eager_recovery_tracks_true_best(ops in prop::collection::vec(op(), 1..200)) {
        let mut engine = engine(RecoveryMode::Eager);
        let mut model = Model::default();

        for op in &ops {
            engine.process(&op.event());
            model.apply(op);
            assert_consistent(&engine, &model)?;
            prop_assert_eq!(engine.best_bid().as_option().map(|(p, _)| p), model.best(Side::Bid));
            prop_assert_eq!(engine.best_ask().as_option().map(|(p, _)| p), model.best(Side::Ask));
        }
    }

    #[test]
    fn cancel_of_absent_id_changes_nothing(
        ops in prop::collection::vec(op(), 0..100),
        absent in IDS..IDS * 2,
    ) {
        let mut engine = engine(RecoveryMode::Lazy);
        for op in &ops {
            engine.process(&op.event());
        }
        let before = engine.top_of_book();
        let orders = engine.live_orders();

        prop_assert_eq!(engine.process(&OrderEvent::cancel(absent)), EventOutcome::UnknownOrder);

        let after = engine.top_of_book();
        prop_assert_eq!((after.bid, after.ask), (before.bid, before.ask));
        prop_assert_eq!(engine.live_orders(), orders);
    }

    #[test]
    fn colliding_ids_fill_and_drain_registry(
        ops in prop::collection::vec(ops_over(COLLIDING_IDS, WINDOW), 1..300),
    ) {
        let mut engine = Engine::new(EngineConfig {
            registry_capacity: SMALL_CAPACITY,
            window_size: WINDOW as usize,
            window_base: 0,
            recovery: RecoveryMode::Eager,
        })
        .unwrap();
        let mut model = Model::with_capacity(SMALL_CAPACITY);

        for op in &ops {
            engine.process(&op.event());
            model.apply(op);

            assert_consistent(&engine, &model)?;
            for id in 0..COLLIDING_IDS {
                prop_assert_eq!(engine.order(id).is_some(), model.orders.contains_key(&id));
            }
            prop_assert_eq!(engine.best_bid().as_option().map(|(p, _)| p), model.best(Side::Bid));
            prop_assert_eq!(engine.best_ask().as_option().map(|(p, _)| p), model.best(Side::Ask));
        }
        prop_assert_eq!(engine.stats().dropped_table_full, model.table_full);
        prop_assert_eq!(engine.stats().quantity_clamps, 0);
    }

    #[test]
    fn drifting_window_never_debits_foreign_levels(
        ops in prop::collection::vec(ops_over(IDS, DRIFT_PRICES), 1..300),
        eager in any::<bool>(),
    ) {
        let recovery = if eager { RecoveryMode::Eager } else { RecoveryMode::Lazy };
        let mut engine = Engine::new(EngineConfig {
            registry_capacity: 64,
            window_size: DRIFT_WINDOW as usize,
            window_base: 0,
            recovery,
        })
        .unwrap();
        let mut model = DriftModel::new();

        for op in &ops {
            engine.process(&op.event());
            model.apply(op);

            prop_assert_eq!(engine.window_base(), model.base);
            prop_assert_eq!(engine.live_orders(), model.orders.len());
            for side in [Side::Bid, Side::Ask] {
                for price in 0..DRIFT_PRICES {
                    let expected = if model.contains(price) { model.level(side, price) } else { 0 };
                    prop_assert_eq!(engine.level_quantity(side, price), expected);
                }
                let quote = match side {
                    Side::Bid => engine.best_bid(),
                    Side::Ask => engine.best_ask(),
                };
                if quote.valid {
                    prop_assert!(quote.quantity > 0);
                    prop_assert_eq!(quote.quantity, engine.level_quantity(side, quote.price));
                }
                if eager {
                    prop_assert_eq!(quote.as_option().map(|(p, _)| p), model.best(side));
                }
            }
        }
        prop_assert_eq!(engine.stats().quantity_clamps, 0);
    }
}
