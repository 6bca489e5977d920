//! Engine driver
//!
//! Runs each event through lookup, level update and best-price refresh, in
//! that order, before accepting the next one.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::tracker::BestChange;
use super::{
    BestPriceTracker, OrderRecord, OrderRegistry, PriceWindow, Probe, Quote, RecoveryMode,
    Reposition, Side, SlotRef, TopOfBook,
};
use crate::error::Result;
use crate::parser::{EventKind, OrderEvent};

/// Construction parameters for an `Engine`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of resting orders
    pub registry_capacity: usize,
    /// Number of price levels per side
    pub window_size: usize,
    /// Initial lowest price of the window
    pub window_base: u32,
    pub recovery: RecoveryMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            registry_capacity: 65_536,
            window_size: 1024,
            window_base: 0,
            recovery: RecoveryMode::Lazy,
        }
    }
}

/// Driver state; `Idle` between events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineStage {
    Idle,
    LookupOrAllocate,
    ApplyUpdate,
    RefreshBest,
}

/// What happened to a single event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    /// The event mutated the book
    Applied,
    /// Add for an id that is already resting; ignored
    DuplicateAdd,
    /// Cancel or execute for an id that is not resting; ignored
    UnknownOrder,
    /// Add dropped because every registry slot is occupied
    TableFull,
}

impl EventOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventOutcome::Applied => "applied",
            EventOutcome::DuplicateAdd => "duplicate_add",
            EventOutcome::UnknownOrder => "unknown_order",
            EventOutcome::TableFull => "table_full",
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, EventOutcome::Applied)
    }
}

/// Event counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub events: u64,
    pub adds: u64,
    pub cancels: u64,
    pub executes: u64,
    pub applied: u64,
    pub duplicate_adds: u64,
    pub unknown_orders: u64,
    pub dropped_table_full: u64,
    /// Applied adds that carried no quantity
    pub zero_quantity_adds: u64,
    pub full_fills: u64,
    pub window_repositions: u64,
    /// Prices dropped from the window by repositions
    pub evicted_levels: u64,
    /// Cancels and executes whose level had been evicted
    pub window_misses: u64,
    pub best_invalidations: u64,
    /// Level decrements that hit the zero floor
    pub quantity_clamps: u64,
}

/// Top-of-book engine for a single instrument
#[derive(Debug)]
pub struct Engine {
    registry: OrderRegistry,
    window: PriceWindow,
    tracker: BestPriceTracker,
    recovery: RecoveryMode,
    stage: EngineStage,
    sequence: u64,
    stats: EngineStats,
}

impl Engine {
    /// Create an engine with empty registry, zeroed window and invalid quotes
    pub fn new(config: EngineConfig) -> Result<Self> {
        Ok(Self {
            registry: OrderRegistry::with_capacity(config.registry_capacity)?,
            window: PriceWindow::new(config.window_base, config.window_size)?,
            tracker: BestPriceTracker::with_mode(config.recovery),
            recovery: config.recovery,
            stage: EngineStage::Idle,
            sequence: 0,
            stats: EngineStats::default(),
        })
    }

    /// Process one event to completion
    pub fn process(&mut self, event: &OrderEvent) -> EventOutcome {
        self.stats.events += 1;

        let outcome = match event.kind {
            EventKind::Add => {
                self.stats.adds += 1;
                self.on_add(event)
            }
            EventKind::Cancel => {
                self.stats.cancels += 1;
                self.on_cancel(event)
            }
            EventKind::Execute => {
                self.stats.executes += 1;
                self.on_execute(event)
            }
        };

        match outcome {
            EventOutcome::Applied => self.stats.applied += 1,
            EventOutcome::DuplicateAdd => self.stats.duplicate_adds += 1,
            EventOutcome::UnknownOrder => self.stats.unknown_orders += 1,
            EventOutcome::TableFull => self.stats.dropped_table_full += 1,
        }

        self.stage = EngineStage::Idle;
        self.sequence += 1;
        outcome
    }

    fn on_add(&mut self, event: &OrderEvent) -> EventOutcome {
        if let Some(moved) = self.window.reposition_if_needed(event.price) {
            self.on_reposition(moved, event.price);
        }

        self.stage = EngineStage::LookupOrAllocate;
        let slot = match self.registry.find_or_allocate(event.order_id) {
            Probe::AllocatedNew(slot) => slot,
            Probe::FoundExisting(_) => {
                debug!(order_id = event.order_id, "Ignoring duplicate add");
                return EventOutcome::DuplicateAdd;
            }
            Probe::TableFull => {
                warn!(
                    order_id = event.order_id,
                    capacity = self.registry.capacity(),
                    "Order registry full, dropping add"
                );
                return EventOutcome::TableFull;
            }
        };

        self.stage = EngineStage::ApplyUpdate;
        let mut order = OrderRecord::new(event.order_id, event.side, event.price, event.quantity);
        order.generation = self.window.generation(event.price);
        self.registry.write(slot, order);
        if event.quantity == 0 {
            self.stats.zero_quantity_adds += 1;
            debug!(order_id = event.order_id, "Add rests with zero quantity");
        }

        let index = self.window.index_of(event.price);
        self.window.add_quantity(event.side, index, event.quantity);

        self.refresh_best(event.side, index);
        EventOutcome::Applied
    }

    fn on_reposition(&mut self, moved: Reposition, price: u32) {
        self.stats.window_repositions += 1;
        self.stats.evicted_levels += moved.evicted as u64;
        debug!(
            old_base = moved.old_base,
            new_base = moved.new_base,
            evicted = moved.evicted,
            price,
            "Window repositioned"
        );

        let [bid, ask] = self.tracker.rebase(&self.window);
        for (side, change) in [(Side::Bid, bid), (Side::Ask, ask)] {
            if change == BestChange::Invalidated {
                self.stats.best_invalidations += 1;
                debug!(?side, "Best price evicted from window");
            }
        }
    }

    fn on_cancel(&mut self, event: &OrderEvent) -> EventOutcome {
        self.stage = EngineStage::LookupOrAllocate;
        let Some((slot, order)) = self.lookup(event.order_id) else {
            debug!(order_id = event.order_id, "Cancel for unknown order");
            return EventOutcome::UnknownOrder;
        };

        self.stage = EngineStage::ApplyUpdate;
        self.registry.remove(slot);
        match self.credited_index(&order) {
            Some(index) => {
                self.remove_from_level(order.side, index, order.quantity);
                self.refresh_best(order.side, index);
            }
            None => self.window_miss(&order),
        }
        EventOutcome::Applied
    }

    fn on_execute(&mut self, event: &OrderEvent) -> EventOutcome {
        self.stage = EngineStage::LookupOrAllocate;
        let Some((slot, mut order)) = self.lookup(event.order_id) else {
            debug!(order_id = event.order_id, "Execute for unknown order");
            return EventOutcome::UnknownOrder;
        };

        self.stage = EngineStage::ApplyUpdate;
        let exec_qty = event.quantity.min(order.quantity);
        let credited = self.credited_index(&order);

        order.quantity -= exec_qty;
        if order.quantity == 0 {
            self.stats.full_fills += 1;
            self.registry.remove(slot);
        } else {
            self.registry.write(slot, order);
        }

        match credited {
            Some(index) => {
                self.remove_from_level(order.side, index, exec_qty);
                self.refresh_best(order.side, index);
            }
            None => self.window_miss(&order),
        }
        EventOutcome::Applied
    }

    /// Window index still holding `order`'s quantity, if its level was not evicted
    fn credited_index(&self, order: &OrderRecord) -> Option<usize> {
        self.window
            .holds(order.price, order.generation)
            .then(|| self.window.index_of(order.price))
    }

    fn window_miss(&mut self, order: &OrderRecord) {
        self.stats.window_misses += 1;
        debug!(
            order_id = order.order_id,
            price = order.price,
            base = self.window.base(),
            "Order level was evicted, window untouched"
        );
    }

    fn lookup(&self, order_id: u32) -> Option<(SlotRef, OrderRecord)> {
        let slot = self.registry.find(order_id)?;
        self.registry.read(slot).map(|order| (slot, *order))
    }

    fn remove_from_level(&mut self, side: Side, index: usize, quantity: u32) {
        let removed = self.window.sub_quantity(side, index, quantity);
        if removed < u64::from(quantity) {
            self.stats.quantity_clamps += 1;
            debug!(
                ?side,
                price = self.window.price_at(index),
                requested = quantity,
                removed,
                "Level decrement clamped at zero"
            );
        }
    }

    fn refresh_best(&mut self, side: Side, index: usize) {
        self.stage = EngineStage::RefreshBest;
        if self.tracker.refresh(&self.window, side, index) == BestChange::Invalidated {
            self.stats.best_invalidations += 1;
            debug!(?side, "Best price invalidated");
        }
    }

    /// Snapshot of both quotes from the last completed event
    pub fn top_of_book(&self) -> TopOfBook {
        TopOfBook {
            sequence: self.sequence,
            bid: self.tracker.quote(Side::Bid),
            ask: self.tracker.quote(Side::Ask),
        }
    }

    pub fn best_bid(&self) -> Quote {
        self.tracker.quote(Side::Bid)
    }

    pub fn best_ask(&self) -> Quote {
        self.tracker.quote(Side::Ask)
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn stage(&self) -> EngineStage {
        self.stage
    }

    pub fn recovery_mode(&self) -> RecoveryMode {
        self.recovery
    }

    /// Resting order for `order_id`
    pub fn order(&self, order_id: u32) -> Option<OrderRecord> {
        self.registry.get(order_id).copied()
    }

    /// Aggregate quantity at `price`; zero outside the window
    pub fn level_quantity(&self, side: Side, price: u32) -> u64 {
        self.window.quantity_at(side, price)
    }

    pub fn window_base(&self) -> u32 {
        self.window.base()
    }

    pub fn window(&self) -> &PriceWindow {
        &self.window
    }

    pub fn registry(&self) -> &OrderRegistry {
        &self.registry
    }

    pub fn live_orders(&self) -> usize {
        self.registry.len()
    }
}
