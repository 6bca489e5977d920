//! Order book module
//!
//! Maintains best bid/ask for a single instrument from add, cancel and
//! execute events, using a bounded order registry and a clipped window of
//! price levels.

mod engine;
mod metrics;
mod registry;
mod tracker;
mod window;

pub use engine::{Engine, EngineConfig, EngineStage, EngineStats, EventOutcome};
pub use metrics::BookMetrics;
pub use registry::{OrderRegistry, Probe, SlotRef};
pub use tracker::{
    BestChange, BestPriceTracker, EagerRescan, LazyRecovery, RecoveryMode, RecoveryStrategy,
};
pub use window::{PriceWindow, Reposition};

use serde::{Deserialize, Serialize};

/// Side of the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Bid,
    Ask,
}

/// A resting order as tracked by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrderRecord {
    pub order_id: u32,
    pub side: Side,
    /// Price in ticks
    pub price: u32,
    /// Remaining quantity
    pub quantity: u32,
    /// Generation of the price level the quantity was credited to
    pub generation: u32,
    /// Cleared when the order is cancelled or fully filled
    pub present: bool,
}

impl OrderRecord {
    pub fn new(order_id: u32, side: Side, price: u32, quantity: u32) -> Self {
        Self {
            order_id,
            side,
            price,
            quantity,
            generation: 0,
            present: true,
        }
    }
}

/// Best price on one side, as published to readers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Quote {
    pub price: u32,
    pub quantity: u64,
    pub valid: bool,
}

impl Quote {
    /// `(price, quantity)` when the quote is valid
    pub fn as_option(&self) -> Option<(u32, u64)> {
        self.valid.then_some((self.price, self.quantity))
    }
}

/// Top-of-book snapshot taken after a completed event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TopOfBook {
    /// Number of events completed when the snapshot was taken
    pub sequence: u64,
    pub bid: Quote,
    pub ask: Quote,
}

impl TopOfBook {
    pub fn metrics(&self) -> BookMetrics {
        BookMetrics::from_top(self)
    }
}
