//! Incremental best bid/ask tracking
//!
//! The tracker only looks at the level touched by the current event. When the
//! current best level empties, a `RecoveryStrategy` chosen at construction
//! decides whether a replacement is searched for.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{PriceWindow, Quote, Side};
use crate::error::EngineError;

/// Finds a replacement best level after the current best empties
#[cfg_attr(test, mockall::automock)]
pub trait RecoveryStrategy {
    /// Index of the new best level on `side`, or `None` to leave the side invalid
    fn recover(&self, window: &PriceWindow, side: Side) -> Option<usize>;
}

/// Leaves the side invalid until a later event touches a qualifying level. O(1).
#[derive(Debug, Clone, Copy, Default)]
pub struct LazyRecovery;

impl RecoveryStrategy for LazyRecovery {
    fn recover(&self, _window: &PriceWindow, _side: Side) -> Option<usize> {
        None
    }
}

/// Scans the window for the next non-empty level. O(window size).
#[derive(Debug, Clone, Copy, Default)]
pub struct EagerRescan;

impl RecoveryStrategy for EagerRescan {
    fn recover(&self, window: &PriceWindow, side: Side) -> Option<usize> {
        let mut indices = 0..window.size();
        let has_qty = |index: &usize| window.quantity(side, *index) > 0;
        match side {
            Side::Bid => indices.rev().find(has_qty),
            Side::Ask => indices.find(has_qty),
        }
    }
}

/// Recovery policy selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryMode {
    #[default]
    Lazy,
    Eager,
}

impl RecoveryMode {
    pub fn strategy(self) -> Box<dyn RecoveryStrategy + Send> {
        match self {
            RecoveryMode::Lazy => Box::new(LazyRecovery),
            RecoveryMode::Eager => Box::new(EagerRescan),
        }
    }
}

impl FromStr for RecoveryMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lazy" => Ok(RecoveryMode::Lazy),
            "eager" => Ok(RecoveryMode::Eager),
            other => Err(EngineError::ConfigError(format!(
                "unknown recovery mode '{other}', expected 'lazy' or 'eager'"
            ))),
        }
    }
}

impl fmt::Display for RecoveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryMode::Lazy => write!(f, "lazy"),
            RecoveryMode::Eager => write!(f, "eager"),
        }
    }
}

/// Effect of a refresh on one side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BestChange {
    Unchanged,
    /// A different level became the best
    Adopted,
    /// The best level kept its index but its quantity changed
    QuantityChanged,
    /// The best level emptied and the strategy found a replacement
    Recovered,
    /// The best level emptied and no replacement was found
    Invalidated,
}

#[derive(Debug, Clone, Copy, Default)]
struct BestLevel {
    index: usize,
    price: u32,
    quantity: u64,
    valid: bool,
}

impl BestLevel {
    fn quote(&self) -> Quote {
        Quote {
            price: self.price,
            quantity: self.quantity,
            valid: self.valid,
        }
    }
}

/// Best bid and ask within the window
pub struct BestPriceTracker {
    bid: BestLevel,
    ask: BestLevel,
    strategy: Box<dyn RecoveryStrategy + Send>,
}

impl fmt::Debug for BestPriceTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BestPriceTracker")
            .field("bid", &self.bid)
            .field("ask", &self.ask)
            .finish_non_exhaustive()
    }
}

/// Whether `candidate` is a better level than `current` on `side`
#[inline]
fn outranks(side: Side, candidate: usize, current: usize) -> bool {
    match side {
        Side::Bid => candidate > current,
        Side::Ask => candidate < current,
    }
}

impl BestPriceTracker {
    /// Both sides start invalid
    pub fn new(strategy: Box<dyn RecoveryStrategy + Send>) -> Self {
        Self {
            bid: BestLevel::default(),
            ask: BestLevel::default(),
            strategy,
        }
    }

    pub fn with_mode(mode: RecoveryMode) -> Self {
        Self::new(mode.strategy())
    }

    #[inline]
    fn best_mut(&mut self, side: Side) -> &mut BestLevel {
        match side {
            Side::Bid => &mut self.bid,
            Side::Ask => &mut self.ask,
        }
    }

    #[inline]
    fn best(&self, side: Side) -> &BestLevel {
        match side {
            Side::Bid => &self.bid,
            Side::Ask => &self.ask,
        }
    }

    pub fn quote(&self, side: Side) -> Quote {
        self.best(side).quote()
    }

    /// Window index of the current best level, when valid
    pub fn best_index(&self, side: Side) -> Option<usize> {
        let best = self.best(side);
        best.valid.then_some(best.index)
    }

    /// Update `side` after the level at `touched` was mutated
    pub fn refresh(&mut self, window: &PriceWindow, side: Side, touched: usize) -> BestChange {
        let quantity = window.quantity(side, touched);
        let best = *self.best(side);

        if best.valid && best.index == touched {
            if quantity > 0 {
                if quantity == best.quantity {
                    return BestChange::Unchanged;
                }
                self.best_mut(side).quantity = quantity;
                return BestChange::QuantityChanged;
            }
            return self.recover(window, side);
        }

        if quantity > 0 && (!best.valid || outranks(side, touched, best.index)) {
            self.adopt(window, side, touched);
            return BestChange::Adopted;
        }

        BestChange::Unchanged
    }

    fn recover(&mut self, window: &PriceWindow, side: Side) -> BestChange {
        match self.strategy.recover(window, side) {
            Some(index) if index < window.size() && window.quantity(side, index) > 0 => {
                self.adopt(window, side, index);
                BestChange::Recovered
            }
            _ => {
                let best = self.best_mut(side);
                best.valid = false;
                best.quantity = 0;
                BestChange::Invalidated
            }
        }
    }

    fn adopt(&mut self, window: &PriceWindow, side: Side, index: usize) {
        *self.best_mut(side) = BestLevel {
            index,
            price: window.price_at(index),
            quantity: window.quantity(side, index),
            valid: true,
        };
    }

    /// Follow the window after its base moved
    ///
    /// A best price still inside the window keeps its price and level and only
    /// gets a new index. A best price that was evicted goes through the
    /// recovery strategy. Returns the change for the bid side, then the ask.
    pub fn rebase(&mut self, window: &PriceWindow) -> [BestChange; 2] {
        [Side::Bid, Side::Ask].map(|side| {
            let best = *self.best(side);
            if !best.valid {
                BestChange::Unchanged
            } else if window.contains(best.price) {
                self.best_mut(side).index = (best.price - window.base()) as usize;
                BestChange::Unchanged
            } else {
                self.recover(window, side)
            }
        })
    }
}
