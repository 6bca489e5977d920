//! Price-level window
//!
//! Aggregate quantity per price for the contiguous range `[base, base + size)`.
//! When a price falls outside the range the base slides just far enough to
//! include it. Each price owns the slot `price % size`, so levels that stay in
//! range keep their contents when the base moves and nothing is copied.
//! Levels that leave the range are evicted: their slot is zeroed and its
//! generation bumped, which tells the engine that orders credited there no
//! longer have a level to debit.

use super::Side;
use crate::error::{EngineError, Result};

/// Base movement caused by an incoming price
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reposition {
    pub old_base: u32,
    pub new_base: u32,
    /// Number of prices that left the window
    pub evicted: usize,
}

/// Bounded, movable window of per-price aggregate quantities
#[derive(Debug, Clone)]
pub struct PriceWindow {
    base: u32,
    bids: Vec<u64>,
    asks: Vec<u64>,
    generations: Vec<u32>,
}

impl PriceWindow {
    /// Create a zeroed window of `size` levels per side starting at `base`
    pub fn new(base: u32, size: usize) -> Result<Self> {
        if size == 0 || size > u32::MAX as usize {
            return Err(EngineError::InvalidParameter(format!(
                "window size must be in 1..={}, got {size}",
                u32::MAX
            )));
        }
        if u64::from(base) + size as u64 - 1 > u64::from(u32::MAX) {
            return Err(EngineError::InvalidParameter(format!(
                "window [{base}, {base} + {size}) does not fit in u32 prices"
            )));
        }

        Ok(Self {
            base,
            bids: vec![0; size],
            asks: vec![0; size],
            generations: vec![0; size],
        })
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn size(&self) -> usize {
        self.bids.len()
    }

    /// Whether `price` falls inside `[base, base + size)`
    pub fn contains(&self, price: u32) -> bool {
        let price = u64::from(price);
        let base = u64::from(self.base);
        price >= base && price < base + self.size() as u64
    }

    #[inline]
    fn slot(&self, price: u64) -> usize {
        (price % self.size() as u64) as usize
    }

    #[inline]
    fn slot_of_index(&self, index: usize) -> usize {
        self.slot(u64::from(self.base) + index as u64)
    }

    fn evict(&mut self, slot: usize) {
        self.bids[slot] = 0;
        self.asks[slot] = 0;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
    }

    /// Slide the base so that `price` is inside the window
    ///
    /// Prices leaving the range are evicted. At most `size` slots are touched.
    pub fn reposition_if_needed(&mut self, price: u32) -> Option<Reposition> {
        let old_base = self.base;
        let size = self.size() as u64;

        let new_base = if price < old_base {
            price
        } else if u64::from(price) >= u64::from(old_base) + size {
            // price >= size here, so the new base cannot underflow
            (u64::from(price) - size + 1) as u32
        } else {
            return None;
        };

        let shift = u64::from(old_base.abs_diff(new_base));
        let evicted = if shift >= size {
            for slot in 0..self.size() {
                self.evict(slot);
            }
            size
        } else {
            let (from, to) = if new_base > old_base {
                (u64::from(old_base), u64::from(new_base))
            } else {
                (u64::from(new_base) + size, u64::from(old_base) + size)
            };
            for price in from..to {
                self.evict(self.slot(price));
            }
            shift
        };
        self.base = new_base;

        Some(Reposition {
            old_base,
            new_base,
            evicted: evicted as usize,
        })
    }

    /// Clipped index of `price` in `[0, size - 1]`
    #[inline]
    pub fn index_of(&self, price: u32) -> usize {
        let offset = price.saturating_sub(self.base) as usize;
        offset.min(self.size() - 1)
    }

    /// Price currently represented by `index`
    #[inline]
    pub fn price_at(&self, index: usize) -> u32 {
        self.base.saturating_add(index as u32)
    }

    /// Eviction count of the slot owned by `price`
    #[inline]
    pub fn generation(&self, price: u32) -> u32 {
        self.generations[self.slot(u64::from(price))]
    }

    /// Whether quantity credited to `price` under `generation` is still held
    #[inline]
    pub fn holds(&self, price: u32, generation: u32) -> bool {
        self.contains(price) && self.generation(price) == generation
    }

    #[inline]
    fn levels(&self, side: Side) -> &[u64] {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    #[inline]
    fn levels_mut(&mut self, side: Side) -> &mut [u64] {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    /// Aggregate quantity at `index`
    #[inline]
    pub fn quantity(&self, side: Side, index: usize) -> u64 {
        self.levels(side)[self.slot_of_index(index)]
    }

    /// Aggregate quantity at `price`; zero outside the window
    pub fn quantity_at(&self, side: Side, price: u32) -> u64 {
        if !self.contains(price) {
            return 0;
        }
        self.levels(side)[self.slot(u64::from(price))]
    }

    /// Add `delta` to the level and return the new aggregate
    #[inline]
    pub fn add_quantity(&mut self, side: Side, index: usize, delta: u32) -> u64 {
        let slot = self.slot_of_index(index);
        let level = &mut self.levels_mut(side)[slot];
        *level = level.saturating_add(u64::from(delta));
        *level
    }

    /// Subtract up to `delta` from the level, never below zero
    ///
    /// Returns the amount actually removed.
    #[inline]
    pub fn sub_quantity(&mut self, side: Side, index: usize, delta: u32) -> u64 {
        let slot = self.slot_of_index(index);
        let level = &mut self.levels_mut(side)[slot];
        let removed = (*level).min(u64::from(delta));
        *level -= removed;
        removed
    }

    /// Non-empty levels as `(price, quantity)`, lowest price first
    pub fn iter_levels(&self, side: Side) -> impl Iterator<Item = (u32, u64)> + '_ {
        (0..self.size())
            .map(move |index| (self.price_at(index), self.quantity(side, index)))
            .filter(|(_, qty)| *qty > 0)
    }

    /// Sum of every level on `side`
    pub fn total_quantity(&self, side: Side) -> u64 {
        self.levels(side).iter().sum()
    }
}
