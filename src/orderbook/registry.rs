//! Bounded order registry
//!
//! Open addressing with linear probing over a fixed array of slots. The
//! table never grows; capacity is chosen at construction. Removal uses
//! backward-shift deletion so probe chains of colliding ids stay intact
//! without tombstones.

use super::OrderRecord;
use crate::error::{EngineError, Result};

/// Position of a slot in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRef(usize);

impl SlotRef {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Result of `find_or_allocate`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// The id is already present in this slot
    FoundExisting(SlotRef),
    /// The id is absent; this empty slot is where it belongs
    AllocatedNew(SlotRef),
    /// Every slot was probed without a match or an empty slot
    TableFull,
}

/// Fixed-capacity map from order id to order record
#[derive(Debug, Clone)]
pub struct OrderRegistry {
    slots: Vec<OrderRecord>,
    len: usize,
}

impl OrderRegistry {
    /// Create a registry with `capacity` slots
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(EngineError::InvalidParameter(
                "registry capacity must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            slots: vec![OrderRecord::default(); capacity],
            len: 0,
        })
    }

    /// Home slot of an order id: high bits folded into low bits
    #[inline]
    fn home(&self, order_id: u32) -> usize {
        let folded = order_id ^ (order_id >> 16);
        folded as usize % self.slots.len()
    }

    #[inline]
    fn next(&self, index: usize) -> usize {
        (index + 1) % self.slots.len()
    }

    /// Probe for `order_id`, stopping at the first match or the first empty slot
    ///
    /// An `AllocatedNew` slot is only reserved in the sense that it is where
    /// the id belongs; nothing is stored until `write` is called.
    pub fn find_or_allocate(&self, order_id: u32) -> Probe {
        let mut index = self.home(order_id);
        for _ in 0..self.slots.len() {
            let slot = &self.slots[index];
            if !slot.present {
                return Probe::AllocatedNew(SlotRef(index));
            }
            if slot.order_id == order_id {
                return Probe::FoundExisting(SlotRef(index));
            }
            index = self.next(index);
        }
        Probe::TableFull
    }

    /// Lookup without allocation
    pub fn find(&self, order_id: u32) -> Option<SlotRef> {
        match self.find_or_allocate(order_id) {
            Probe::FoundExisting(slot) => Some(slot),
            _ => None,
        }
    }

    /// Record stored in `slot`, if the slot is occupied
    pub fn read(&self, slot: SlotRef) -> Option<&OrderRecord> {
        self.slots.get(slot.0).filter(|record| record.present)
    }

    /// Store `record` in `slot`
    ///
    /// Writing a record whose `present` flag is cleared removes the occupant.
    pub fn write(&mut self, slot: SlotRef, record: OrderRecord) {
        if !record.present {
            self.remove(slot);
            return;
        }

        let target = &mut self.slots[slot.0];
        if !target.present {
            self.len += 1;
        }
        *target = record;
    }

    /// Clear `slot` and close the gap it leaves in its probe chain
    ///
    /// Any `SlotRef` other than the returned record's is stale afterwards.
    pub fn remove(&mut self, slot: SlotRef) -> Option<OrderRecord> {
        let mut hole = slot.0;
        let removed = self.slots[hole];
        if !removed.present {
            return None;
        }

        self.slots[hole] = OrderRecord::default();
        self.len -= 1;

        // Terminates: the hole itself is always empty
        let mut cursor = self.next(hole);
        while self.slots[cursor].present {
            let home = self.home(self.slots[cursor].order_id);
            if !cyclic_between(home, hole, cursor) {
                self.slots[hole] = self.slots[cursor];
                self.slots[cursor] = OrderRecord::default();
                hole = cursor;
            }
            cursor = self.next(cursor);
        }

        Some(removed)
    }

    /// Record for `order_id`, if present
    pub fn get(&self, order_id: u32) -> Option<&OrderRecord> {
        self.find(order_id).and_then(|slot| self.read(slot))
    }

    /// Iterate over present records in slot order
    pub fn iter(&self) -> impl Iterator<Item = &OrderRecord> {
        self.slots.iter().filter(|record| record.present)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// True when `x` lies in the cyclic interval `(lo, hi]`
#[inline]
fn cyclic_between(x: usize, lo: usize, hi: usize) -> bool {
    if lo < hi {
        lo < x && x <= hi
    } else {
        x > lo || x <= hi
    }
}
