//! Top-of-book metrics calculation

use serde::{Deserialize, Serialize};

use super::TopOfBook;

/// Metrics derived from a top-of-book snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BookMetrics {
    /// Mid price in ticks (average of best bid and ask)
    pub mid_price: Option<f64>,

    /// Ask minus bid, in ticks
    pub spread_ticks: Option<i64>,

    /// (bid_qty - ask_qty) / (bid_qty + ask_qty) at the top of book
    pub imbalance: Option<f64>,

    /// Quantity at the best bid, zero when the bid is invalid
    pub bid_quantity: u64,

    /// Quantity at the best ask, zero when the ask is invalid
    pub ask_quantity: u64,
}

impl BookMetrics {
    pub fn from_top(top: &TopOfBook) -> Self {
        let bid = top.bid.as_option();
        let ask = top.ask.as_option();

        let (mid_price, spread_ticks, imbalance) = match (bid, ask) {
            (Some((bid_px, bid_qty)), Some((ask_px, ask_qty))) => {
                let mid = (f64::from(bid_px) + f64::from(ask_px)) / 2.0;
                let spread = i64::from(ask_px) - i64::from(bid_px);
                let total = bid_qty + ask_qty;
                let imbalance = (total > 0)
                    .then(|| (bid_qty as f64 - ask_qty as f64) / total as f64);
                (Some(mid), Some(spread), imbalance)
            }
            _ => (None, None, None),
        };

        Self {
            mid_price,
            spread_ticks,
            imbalance,
            bid_quantity: bid.map_or(0, |(_, qty)| qty),
            ask_quantity: ask.map_or(0, |(_, qty)| qty),
        }
    }

    /// Both sides are quoted
    pub fn is_two_sided(&self) -> bool {
        self.mid_price.is_some()
    }

    /// bid_quantity / ask_quantity
    pub fn quantity_ratio(&self) -> Option<f64> {
        if self.ask_quantity > 0 {
            Some(self.bid_quantity as f64 / self.ask_quantity as f64)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::Quote;

    fn quote(price: u32, quantity: u64) -> Quote {
        Quote {
            price,
            quantity,
            valid: true,
        }
    }

    #[test]
    fn test_two_sided_metrics() {
        let top = TopOfBook {
            sequence: 1,
            bid: quote(100, 30),
            ask: quote(103, 10),
        };

        let metrics = top.metrics();
        assert_eq!(metrics.mid_price, Some(101.5));
        assert_eq!(metrics.spread_ticks, Some(3));
        assert_eq!(metrics.imbalance, Some(0.5));
        assert_eq!(metrics.quantity_ratio(), Some(3.0));
        assert!(metrics.is_two_sided());
    }

    #[test]
    fn test_one_sided_book() {
        let top = TopOfBook {
            sequence: 1,
            bid: quote(100, 30),
            ask: Quote::default(),
        };

        let metrics = BookMetrics::from_top(&top);
        assert!(!metrics.is_two_sided());
        assert_eq!(metrics.bid_quantity, 30);
        assert_eq!(metrics.quantity_ratio(), None);
    }
}
