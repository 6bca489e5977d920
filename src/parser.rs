//! Parser module for normalized order events
//!
//! The upstream normalizer has already decoded the wire protocol; each input
//! line is one JSON object carrying kind, side, order id, price and quantity.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::orderbook::Side;

/// Kind of book mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Add,
    Cancel,
    Execute,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Add => "add",
            EventKind::Cancel => "cancel",
            EventKind::Execute => "execute",
        }
    }
}

/// Normalized order event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEvent {
    /// Event kind
    #[serde(alias = "k")]
    pub kind: EventKind,

    /// Side; only meaningful for adds
    #[serde(alias = "s", default)]
    pub side: Side,

    /// Order identifier
    #[serde(alias = "id")]
    pub order_id: u32,

    /// Price in ticks; only meaningful for adds
    #[serde(alias = "px", default)]
    pub price: u32,

    /// Quantity; ignored for cancels
    #[serde(alias = "qty", default)]
    pub quantity: u32,
}

impl OrderEvent {
    pub fn add(order_id: u32, side: Side, price: u32, quantity: u32) -> Self {
        Self {
            kind: EventKind::Add,
            side,
            order_id,
            price,
            quantity,
        }
    }

    pub fn cancel(order_id: u32) -> Self {
        Self {
            kind: EventKind::Cancel,
            side: Side::default(),
            order_id,
            price: 0,
            quantity: 0,
        }
    }

    pub fn execute(order_id: u32, quantity: u32) -> Self {
        Self {
            kind: EventKind::Execute,
            side: Side::default(),
            order_id,
            price: 0,
            quantity,
        }
    }

    /// Parse one input line
    ///
    /// Blank lines and lines starting with `#` yield `None`.
    pub fn parse_line(raw: &str) -> Result<Option<Self>> {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let event = serde_json::from_str::<OrderEvent>(line)?;
        Ok(Some(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add() {
        let raw = r#"{"kind": "add", "side": "ask", "order_id": 7, "price": 10050, "quantity": 25}"#;

        let event = OrderEvent::parse_line(raw).unwrap().unwrap();
        assert_eq!(event, OrderEvent::add(7, Side::Ask, 10050, 25));
    }

    #[test]
    fn test_parse_short_keys() {
        let raw = r#"{"k": "execute", "id": 9, "qty": 3}"#;

        let event = OrderEvent::parse_line(raw).unwrap().unwrap();
        assert_eq!(event.kind, EventKind::Execute);
        assert_eq!(event.order_id, 9);
        assert_eq!(event.quantity, 3);
    }

    #[test]
    fn test_parse_cancel_without_price() {
        let event = OrderEvent::parse_line(r#"{"kind":"cancel","order_id":1}"#)
            .unwrap()
            .unwrap();
        assert_eq!(event, OrderEvent::cancel(1));
    }

    #[test]
    fn test_skip_blank_and_comment_lines() {
        assert!(OrderEvent::parse_line("   ").unwrap().is_none());
        assert!(OrderEvent::parse_line("# replay header").unwrap().is_none());
    }

    #[test]
    fn test_reject_unknown_kind() {
        let raw = r#"{"kind": "modify", "order_id": 1}"#;
        assert!(OrderEvent::parse_line(raw).is_err());
    }

    #[test]
    fn test_reject_negative_price() {
        let raw = r#"{"kind": "add", "side": "bid", "order_id": 1, "price": -5, "quantity": 1}"#;
        assert!(OrderEvent::parse_line(raw).is_err());
    }
}
