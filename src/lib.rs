//! ORPflow HFT - Top-of-Book Engine Library
//!
//! This crate maintains the best bid and best ask for a single instrument from
//! a stream of normalized add, cancel and execute events, with bounded work
//! per event.

use std::sync::Arc;
use tokio::sync::watch;

pub mod config;
pub mod error;
pub mod feed;
pub mod orderbook;
pub mod parser;
pub mod publisher;
pub mod telemetry;

pub use config::Config;
pub use error::{EngineError, Result};
pub use feed::FeedRunner;
pub use orderbook::{
    BookMetrics, Engine, EngineConfig, EngineStats, EventOutcome, Quote, RecoveryMode, Side,
    TopOfBook,
};
pub use parser::{EventKind, OrderEvent};
pub use publisher::Publisher;

/// Application state shared with the health server
pub struct AppState {
    pub top_of_book: watch::Receiver<TopOfBook>,
    pub config: Arc<Config>,
}
