//! Event feed
//!
//! Any number of producers send events into a bounded channel; a single
//! `FeedRunner` owns the engine and processes them one at a time in arrival
//! order, publishing a snapshot after each.

mod source;

pub use source::{open_source, read_events, ReadSummary};

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::error::Result;
use crate::orderbook::Engine;
use crate::parser::OrderEvent;
use crate::publisher::Publisher;
use crate::telemetry;

/// Single consumer of the event channel
pub struct FeedRunner {
    engine: Engine,
    publisher: Arc<Publisher>,
    rx: mpsc::Receiver<OrderEvent>,
    status_interval: Duration,
}

impl FeedRunner {
    pub fn new(engine: Engine, publisher: Arc<Publisher>, rx: mpsc::Receiver<OrderEvent>) -> Self {
        Self {
            engine,
            publisher,
            rx,
            status_interval: Duration::from_secs(30),
        }
    }

    pub fn with_status_interval(mut self, status_interval: Duration) -> Self {
        self.status_interval = status_interval;
        self
    }

    /// Process events until every sender is dropped, then hand back the engine
    pub async fn run(mut self) -> Result<Engine> {
        info!(
            capacity = self.engine.registry().capacity(),
            window_size = self.engine.window().size(),
            window_base = self.engine.window_base(),
            recovery = %self.engine.recovery_mode(),
            "Starting feed runner"
        );

        let mut status = interval(self.status_interval);
        status.set_missed_tick_behavior(MissedTickBehavior::Delay);
        status.tick().await;

        loop {
            tokio::select! {
                biased;
                event = self.rx.recv() => match event {
                    Some(event) => self.handle(&event).await?,
                    None => break,
                },
                _ = status.tick() => self.log_status(),
            }
        }

        info!(stats = ?self.engine.stats(), "Event feed closed");
        Ok(self.engine)
    }

    async fn handle(&mut self, event: &OrderEvent) -> Result<()> {
        let started = Instant::now();
        let outcome = self.engine.process(event);
        telemetry::record_event(event.kind, outcome, started.elapsed());

        let stats = self.engine.stats();
        telemetry::set_book_gauges(self.engine.live_orders(), stats.window_repositions);

        self.publisher.publish(self.engine.top_of_book()).await
    }

    fn log_status(&self) {
        let top = self.engine.top_of_book();
        let metrics = top.metrics();
        info!(
            sequence = top.sequence,
            bid = ?top.bid.as_option(),
            ask = ?top.ask.as_option(),
            spread_ticks = ?metrics.spread_ticks,
            live_orders = self.engine.live_orders(),
            dropped = self.engine.stats().dropped_table_full,
            window_misses = self.engine.stats().window_misses,
            "Book status"
        );
    }
}
