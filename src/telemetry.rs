//! Prometheus metrics for the engine loop

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

use crate::error::{EngineError, Result};
use crate::orderbook::EventOutcome;
use crate::parser::EventKind;

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static EVENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("book_engine_events_total", "Events processed by kind and outcome"),
        &["kind", "outcome"],
    )
    .expect("book_engine_events_total");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static MALFORMED_LINES: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("book_engine_malformed_lines_total", "Input lines that failed to parse")
        .expect("book_engine_malformed_lines_total");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static WINDOW_REPOSITIONS: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new(
        "book_engine_window_repositions",
        "Number of times the price window base moved",
    )
    .expect("book_engine_window_repositions");
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

static LIVE_ORDERS: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new("book_engine_live_orders", "Orders resting in the registry")
        .expect("book_engine_live_orders");
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

static EVENT_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    // 50ns .. 100us
    let buckets = vec![5e-8, 1e-7, 2e-7, 5e-7, 1e-6, 2e-6, 5e-6, 1e-5, 2e-5, 5e-5, 1e-4];
    let h = Histogram::with_opts(
        HistogramOpts::new("book_engine_event_latency_seconds", "Per-event processing time")
            .buckets(buckets),
    )
    .expect("book_engine_event_latency_seconds");
    REGISTRY.register(Box::new(h.clone())).ok();
    h
});

/// Force registration so `/metrics` lists every series before the first event
pub fn init() {
    Lazy::force(&EVENTS);
    Lazy::force(&MALFORMED_LINES);
    Lazy::force(&WINDOW_REPOSITIONS);
    Lazy::force(&LIVE_ORDERS);
    Lazy::force(&EVENT_LATENCY);
}

#[inline]
pub fn record_event(kind: EventKind, outcome: EventOutcome, elapsed: Duration) {
    EVENTS
        .with_label_values(&[kind.as_str(), outcome.as_str()])
        .inc();
    EVENT_LATENCY.observe(elapsed.as_secs_f64());
}

#[inline]
pub fn record_malformed_line() {
    MALFORMED_LINES.inc();
}

#[inline]
pub fn set_book_gauges(live_orders: usize, window_repositions: u64) {
    LIVE_ORDERS.set(live_orders as i64);
    WINDOW_REPOSITIONS.set(window_repositions as i64);
}

/// Count recorded for `kind` and `outcome`
pub fn event_count(kind: EventKind, outcome: EventOutcome) -> u64 {
    EVENTS
        .with_label_values(&[kind.as_str(), outcome.as_str()])
        .get()
}

/// Render every registered metric in the text exposition format
pub fn gather() -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| EngineError::SerializationError(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| EngineError::SerializationError(e.to_string()))
}
