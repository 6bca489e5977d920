//! ORPflow HFT - Top-of-Book Engine
//!
//! Reads normalized order events, keeps best bid/ask current, and publishes
//! snapshots to the health server and an optional IPC consumer.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, routing::get, Json, Router};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use book_engine::feed::{open_source, read_events};
use book_engine::{telemetry, AppState, Config, Engine, FeedRunner, Publisher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Starting ORPflow top-of-book engine");

    // Load configuration
    let config = Arc::new(Config::load()?);
    info!(
        registry_capacity = config.registry_capacity,
        window_size = config.window_size,
        recovery = %config.recovery_mode,
        source = %config.event_source,
        "Configuration loaded"
    );

    telemetry::init();
    let engine = Engine::new(config.engine_config())?;

    let publisher = Arc::new(match &config.ipc_socket_path {
        Some(path) => Publisher::with_ipc(path).await,
        None => Publisher::new(),
    });

    let state = Arc::new(AppState {
        top_of_book: publisher.subscribe(),
        config: config.clone(),
    });

    // Start health check server
    let health_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_state).await {
            warn!(error = %e, "Health server error");
        }
    });

    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let runner = FeedRunner::new(engine, publisher, rx)
        .with_status_interval(Duration::from_secs(config.status_interval_secs));
    let engine_task = tokio::spawn(runner.run());

    let reader = open_source(&config.event_source).await?;
    let summary = read_events(reader, &tx).await?;
    drop(tx);
    info!(
        lines = summary.lines,
        events = summary.events,
        malformed = summary.malformed,
        "Event source finished"
    );

    let engine = engine_task.await??;
    let top = engine.top_of_book();
    info!(
        bid = ?top.bid.as_option(),
        ask = ?top.ask.as_option(),
        stats = ?engine.stats(),
        "Engine stopped"
    );

    Ok(())
}

/// Start HTTP server for health checks and metrics
async fn start_health_server(state: Arc<AppState>) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/top", get(top_of_book))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.health_port));
    info!(addr = %addr, "Starting health check server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let top = *state.top_of_book.borrow();
    Json(serde_json::json!({
        "status": "healthy",
        "component": "book-engine",
        "sequence": top.sequence,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn top_of_book(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let top = *state.top_of_book.borrow();
    Json(serde_json::json!({
        "top": top,
        "metrics": top.metrics(),
    }))
}

async fn metrics() -> String {
    telemetry::gather().unwrap_or_else(|e| format!("# failed to encode metrics: {e}\n"))
}
