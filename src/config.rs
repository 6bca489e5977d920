//! Configuration module for the book engine

use serde::Deserialize;
use std::env;

use crate::error::{EngineError, Result};
use crate::orderbook::{EngineConfig, RecoveryMode};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Maximum number of resting orders
    pub registry_capacity: usize,

    /// Price levels tracked per side
    pub window_size: usize,

    /// Initial lowest price of the window, in ticks
    pub window_base: u32,

    /// What to do when the best level empties
    pub recovery_mode: RecoveryMode,

    /// Path of a JSON-lines event file, or `-` for stdin
    pub event_source: String,

    /// Bound of the producer-to-engine channel
    pub channel_capacity: usize,

    /// Unix socket for forwarding top-of-book frames
    pub ipc_socket_path: Option<String>,

    /// Port of the health/metrics HTTP server
    pub health_port: u16,

    /// Interval of the periodic book status log, in seconds
    pub status_interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let recovery_mode = match env::var("RECOVERY_MODE") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.recovery_mode,
        };

        let config = Self {
            registry_capacity: env_or("REGISTRY_CAPACITY", defaults.registry_capacity),
            window_size: env_or("WINDOW_SIZE", defaults.window_size),
            window_base: env_or("WINDOW_BASE", defaults.window_base),
            recovery_mode,
            event_source: env::var("EVENT_SOURCE").unwrap_or(defaults.event_source),
            channel_capacity: env_or("CHANNEL_CAPACITY", defaults.channel_capacity),
            ipc_socket_path: env::var("IPC_SOCKET_PATH")
                .ok()
                .filter(|path| !path.trim().is_empty()),
            health_port: env_or("HEALTH_PORT", defaults.health_port),
            status_interval_secs: env_or("LOG_STATUS_INTERVAL_SECS", defaults.status_interval_secs),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.registry_capacity == 0 {
            return Err(EngineError::ConfigError(
                "REGISTRY_CAPACITY must be greater than zero".to_string(),
            ));
        }
        if self.window_size == 0 || self.window_size > u32::MAX as usize {
            return Err(EngineError::ConfigError(format!(
                "WINDOW_SIZE must be in 1..={}",
                u32::MAX
            )));
        }
        if self.channel_capacity == 0 {
            return Err(EngineError::ConfigError(
                "CHANNEL_CAPACITY must be greater than zero".to_string(),
            ));
        }
        if self.status_interval_secs == 0 {
            return Err(EngineError::ConfigError(
                "LOG_STATUS_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Parameters for constructing the engine
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            registry_capacity: self.registry_capacity,
            window_size: self.window_size,
            window_base: self.window_base,
            recovery: self.recovery_mode,
        }
    }
}

/// Parse `key` from the environment, falling back to `default` when unset or invalid
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_capacity: 65_536,
            window_size: 1024,
            window_base: 0,
            recovery_mode: RecoveryMode::Lazy,
            event_source: "-".to_string(),
            channel_capacity: 4096,
            ipc_socket_path: None,
            health_port: 9090,
            status_interval_secs: 30,
        }
    }
}
