//! Application configuration.
//!
//! Loaded from TOML, then overridden from the environment:
//!
//! | variable | field |
//! |---|---|
//! | `PORT` | `gateway.port` |
//! | `APP_ENV` | `environment` |
//! | `CORS_ORIGIN` | `gateway.cors_origin` |
//! | `MAX_PAIRS` | `symbols.max_pairs` |
//! | `WS_HEARTBEAT_INTERVAL` | `feed.heartbeat_interval_ms` and `gateway.heartbeat_interval_ms` |

use crate::error::{AppError, AppResult};
use medtrack_gateway::GatewayConfig;
use medtrack_registry::SelectionPolicy;
use medtrack_ws::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

const ENVIRONMENTS: [&str; 3] = ["development", "production", "test"];

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// One of `development`, `production`, `test`.
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Bound on graceful shutdown before the process gives up.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
    /// Periodic statistics log interval.
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub symbols: SymbolsConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Upstream feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Combined-stream base URL; the stream list is appended at startup.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Reconnect cycles before the feed gives up (0 = unlimited).
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Capacity of the raw frame channel and the feed event bus.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Tracked-symbol selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolsConfig {
    #[serde(default = "default_exchange_info_url")]
    pub exchange_info_url: String,
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,
    #[serde(default = "default_max_pairs")]
    pub max_pairs: usize,
    /// Explicit pairs; non-empty skips discovery.
    #[serde(default)]
    pub pairs: Vec<String>,
    /// Fallback when discovery fails.
    #[serde(default = "default_pairs")]
    pub defaults: Vec<String>,
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

fn default_stats_interval_secs() -> u64 {
    300
}

fn default_ws_url() -> String {
    "wss://stream.binance.com:9443/stream".to_string()
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_base_delay_ms() -> u64 {
    1_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_channel_capacity() -> usize {
    4096
}

fn default_exchange_info_url() -> String {
    "https://api.binance.com/api/v3/exchangeInfo".to_string()
}

fn default_quote_asset() -> String {
    "USDT".to_string()
}

fn default_max_pairs() -> usize {
    10
}

fn default_pairs() -> Vec<String> {
    [
        "btcusdt", "ethusdt", "bnbusdt", "adausdt", "dogeusdt", "xrpusdt", "dotusdt", "uniusdt",
        "linkusdt", "maticusdt",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            stats_interval_secs: default_stats_interval_secs(),
            feed: FeedConfig::default(),
            symbols: SymbolsConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for SymbolsConfig {
    fn default() -> Self {
        Self {
            exchange_info_url: default_exchange_info_url(),
            quote_asset: default_quote_asset(),
            max_pairs: default_max_pairs(),
            pairs: Vec::new(),
            defaults: default_pairs(),
        }
    }
}

impl FeedConfig {
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            url: self.ws_url.clone(),
            max_reconnect_attempts: self.max_reconnect_attempts,
            reconnect_base_delay_ms: self.reconnect_base_delay_ms,
            reconnect_max_delay_ms: self.reconnect_max_delay_ms,
            heartbeat_interval_ms: self.heartbeat_interval_ms,
        }
    }
}

impl SymbolsConfig {
    pub fn selection_policy(&self) -> SelectionPolicy {
        SelectionPolicy {
            quote_asset: self.quote_asset.clone(),
            max_pairs: self.max_pairs,
            pairs: self.pairs.clone(),
            defaults: self.defaults.clone(),
        }
    }
}

fn parse_var<T: FromStr>(name: &str, raw: &str) -> AppResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{name} has an invalid value: {raw:?}")))
}

impl AppConfig {
    /// Load configuration from file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// File (or defaults when it does not exist), then environment, then validation.
    pub fn load(path: &str) -> AppResult<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            info!(path, "Config file not found, using defaults");
            Self::default()
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup` (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("PORT") {
            self.gateway.port = parse_var("PORT", &raw)?;
        }
        if let Some(raw) = lookup("APP_ENV") {
            self.environment = raw.trim().to_lowercase();
        }
        if let Some(raw) = lookup("CORS_ORIGIN") {
            self.gateway.cors_origin = raw.trim().to_string();
        }
        if let Some(raw) = lookup("MAX_PAIRS") {
            self.symbols.max_pairs = parse_var("MAX_PAIRS", &raw)?;
        }
        if let Some(raw) = lookup("WS_HEARTBEAT_INTERVAL") {
            let interval: u64 = parse_var("WS_HEARTBEAT_INTERVAL", &raw)?;
            self.feed.heartbeat_interval_ms = interval;
            self.gateway.heartbeat_interval_ms = interval;
        }
        Ok(())
    }

    pub fn validate(&self) -> AppResult<()> {
        if !ENVIRONMENTS.contains(&self.environment.as_str()) {
            return Err(AppError::Config(format!(
                "environment must be one of {ENVIRONMENTS:?}, got {:?}",
                self.environment
            )));
        }
        if self.symbols.max_pairs == 0 {
            return Err(AppError::Config("symbols.max_pairs must be > 0".to_string()));
        }
        if self.feed.heartbeat_interval_ms == 0 || self.gateway.heartbeat_interval_ms == 0 {
            return Err(AppError::Config(
                "heartbeat intervals must be > 0".to_string(),
            ));
        }
        if self.feed.reconnect_base_delay_ms > self.feed.reconnect_max_delay_ms {
            return Err(AppError::Config(
                "feed.reconnect_base_delay_ms must not exceed feed.reconnect_max_delay_ms"
                    .to_string(),
            ));
        }
        if self.feed.channel_capacity == 0
            || self.gateway.outbound_queue_capacity == 0
            || self.gateway.max_connections == 0
        {
            return Err(AppError::Config(
                "channel, queue and connection limits must be > 0".to_string(),
            ));
        }
        if self.stats_interval_secs == 0 {
            return Err(AppError::Config("stats_interval_secs must be > 0".to_string()));
        }
        Ok(())
    }
}
