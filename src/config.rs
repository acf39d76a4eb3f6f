// =============================================================================
// Service Configuration — relay tunables loaded at startup
// =============================================================================
//
// Every knob the relay exposes lives here: where to bind, which upstream feed
// to consume, and the retention / throttle limits that keep memory bounded.
//
// All fields carry `#[serde(default)]` so that adding new fields never breaks
// loading an older config file. The config is read once at startup; there is
// no hot reload -- restart the service to apply changes.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_upstream_url() -> String {
    "wss://pumpportal.fun/api/data".to_string()
}

fn default_throttle_ms() -> i64 {
    5_000
}

fn default_max_history_points() -> usize {
    500
}

fn default_max_candles() -> usize {
    500
}

fn default_max_tracked_mints() -> usize {
    200
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

// =============================================================================
// ServiceConfig
// =============================================================================

/// Top-level configuration for the mintfeed relay.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    // --- Network ---------------------------------------------------------

    /// Address the HTTP/WebSocket server binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// URL of the upstream trade-event push feed.
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,

    /// Delay between upstream reconnect attempts, in seconds.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    // --- Throttling & retention ------------------------------------------

    /// Minimum gap between market-data fetches for the same mint, in
    /// milliseconds. Trade events arriving inside the window are dropped.
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: i64,

    /// Maximum retained price points per mint.
    #[serde(default = "default_max_history_points")]
    pub max_history_points: usize,

    /// Maximum retained candles per (mint, timeframe) pair.
    #[serde(default = "default_max_candles")]
    pub max_candles: usize,

    /// Maximum number of mints with retained history. Exceeding this evicts
    /// the earliest-tracked mint wholesale (FIFO, not LRU).
    #[serde(default = "default_max_tracked_mints")]
    pub max_tracked_mints: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            upstream_url: default_upstream_url(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            throttle_ms: default_throttle_ms(),
            max_history_points: default_max_history_points(),
            max_candles: default_max_candles(),
            max_tracked_mints: default_max_tracked_mints(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        info!(
            path = %path.display(),
            bind_addr = %config.bind_addr,
            upstream = %config.upstream_url,
            "config loaded"
        );

        Ok(config)
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = ServiceConfig::default();
        assert_eq!(cfg.bind_addr, "0.0.0.0:3000");
        assert_eq!(cfg.upstream_url, "wss://pumpportal.fun/api/data");
        assert_eq!(cfg.reconnect_delay_secs, 5);
        assert_eq!(cfg.throttle_ms, 5_000);
        assert_eq!(cfg.max_history_points, 500);
        assert_eq!(cfg.max_candles, 500);
        assert_eq!(cfg.max_tracked_mints, 200);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: ServiceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:3000");
        assert_eq!(cfg.throttle_ms, 5_000);
        assert_eq!(cfg.max_tracked_mints, 200);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "bind_addr": "127.0.0.1:8080", "throttle_ms": 1000 }"#;
        let cfg: ServiceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:8080");
        assert_eq!(cfg.throttle_ms, 1000);
        assert_eq!(cfg.max_history_points, 500);
        assert_eq!(cfg.reconnect_delay_secs, 5);
    }

    #[test]
    fn roundtrip_serialisation() {
        let cfg = ServiceConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let cfg2: ServiceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.bind_addr, cfg2.bind_addr);
        assert_eq!(cfg.upstream_url, cfg2.upstream_url);
        assert_eq!(cfg.max_candles, cfg2.max_candles);
    }
}
