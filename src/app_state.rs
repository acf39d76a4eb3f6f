// =============================================================================
// Central Application State — MintFeed Relay
// =============================================================================
//
// Shared handle threaded through the axum router. The broker carries all the
// mutable per-mint state and manages its own interior locking; this struct
// just ties it to the immutable startup configuration and the process start
// time for uptime reporting.
// =============================================================================

use std::sync::Arc;
use std::time::Instant;

use crate::broker::FeedBroker;
use crate::config::ServiceConfig;

/// Application state shared across all request handlers via `Arc<AppState>`.
pub struct AppState {
    /// Configuration as resolved at startup (file + env overrides).
    pub config: ServiceConfig,
    /// The event-to-broadcast pipeline and all per-mint state.
    pub broker: Arc<FeedBroker>,
    /// Instant when the relay was started. Used for uptime calculations.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: ServiceConfig, broker: Arc<FeedBroker>) -> Self {
        Self {
            config,
            broker,
            start_time: Instant::now(),
        }
    }

    /// Whole seconds since the relay started.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
