// =============================================================================
// MintFeed Relay — Main Entry Point
// =============================================================================
//
// Real-time market data for pump.fun mints: one upstream PumpPortal WebSocket
// in, enriched coin updates fanned out to browser clients over `/ws`.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod broker;
mod config;
mod market_data;
mod pumpfun;
mod pumpportal;
mod registry;
mod types;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::broker::FeedBroker;
use crate::config::ServiceConfig;
use crate::pumpfun::PumpFunClient;
use crate::pumpportal::PumpPortalBridge;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        MintFeed Relay — Starting Up                      ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let mut config = ServiceConfig::load("mintfeed.json").unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        ServiceConfig::default()
    });

    // Env overrides for containerised deployments.
    if let Ok(addr) = std::env::var("MINTFEED_BIND_ADDR") {
        config.bind_addr = addr;
    }
    if let Ok(url) = std::env::var("MINTFEED_UPSTREAM_URL") {
        config.upstream_url = url;
    }

    info!(
        bind_addr = %config.bind_addr,
        upstream = %config.upstream_url,
        throttle_ms = config.throttle_ms,
        max_tracked_mints = config.max_tracked_mints,
        "Relay configured"
    );

    // ── 2. Build shared state ────────────────────────────────────────────
    let (bridge, cmd_rx) = PumpPortalBridge::new(
        config.upstream_url.clone(),
        Duration::from_secs(config.reconnect_delay_secs),
    );
    let source = Arc::new(PumpFunClient::new());
    let broker = Arc::new(FeedBroker::new(&config, bridge.clone(), source));
    let state = Arc::new(AppState::new(config, broker.clone()));

    // ── 3. Upstream bridge & event pump ──────────────────────────────────
    let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel();
    tokio::spawn(bridge.run(cmd_rx, event_tx));
    tokio::spawn(broker::run_event_pump(broker.clone(), event_rx));

    // ── 4. Start the API server ──────────────────────────────────────────
    let api_state = state.clone();
    let bind_addr = state.config.bind_addr.clone();
    tokio::spawn(async move {
        let app = api::rest::router(api_state);
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .expect("Failed to bind API server");
        info!(addr = %bind_addr, "API server listening");
        axum::serve(listener, app)
            .await
            .expect("API server failed");
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received, stopping gracefully");

    broker.shutdown();

    info!("MintFeed relay shut down complete.");
    Ok(())
}
