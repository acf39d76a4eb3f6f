// =============================================================================
// Feed Broker — event-to-broadcast pipeline for the market-data relay
// =============================================================================
//
// The broker owns every piece of per-mint state the relay keeps: who is
// watching which mint, the price/candle history, and the enrichment throttle.
// Upstream trade events flow in from the bridge, get enriched through the
// market-data source, recorded, and fanned out to every WebSocket client
// subscribed to that mint.
//
// Pipeline for one trade event (the hot path):
//
//   event(mint) -> any watchers? -> throttle -> fetch -> record -> broadcast
//
// Each stage can end the pipeline early: no watchers and throttle denials are
// silent, a fetch miss is silent, a fetch error is logged and swallowed. A
// snapshot with a non-positive market cap is still broadcast (clients want to
// see the flatline) but never recorded into history.
//
// Thread safety:
//   - parking_lot locks around the registry and throttle; guards are scoped
//     to single statements and never held across an await point.
//   - MarketHistory manages its own interior lock.
//   - The bridge handle is clone-shared and internally synchronised.
// =============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::market_data::{
    Candle, FetchThrottle, MarketDataSource, MarketHistory, PricePoint, Timeframe,
};
use crate::pumpportal::PumpPortalBridge;
use crate::registry::{ClientId, SubscriberRegistry};
use crate::types::ServerMessage;

/// Shortest plausible base58 mint address. Anything shorter is junk input
/// from the client and is dropped during subscribe validation.
pub const MIN_MINT_LEN: usize = 30;

/// Central coordinator shared across all async tasks via `Arc<FeedBroker>`.
pub struct FeedBroker {
    // ── Downstream clients ──────────────────────────────────────────────
    registry: RwLock<SubscriberRegistry>,

    // ── Market data ─────────────────────────────────────────────────────
    history: MarketHistory,
    throttle: Mutex<FetchThrottle>,
    source: Arc<dyn MarketDataSource>,

    // ── Upstream ────────────────────────────────────────────────────────
    bridge: PumpPortalBridge,

    // ── Lifecycle ───────────────────────────────────────────────────────
    shutting_down: AtomicBool,
}

impl FeedBroker {
    /// Construct a broker from the service configuration, an upstream bridge
    /// handle, and a market-data source.
    pub fn new(
        config: &ServiceConfig,
        bridge: PumpPortalBridge,
        source: Arc<dyn MarketDataSource>,
    ) -> Self {
        Self {
            registry: RwLock::new(SubscriberRegistry::new()),
            history: MarketHistory::new(
                config.max_history_points,
                config.max_candles,
                config.max_tracked_mints,
            ),
            throttle: Mutex::new(FetchThrottle::new(config.throttle_ms)),
            source,
            bridge,
            shutting_down: AtomicBool::new(false),
        }
    }

    // ── Client lifecycle ────────────────────────────────────────────────

    /// Register a freshly connected WebSocket client and its outbound queue.
    pub fn register_client(&self, client: ClientId, tx: UnboundedSender<String>) {
        let total = {
            let mut registry = self.registry.write();
            registry.register(client, tx);
            registry.client_count()
        };
        info!(client = %client, total, "client connected");
    }

    /// Apply a subscribe request from `client`.
    ///
    /// Entries that are not strings, or are shorter than [`MIN_MINT_LEN`],
    /// are dropped with a debug log; the rest of the batch still applies.
    /// Returns how many mints were accepted.
    pub fn subscribe(&self, client: ClientId, mints: &[serde_json::Value]) -> usize {
        let mut accepted = 0;

        for entry in mints {
            let mint = match entry.as_str() {
                Some(s) => s,
                None => {
                    debug!(client = %client, "dropping non-string mint entry");
                    continue;
                }
            };
            if mint.len() < MIN_MINT_LEN {
                debug!(client = %client, mint = %mint, "dropping implausibly short mint");
                continue;
            }

            let first_watcher = self.registry.write().subscribe(client, mint);
            if first_watcher {
                self.bridge.subscribe(mint);
            }
            accepted += 1;
        }

        if accepted > 0 {
            info!(client = %client, accepted, "subscriptions applied");
        }
        accepted
    }

    /// Remove a disconnected client. Mints nobody else is watching are
    /// unsubscribed upstream and their throttle records cleared, so a later
    /// re-subscribe starts fresh.
    pub fn disconnect(&self, client: ClientId) {
        let orphaned = self.registry.write().unregister(client);

        if !orphaned.is_empty() {
            let mut throttle = self.throttle.lock();
            for mint in &orphaned {
                self.bridge.unsubscribe(mint);
                throttle.forget(mint);
            }
        }

        let remaining = self.registry.read().client_count();
        info!(
            client = %client,
            orphaned = orphaned.len(),
            remaining,
            "client disconnected"
        );
    }

    // ── Event pipeline ──────────────────────────────────────────────────

    /// Handle one upstream trade event for `mint`.
    pub async fn on_trade_event(&self, mint: &str) {
        if self.registry.read().subscriber_count(mint) == 0 {
            return;
        }

        if !self.throttle.lock().allow(mint, Utc::now().timestamp_millis()) {
            return;
        }

        let snapshot = match self.source.fetch(mint).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return,
            Err(e) => {
                warn!(mint = %mint, error = %e, "market data fetch failed");
                return;
            }
        };

        if snapshot.market_cap > 0.0 {
            self.history
                .record(mint, snapshot.market_cap, Utc::now().timestamp_millis());
        }

        let update = ServerMessage::CoinUpdate {
            mint: mint.to_string(),
            market_cap: snapshot.market_cap,
            volume_24h: snapshot.volume_24h,
            holders: snapshot.holders,
            graduated: snapshot.graduated,
            candles: self.history.current_candles(mint),
        };
        let payload = match serde_json::to_string(&update) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(mint = %mint, error = %e, "coin update serialisation failed");
                return;
            }
        };

        // Re-read the registry so clients that subscribed mid-fetch are
        // included. Sends to half-closed queues are skipped silently; the
        // socket task cleans those clients up on its own.
        let txs = self.registry.read().subscriber_txs(mint);
        let mut delivered = 0;
        for tx in &txs {
            if tx.send(payload.clone()).is_ok() {
                delivered += 1;
            }
        }

        debug!(
            mint = %mint,
            delivered,
            market_cap = snapshot.market_cap,
            "coin update fanned out"
        );
    }

    // ── Shutdown ────────────────────────────────────────────────────────

    /// Stop the upstream bridge and drop all client state. Idempotent.
    pub fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("feed broker shutting down");
        self.bridge.shutdown();
        self.registry.write().clear();
    }

    // ── Read accessors (REST layer) ─────────────────────────────────────

    /// Market-cap history for a mint, oldest first. Empty when untracked.
    pub fn price_history(&self, mint: &str) -> Vec<PricePoint> {
        self.history.price_history(mint)
    }

    /// Closed-plus-open candle series for a mint at one timeframe.
    pub fn candle_history(&self, mint: &str, tf: Timeframe) -> Vec<Candle> {
        self.history.candle_history(mint, tf)
    }

    pub fn client_count(&self) -> usize {
        self.registry.read().client_count()
    }

    pub fn tracked_mints(&self) -> usize {
        self.history.tracked_count()
    }

    pub fn upstream_connected(&self) -> bool {
        self.bridge.is_connected()
    }
}

// =============================================================================
// Event pump
// =============================================================================

/// Drain upstream trade events, dispatching each to the broker on its own
/// task so one slow enrichment fetch never stalls the queue. Ordering between
/// events for the same mint is not guaranteed, but the per-mint throttle
/// collapses racing fetches to one per window anyway.
pub async fn run_event_pump(broker: Arc<FeedBroker>, mut events: UnboundedReceiver<String>) {
    while let Some(mint) = events.recv().await {
        let broker = Arc::clone(&broker);
        tokio::spawn(async move {
            broker.on_trade_event(&mint).await;
        });
    }
    info!("event pump stopped");
}
