// =============================================================================
// PumpPortal Bridge — single upstream WebSocket, many downstream watchers
// =============================================================================
//
// The service holds exactly one connection to the PumpPortal trade feed no
// matter how many mints are watched. Subscribe/unsubscribe requests arrive
// over a command channel and are forwarded as control frames; the bridge
// also keeps its own subscription set so that after a reconnect it can
// replay everything in one message and resume where the old connection
// left off.
//
// One driver task owns the connection lifecycle end to end: connect, drive,
// reconnect after a fixed delay. Because nothing else touches the socket,
// a disconnect can never schedule two competing reconnect attempts.
// =============================================================================

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Control method for watching a mint's trades.
const SUBSCRIBE_METHOD: &str = "subscribeTokenTrade";
/// Control method for dropping a mint's trades.
const UNSUBSCRIBE_METHOD: &str = "unsubscribeTokenTrade";

/// Commands sent from the broker to the bridge driver task.
#[derive(Debug, PartialEq)]
pub enum BridgeCommand {
    Subscribe(String),
    Unsubscribe(String),
    Shutdown,
}

/// Handle to the upstream connection. Cheap to clone; all clones share the
/// same command channel, subscription set, and status flags.
#[derive(Clone)]
pub struct PumpPortalBridge {
    url: String,
    cmd_tx: UnboundedSender<BridgeCommand>,
    /// Mints this bridge should be subscribed to, independent of whether a
    /// connection currently exists. Replayed on every (re)connect.
    subscriptions: Arc<RwLock<HashSet<String>>>,
    connected: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    reconnect_delay: Duration,
}

impl PumpPortalBridge {
    /// Create the bridge handle plus the command receiver that must be passed
    /// to [`PumpPortalBridge::run`].
    pub fn new(
        url: impl Into<String>,
        reconnect_delay: Duration,
    ) -> (Self, UnboundedReceiver<BridgeCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let bridge = Self {
            url: url.into(),
            cmd_tx,
            subscriptions: Arc::new(RwLock::new(HashSet::new())),
            connected: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(AtomicBool::new(false)),
            reconnect_delay,
        };
        (bridge, cmd_rx)
    }

    /// Start watching a mint's trades. Safe to call while disconnected: the
    /// mint lands in the subscription set and the replay on the next connect
    /// picks it up. Duplicate calls are no-ops.
    pub fn subscribe(&self, mint: &str) {
        let inserted = self.subscriptions.write().insert(mint.to_string());
        if inserted {
            let _ = self.cmd_tx.send(BridgeCommand::Subscribe(mint.to_string()));
        }
    }

    /// Stop watching a mint's trades. A mint that was never subscribed is a
    /// strict no-op: nothing is sent upstream.
    pub fn unsubscribe(&self, mint: &str) {
        let removed = self.subscriptions.write().remove(mint);
        if removed {
            let _ = self.cmd_tx.send(BridgeCommand::Unsubscribe(mint.to_string()));
        }
    }

    /// Terminal shutdown: close the active connection (if any) and suppress
    /// all future reconnects. Idempotent.
    pub fn shutdown(&self) {
        if !self.shutdown.swap(true, Ordering::SeqCst) {
            info!("upstream bridge shutdown requested");
            let _ = self.cmd_tx.send(BridgeCommand::Shutdown);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn subscribed(&self, mint: &str) -> bool {
        self.subscriptions.read().contains(mint)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Drive the upstream connection until shutdown.
    ///
    /// Each extracted trade-event mint is pushed into `events`; the broker's
    /// event pump consumes them. Connection loss of any kind (close frame,
    /// read error, failed write, stream end) tears the connection down and a
    /// single reconnect is attempted after `reconnect_delay`.
    pub async fn run(
        self,
        mut cmd_rx: UnboundedReceiver<BridgeCommand>,
        events: UnboundedSender<String>,
    ) {
        loop {
            if self.is_shutdown() {
                break;
            }

            match connect_async(&self.url).await {
                Ok((stream, _response)) => {
                    info!(url = %self.url, "upstream feed connected");
                    self.connected.store(true, Ordering::SeqCst);

                    let terminal = self.drive_connection(stream, &mut cmd_rx, &events).await;

                    self.connected.store(false, Ordering::SeqCst);
                    if terminal {
                        break;
                    }
                    warn!(
                        delay_secs = self.reconnect_delay.as_secs(),
                        "upstream feed disconnected; reconnecting"
                    );
                }
                Err(e) => {
                    error!(
                        error = %e,
                        delay_secs = self.reconnect_delay.as_secs(),
                        "upstream connect failed; retrying"
                    );
                }
            }

            tokio::time::sleep(self.reconnect_delay).await;
        }

        info!("upstream bridge stopped");
    }

    /// Drive one established connection. Returns `true` when the bridge is
    /// done for good (shutdown), `false` when the caller should reconnect.
    async fn drive_connection(
        &self,
        stream: WsStream,
        cmd_rx: &mut UnboundedReceiver<BridgeCommand>,
        events: &UnboundedSender<String>,
    ) -> bool {
        let (mut write, mut read) = stream.split();

        // Replay the whole subscription set in one control frame so the new
        // connection resumes exactly where the old one left off.
        let keys: Vec<String> = self.subscriptions.read().iter().cloned().collect();
        if !keys.is_empty() {
            let msg = control_message(SUBSCRIBE_METHOD, &keys);
            if let Err(e) = write.send(Message::Text(msg)).await {
                warn!(error = %e, "failed to replay subscriptions");
                return false;
            }
            info!(count = keys.len(), "upstream subscriptions replayed");
        }

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match extract_mint(&text) {
                                Some(mint) => {
                                    if events.send(mint).is_err() {
                                        warn!("trade-event channel closed; stopping bridge");
                                        return true;
                                    }
                                }
                                None => {
                                    debug!("upstream frame without a mint dropped");
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = write.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(_))) => {
                            warn!("upstream closed the connection");
                            return false;
                        }
                        Some(Ok(_)) => {
                            // Pong / Binary / raw frames carry nothing for us.
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "upstream read error");
                            return false;
                        }
                        None => {
                            warn!("upstream stream ended");
                            return false;
                        }
                    }
                }

                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(BridgeCommand::Subscribe(mint)) => {
                            let msg = control_message(SUBSCRIBE_METHOD, std::slice::from_ref(&mint));
                            if let Err(e) = write.send(Message::Text(msg)).await {
                                warn!(error = %e, mint = %mint, "subscribe send failed");
                                return false;
                            }
                            info!(mint = %mint, "subscribed upstream");
                        }
                        Some(BridgeCommand::Unsubscribe(mint)) => {
                            let msg = control_message(UNSUBSCRIBE_METHOD, std::slice::from_ref(&mint));
                            if let Err(e) = write.send(Message::Text(msg)).await {
                                warn!(error = %e, mint = %mint, "unsubscribe send failed");
                                return false;
                            }
                            info!(mint = %mint, "unsubscribed upstream");
                        }
                        Some(BridgeCommand::Shutdown) | None => {
                            let _ = write.send(Message::Close(None)).await;
                            return true;
                        }
                    }
                }
            }
        }
    }
}

// -----------------------------------------------------------------------------
// Frame helpers
// -----------------------------------------------------------------------------

/// Build a PumpPortal control frame: `{"method":...,"keys":[...]}`.
fn control_message(method: &str, keys: &[String]) -> String {
    serde_json::json!({
        "method": method,
        "keys": keys,
    })
    .to_string()
}

/// Pull the mint out of an upstream trade-event frame.
///
/// Trade events carry the mint under `mint`, token-lifecycle events under
/// `token`; both identify the coin the event is about. Anything else
/// (acks, malformed frames, unexpected shapes) yields `None`.
fn extract_mint(text: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    value
        .get("mint")
        .or_else(|| value.get("token"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}
