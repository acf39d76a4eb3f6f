// =============================================================================
// Subscriber Registry — who is watching which mint
// =============================================================================
//
// Two indexes over the same facts, kept in lockstep:
//   clients:      connection -> { outbound queue, mints it watches }
//   subscribers:  mint       -> connections watching it
//
// The forward index drives per-connection cleanup on disconnect; the reverse
// index drives broadcast fan-out and the "does anyone still care" checks that
// gate upstream subscribe/unsubscribe. Every mutation here updates both, so
// neither can drift.
//
// Not internally synchronised -- the broker wraps the registry in a RwLock.
// =============================================================================

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc::UnboundedSender;

/// Identifier for one downstream WebSocket connection.
pub type ClientId = uuid::Uuid;

struct ClientEntry {
    /// Outbound queue; the connection's forward task drains it to the socket.
    tx: UnboundedSender<String>,
    mints: HashSet<String>,
}

#[derive(Default)]
pub struct SubscriberRegistry {
    clients: HashMap<ClientId, ClientEntry>,
    subscribers: HashMap<String, HashSet<ClientId>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection with no subscriptions yet.
    pub fn register(&mut self, id: ClientId, tx: UnboundedSender<String>) {
        self.clients.insert(
            id,
            ClientEntry {
                tx,
                mints: HashSet::new(),
            },
        );
    }

    /// Link `id` to `mint`. Returns `true` iff the mint gained its first
    /// subscriber anywhere, which is the caller's cue to subscribe upstream.
    ///
    /// Unknown client ids are ignored (the connection raced its own
    /// disconnect) and duplicate subscriptions are no-ops.
    pub fn subscribe(&mut self, id: ClientId, mint: &str) -> bool {
        let entry = match self.clients.get_mut(&id) {
            Some(entry) => entry,
            None => return false,
        };
        entry.mints.insert(mint.to_string());

        let watchers = self.subscribers.entry(mint.to_string()).or_default();
        let was_empty = watchers.is_empty();
        watchers.insert(id);
        was_empty
    }

    /// Remove a connection entirely. Returns the mints that now have no
    /// subscribers at all -- the caller's cue to unsubscribe upstream.
    pub fn unregister(&mut self, id: ClientId) -> Vec<String> {
        let entry = match self.clients.remove(&id) {
            Some(entry) => entry,
            None => return Vec::new(),
        };

        let mut orphaned = Vec::new();
        for mint in entry.mints {
            if let Some(watchers) = self.subscribers.get_mut(&mint) {
                watchers.remove(&id);
                if watchers.is_empty() {
                    self.subscribers.remove(&mint);
                    orphaned.push(mint);
                }
            }
        }
        orphaned
    }

    /// Outbound queues of every connection watching `mint`, cloned so the
    /// caller can send after dropping the registry lock.
    pub fn subscriber_txs(&self, mint: &str) -> Vec<UnboundedSender<String>> {
        self.subscribers
            .get(mint)
            .map(|watchers| {
                watchers
                    .iter()
                    .filter_map(|id| self.clients.get(id))
                    .map(|entry| entry.tx.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self, mint: &str) -> usize {
        self.subscribers.get(mint).map_or(0, HashSet::len)
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Drop every connection and subscription. Their outbound queues close
    /// when the senders drop, which ends each connection's forward task.
    pub fn clear(&mut self) {
        self.clients.clear();
        self.subscribers.clear();
    }
}
