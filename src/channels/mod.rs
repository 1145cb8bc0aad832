//! Channel registry - maps client ids to live progress channels.
//!
//! The registry is the single source of truth for "is this client currently
//! reachable". Each WebSocket connection registers under a caller-chosen
//! client id and receives the consuming half of an unbounded channel; the
//! registry keeps the sending half so that background job tasks can push
//! [`ProgressEvent`]s without touching the socket directly.
//!
//! Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
//! shared between the WebSocket tasks and any number of job tasks. The lock
//! is held only for map access, never across a send or an extraction call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, mpsc};
use tracing::debug;

use crate::events::ProgressEvent;

/// Sender half for pushing events to a client's WebSocket task.
pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;

/// Receiver half drained by the WebSocket task into the socket.
pub type ProgressReceiver = mpsc::UnboundedReceiver<ProgressEvent>;

struct Registration {
    sender: ProgressSender,
    epoch: u64,
}

/// Registry of live client channels, keyed by client id.
///
/// At most one channel is registered per client id at any instant: a new
/// `register` for the same id replaces the previous entry (last registration
/// wins). The replaced sender is dropped, which terminates the superseded
/// connection's forward loop; no close notification is sent - the transport
/// layer is responsible for its own teardown.
pub struct ChannelRegistry {
    channels: RwLock<HashMap<String, Registration>>,
    next_epoch: AtomicU64,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            next_epoch: AtomicU64::new(0),
        }
    }

    /// Register a client, replacing any prior channel for the same id.
    ///
    /// Returns the registration epoch and the receiver half of the progress
    /// channel. The epoch identifies this particular registration so that a
    /// superseded connection closing late cannot evict a newer one (see
    /// [`ChannelRegistry::unregister`]).
    pub async fn register(&self, client_id: impl Into<String>) -> (u64, ProgressReceiver) {
        let client_id = client_id.into();
        let (tx, rx) = mpsc::unbounded_channel();

        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed) + 1;

        let replaced = self
            .channels
            .write()
            .await
            .insert(client_id.clone(), Registration { sender: tx, epoch });

        if replaced.is_some() {
            debug!(client_id = %client_id, epoch, "Replaced existing channel registration");
        } else {
            debug!(client_id = %client_id, epoch, "Registered channel");
        }

        (epoch, rx)
    }

    /// Remove a client's registration if it still belongs to `epoch`.
    ///
    /// A no-op when the id is absent or has since been re-registered by a
    /// newer connection. Never errors; double unregister is fine.
    pub async fn unregister(&self, client_id: &str, epoch: u64) {
        let mut channels = self.channels.write().await;
        if channels.get(client_id).is_some_and(|r| r.epoch == epoch) {
            channels.remove(client_id);
            debug!(client_id, epoch, "Unregistered channel");
        }
    }

    /// Pre-dispatch guard: is this client currently reachable?
    pub async fn is_registered(&self, client_id: &str) -> bool {
        self.channels.read().await.contains_key(client_id)
    }

    /// Look up the sender half for a client, if registered.
    pub async fn lookup(&self, client_id: &str) -> Option<ProgressSender> {
        self.channels
            .read()
            .await
            .get(client_id)
            .map(|r| r.sender.clone())
    }

    /// Current number of registered channels.
    pub async fn connection_count(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Drop every registration during graceful shutdown.
    ///
    /// Dropping the senders ends each connection's forward loop; sockets
    /// close as their tasks unwind.
    pub async fn shutdown_all(&self) {
        let mut channels = self.channels.write().await;
        let count = channels.len();
        channels.clear();
        tracing::info!(count, "Cleared all channel registrations");
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
