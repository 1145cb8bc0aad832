//! Progress relay - forwards job events to the owning client's channel.
//!
//! The relay is the narrow API background jobs use to reach a client. It
//! performs exactly one attempted write per call: registry lookup, then a
//! send on the client's channel. A missing client or a closed channel both
//! mean "nobody is watching" - the event is dropped and the job carries on.

use std::sync::Arc;

use tracing::debug;

use crate::channels::ChannelRegistry;
use crate::events::ProgressEvent;
use crate::observability::Metrics;

#[derive(Clone)]
pub struct ProgressRelay {
    registry: Arc<ChannelRegistry>,
    metrics: Arc<Metrics>,
}

impl ProgressRelay {
    pub fn new(registry: Arc<ChannelRegistry>, metrics: Arc<Metrics>) -> Self {
        Self { registry, metrics }
    }

    /// Push an event to `client_id`'s channel.
    ///
    /// Returns whether the write was accepted. `false` is not an error: it is
    /// the defined outcome for a client that disconnected mid-job. No
    /// buffering, no retry; the caller is responsible for calling
    /// sequentially if it needs per-job ordering.
    pub async fn send(&self, client_id: &str, event: ProgressEvent) -> bool {
        let Some(sender) = self.registry.lookup(client_id).await else {
            debug!(client_id, "Client not registered, dropping event");
            self.metrics.event_dropped();
            return false;
        };

        // The channel closes when the WebSocket task unwinds; treat that
        // exactly like an absent client.
        match sender.send(event) {
            Ok(()) => {
                self.metrics.event_delivered();
                true
            }
            Err(_) => {
                debug!(client_id, "Channel closed, dropping event");
                self.metrics.event_dropped();
                false
            }
        }
    }
}
