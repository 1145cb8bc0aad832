//! Job dispatcher - binds a download request to a background job task.
//!
//! `start` validates that the requesting client has a live channel, then
//! spawns a detached task that owns the job end-to-end: it drives the
//! extraction engine, translates raw [`FetchUpdate`]s into client-facing
//! [`ProgressEvent`]s, and converts an engine failure into the terminal
//! `error` event. No handle to the task is kept - there is no cancellation
//! and no join; a client that disconnects mid-job simply stops receiving.
//!
//! Architecture:
//! 1. API calls `dispatcher.start(url, format_id, client_id)`
//! 2. Registry gate: unregistered client -> `ClientNotConnected`, no spawn
//! 3. Job task hands the engine an unbounded update channel
//! 4. A forwarder task drains that channel into the relay, in order
//! 5. Terminal event: engine-emitted `finished`, or `error` built from `Err`

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::channels::ChannelRegistry;
use crate::events::ProgressEvent;
use crate::extractor::{Extractor, FetchUpdate};
use crate::observability::Metrics;
use crate::relay::ProgressRelay;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("client {0} is not connected to a progress channel")]
    ClientNotConnected(String),
}

pub struct Dispatcher {
    registry: Arc<ChannelRegistry>,
    relay: ProgressRelay,
    extractor: Arc<dyn Extractor>,
    metrics: Arc<Metrics>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ChannelRegistry>,
        relay: ProgressRelay,
        extractor: Arc<dyn Extractor>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            registry,
            relay,
            extractor,
            metrics,
        }
    }

    /// Schedule a download job for a connected client.
    ///
    /// Returns as soon as the job task is spawned; progress flows over the
    /// client's channel from then on. Fails fast with `ClientNotConnected`
    /// when the client has no live channel - no task is spawned in that case.
    pub async fn start(
        &self,
        url: String,
        format_id: String,
        client_id: String,
    ) -> Result<(), DispatchError> {
        if !self.registry.is_registered(&client_id).await {
            debug!(client_id = %client_id, "Rejecting download for unregistered client");
            return Err(DispatchError::ClientNotConnected(client_id));
        }

        info!(url = %url, format_id = %format_id, client_id = %client_id, "Scheduling download job");
        self.metrics.job_started();

        let relay = self.relay.clone();
        let extractor = self.extractor.clone();
        let metrics = self.metrics.clone();
        tokio::spawn(run_job(url, format_id, client_id, extractor, relay, metrics));

        Ok(())
    }
}

/// One job, end to end. Never panics the host: every failure path ends in a
/// terminal `error` event (delivered best-effort) and a metrics bump.
async fn run_job(
    url: String,
    format_id: String,
    client_id: String,
    extractor: Arc<dyn Extractor>,
    relay: ProgressRelay,
    metrics: Arc<Metrics>,
) {
    let (update_tx, mut update_rx) = mpsc::unbounded_channel::<FetchUpdate>();

    // Forward updates to the relay in emission order. The loop ends when the
    // engine drops its sender, so by the time we join below every produced
    // update has had its delivery attempt.
    let forwarder = {
        let relay = relay.clone();
        let client_id = client_id.clone();
        tokio::spawn(async move {
            while let Some(update) = update_rx.recv().await {
                relay.send(&client_id, translate(update)).await;
            }
        })
    };

    let result = extractor.fetch(&url, &format_id, update_tx).await;

    if forwarder.await.is_err() {
        warn!(client_id = %client_id, "Progress forwarder task panicked");
    }

    match result {
        Ok(()) => {
            info!(url = %url, client_id = %client_id, "Download job finished");
            metrics.job_finished();
        }
        Err(e) => {
            warn!(url = %url, client_id = %client_id, error = %e, "Download job failed");
            relay
                .send(
                    &client_id,
                    ProgressEvent::Error {
                        message: e.to_string(),
                    },
                )
                .await;
            metrics.job_failed();
        }
    }
}

/// Translate a raw engine update into the client-facing event shape.
fn translate(update: FetchUpdate) -> ProgressEvent {
    match update {
        FetchUpdate::Progress {
            percent,
            speed,
            eta,
            filename,
        } => ProgressEvent::Downloading {
            percent: percent.clamp(0.0, 100.0),
            speed,
            eta,
            filename,
        },
        FetchUpdate::Finished { filename } => ProgressEvent::Finished { filename },
    }
}
