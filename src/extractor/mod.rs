//! Extraction engine abstraction
//!
//! The download mechanics live behind [`Extractor`]: `probe` resolves media
//! metadata for a URL, `fetch` downloads one format while streaming raw
//! [`FetchUpdate`]s through an unbounded channel. The dispatcher owns the
//! translation of those updates into client-facing [`ProgressEvent`]s.

mod ytdlp;

pub use ytdlp::{YtDlpExtractor, binary_on_path};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Error)]
pub enum ExtractorError {
    /// The engine binary could not be started at all.
    #[error("extractor unavailable: {0}")]
    Unavailable(String),

    /// The engine ran but the extraction or download failed.
    #[error("extraction failed: {0}")]
    Failed(String),

    /// The engine produced metadata we could not understand.
    #[error("invalid metadata: {0}")]
    Metadata(String),
}

/// Metadata for a single downloadable format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFormat {
    pub format_id: String,
    pub resolution: String,
    pub note: String,
    pub ext: String,
    pub filesize: u64,
}

/// Result of probing a URL, as returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<f64>,
    pub formats: Vec<MediaFormat>,
}

/// Raw progress notification produced during a fetch.
///
/// `Finished` is the engine's natural terminal signal; an engine emits it at
/// most once, after the last `Progress`, and only on success.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchUpdate {
    Progress {
        percent: f64,
        speed: String,
        eta: String,
        filename: String,
    },
    Finished {
        filename: String,
    },
}

/// External extraction engine (yt-dlp in production).
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Resolve metadata for a URL without downloading anything.
    async fn probe(&self, url: &str) -> Result<MediaInfo, ExtractorError>;

    /// Download `format_id` from `url`, pushing progress through `updates`.
    ///
    /// The sender is dropped when this returns, which closes the update
    /// stream for the consumer. Send failures are ignored: downloading must
    /// not abort because nobody is watching.
    async fn fetch(
        &self,
        url: &str,
        format_id: &str,
        updates: UnboundedSender<FetchUpdate>,
    ) -> Result<(), ExtractorError>;
}

/// Scripted extractor for tests.
///
/// `fetch` replays the configured updates (optionally spaced by a delay, so
/// tests can interleave disconnects) and then returns the configured outcome.
#[derive(Debug, Clone, Default)]
pub struct MockExtractor {
    pub info: Option<MediaInfo>,
    pub probe_error: Option<String>,
    pub updates: Vec<FetchUpdate>,
    pub fetch_error: Option<String>,
    pub update_delay: Option<std::time::Duration>,
}

impl MockExtractor {
    /// A mock that probes successfully and fetches with one progress update
    /// followed by a finished signal.
    pub fn happy(filename: &str) -> Self {
        Self {
            info: Some(MediaInfo {
                title: Some("Test Video".to_string()),
                thumbnail: Some("https://example.com/thumb.jpg".to_string()),
                duration: Some(212.0),
                formats: vec![MediaFormat {
                    format_id: "18".to_string(),
                    resolution: "640x360".to_string(),
                    note: "360p".to_string(),
                    ext: "mp4".to_string(),
                    filesize: 10_485_760,
                }],
            }),
            updates: vec![
                FetchUpdate::Progress {
                    percent: 50.0,
                    speed: "1MB/s".to_string(),
                    eta: "00:05".to_string(),
                    filename: filename.to_string(),
                },
                FetchUpdate::Finished {
                    filename: filename.to_string(),
                },
            ],
            ..Self::default()
        }
    }

    /// A mock whose fetch fails after the given updates.
    pub fn failing(message: &str) -> Self {
        Self {
            fetch_error: Some(message.to_string()),
            probe_error: Some(message.to_string()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    async fn probe(&self, _url: &str) -> Result<MediaInfo, ExtractorError> {
        if let Some(message) = &self.probe_error {
            return Err(ExtractorError::Failed(message.clone()));
        }
        self.info
            .clone()
            .ok_or_else(|| ExtractorError::Metadata("no scripted info".to_string()))
    }

    async fn fetch(
        &self,
        _url: &str,
        _format_id: &str,
        updates: UnboundedSender<FetchUpdate>,
    ) -> Result<(), ExtractorError> {
        for update in &self.updates {
            if let Some(delay) = self.update_delay {
                tokio::time::sleep(delay).await;
            }
            let _ = updates.send(update.clone());
        }
        match &self.fetch_error {
            Some(message) => Err(ExtractorError::Failed(message.clone())),
            None => Ok(()),
        }
    }
}
