//! Progress events pushed to clients over their WebSocket channel.
//!
//! The wire shape is a JSON object tagged by `status`:
//!
//! ```json
//! {"status": "downloading", "percent": 42.5, "speed": "1.2MB/s", "eta": "00:31", "filename": "clip.mp4"}
//! {"status": "finished", "filename": "clip.mp4"}
//! {"status": "error", "error": "Unsupported URL"}
//! ```
//!
//! Events are immutable once constructed and delivered at most once,
//! best-effort. Ordering is guaranteed only within a single job.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProgressEvent {
    Downloading {
        percent: f64,
        speed: String,
        eta: String,
        filename: String,
    },
    Finished {
        filename: String,
    },
    Error {
        #[serde(rename = "error")]
        message: String,
    },
}

impl ProgressEvent {
    /// True for the events that end a job's sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Finished { .. } | ProgressEvent::Error { .. })
    }
}
