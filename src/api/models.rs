//! API models for the Clipbox metadata and download endpoints.
//!
//! The external contract is small:
//! - `POST /api/info` takes an [`InfoRequest`] and returns the probed
//!   [`crate::extractor::MediaInfo`] as JSON
//! - `POST /api/download` takes a [`DownloadRequest`] and returns
//!   [`DownloadStartedResponse`] once the job is scheduled
//! - `GET /ws/{client_id}` upgrades to the progress channel; payloads are
//!   [`crate::events::ProgressEvent`]s
//!
//! The `client_id` is an opaque, caller-chosen correlation key between a
//! WebSocket connection and the download jobs targeting it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct InfoRequest {
    pub url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub format_id: String,
    pub client_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DownloadStartedResponse {
    pub status: String,
}

impl DownloadStartedResponse {
    pub fn started() -> Self {
        Self {
            status: "started".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, String>,
    pub version: String,
}
