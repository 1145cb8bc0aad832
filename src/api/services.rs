use axum::{Json, extract::State, response::IntoResponse};

use super::{
    models::{DownloadRequest, DownloadStartedResponse, HealthResponse, InfoRequest},
    state::AppState,
};
use crate::api::error::ApiError;
use crate::extractor::binary_on_path;

/// Metadata probe endpoint (POST /api/info)
///
/// Synchronous call into the extraction engine; no channel involvement.
/// Formats are filtered to the configured extension allow-list before the
/// response is built. Engine failures surface as a 400 with the underlying
/// message - the URL, not the service, is usually at fault.
pub async fn media_info(
    State(state): State<AppState>,
    Json(request): Json<InfoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.url.trim().is_empty() {
        return Err(ApiError::InvalidPayload("url must not be blank".into()));
    }

    let info = state
        .extractor
        .probe(&request.url)
        .await
        .map_err(|e| ApiError::ExtractionFailed(e.to_string()))?;

    Ok((axum::http::StatusCode::OK, Json(info)))
}

/// Download start endpoint (POST /api/download)
///
/// ## Flow:
/// 1. Validate the payload fields are non-blank
/// 2. Dispatcher checks the client has a live progress channel; without one
///    the request fails with CLIENT_NOT_CONNECTED and no job is started
/// 3. A background job task is spawned; the response returns immediately
///    with `{"status": "started"}` - completion is reported over the
///    client's WebSocket channel, never in this response
pub async fn start_download(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.url.trim().is_empty() {
        return Err(ApiError::InvalidPayload("url must not be blank".into()));
    }
    if request.format_id.trim().is_empty() {
        return Err(ApiError::InvalidPayload(
            "format_id must not be blank".into(),
        ));
    }
    if request.client_id.trim().is_empty() {
        return Err(ApiError::InvalidPayload(
            "client_id must not be blank".into(),
        ));
    }

    state
        .dispatcher
        .start(request.url, request.format_id, request.client_id)
        .await?;

    Ok((
        axum::http::StatusCode::OK,
        Json(DownloadStartedResponse::started()),
    ))
}

/// Health check endpoint (GET /health)
///
/// Returns health status of the service components:
/// - api: Axum HTTP server
/// - registry: channel registry (always healthy if we can respond)
/// - extractor: whether the configured engine binary is present
///
/// Returns 503 Service Unavailable if any component is unhealthy.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    use std::collections::HashMap;

    let mut components = HashMap::new();

    components.insert("api".to_string(), "healthy".to_string());
    components.insert("registry".to_string(), "healthy".to_string());

    let extractor_status = if binary_on_path(&state.config.extractor.binary) {
        "healthy"
    } else {
        "unhealthy"
    };
    components.insert("extractor".to_string(), extractor_status.to_string());

    let all_healthy = components.values().all(|status| status == "healthy");
    let overall_status = if all_healthy { "healthy" } else { "unhealthy" };

    let status_code = if all_healthy {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: overall_status.to_string(),
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response))
}
