//! End-to-end tests for Clipbox
//!
//! These tests run the real router on a real listener and exercise the full
//! flow a browser client would: open the progress WebSocket, POST a download,
//! and watch events arrive on the socket. The extraction engine is the
//! scripted `MockExtractor`; everything else is production code.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use clipbox::api::state::AppState;
use clipbox::config::Config;
use clipbox::events::ProgressEvent;
use clipbox::extractor::{FetchUpdate, MockExtractor};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

fn test_config() -> Config {
    let config_toml = r#"
[extractor]
binary = "sh"
downloads_dir = "/tmp/clipbox-e2e-downloads"
    "#;
    toml::from_str(config_toml).expect("Failed to parse test config")
}

/// Start a server with the given extractor on an ephemeral port.
async fn start_server(extractor: MockExtractor) -> SocketAddr {
    let state = AppState::new(test_config(), Arc::new(extractor));
    let app = clipbox::api::server::app(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .await
            .expect("Test server crashed");
    });

    addr
}

async fn open_channel(addr: SocketAddr, client_id: &str) -> WsStream {
    let (ws, _) = connect_async(format!("ws://{}/ws/{}", addr, client_id))
        .await
        .expect("WebSocket handshake failed");
    ws
}

/// POST /api/download, retrying while the server-side registration of a
/// just-opened WebSocket is still in flight.
async fn start_download(
    client: &reqwest::Client,
    addr: SocketAddr,
    client_id: &str,
) -> reqwest::Response {
    let body = serde_json::json!({
        "url": "https://example/video",
        "format_id": "18",
        "client_id": client_id,
    });

    for _ in 0..50 {
        let response = client
            .post(format!("http://{}/api/download", addr))
            .json(&body)
            .send()
            .await
            .expect("download request failed");

        if response.status() != reqwest::StatusCode::BAD_REQUEST {
            return response;
        }
        let error: serde_json::Value = response.json().await.unwrap();
        if error.get("code").and_then(|v| v.as_str()) != Some("CLIENT_NOT_CONNECTED") {
            panic!("unexpected download error: {error}");
        }
        sleep(Duration::from_millis(100)).await;
    }

    panic!("WebSocket registration never became visible to the dispatcher");
}

/// Read the next ProgressEvent off the socket, skipping control frames.
async fn next_event(ws: &mut WsStream) -> ProgressEvent {
    loop {
        let message = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("socket closed unexpectedly")
            .expect("socket errored");

        if let Message::Text(payload) = message {
            return serde_json::from_str(&payload).expect("unparseable event payload");
        }
    }
}

#[tokio::test]
async fn test_download_happy_path() {
    let addr = start_server(MockExtractor::happy("clip.mp4")).await;
    let client = reqwest::Client::new();

    let mut ws = open_channel(addr, "abc").await;

    let response = start_download(&client, addr, "abc").await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body.get("status").and_then(|v| v.as_str()), Some("started"));

    match next_event(&mut ws).await {
        ProgressEvent::Downloading {
            percent, filename, ..
        } => {
            assert_eq!(percent, 50.0);
            assert_eq!(filename, "clip.mp4");
        }
        other => panic!("expected downloading event, got {other:?}"),
    }

    assert_eq!(
        next_event(&mut ws).await,
        ProgressEvent::Finished {
            filename: "clip.mp4".to_string()
        }
    );
}

#[tokio::test]
async fn test_download_for_ghost_client_never_starts() {
    let addr = start_server(MockExtractor::happy("clip.mp4")).await;
    let client = reqwest::Client::new();

    // No WebSocket was ever opened for "ghost".
    let response = client
        .post(format!("http://{}/api/download", addr))
        .json(&serde_json::json!({
            "url": "https://example/video",
            "format_id": "18",
            "client_id": "ghost",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let error: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        error.get("code").and_then(|v| v.as_str()),
        Some("CLIENT_NOT_CONNECTED")
    );
}

#[tokio::test]
async fn test_fetch_failure_reports_single_error_event() {
    let mut extractor = MockExtractor::happy("clip.mp4");
    extractor.updates = vec![FetchUpdate::Progress {
        percent: 10.0,
        speed: "1MB/s".to_string(),
        eta: "01:00".to_string(),
        filename: "clip.mp4".to_string(),
    }];
    extractor.fetch_error = Some("HTTP Error 403: Forbidden".to_string());

    let addr = start_server(extractor).await;
    let client = reqwest::Client::new();

    let mut ws = open_channel(addr, "abc").await;
    start_download(&client, addr, "abc").await;

    assert!(matches!(
        next_event(&mut ws).await,
        ProgressEvent::Downloading { .. }
    ));
    match next_event(&mut ws).await {
        ProgressEvent::Error { message } => {
            assert!(message.contains("HTTP Error 403"));
        }
        other => panic!("expected error event, got {other:?}"),
    }

    // The error is terminal: nothing further arrives, in particular no
    // finished event.
    assert!(
        timeout(Duration::from_millis(500), ws.next()).await.is_err(),
        "no event should follow the terminal error"
    );
}

#[tokio::test]
async fn test_reconnect_rebinds_progress_channel() {
    let addr = start_server(MockExtractor::happy("clip.mp4")).await;
    let client = reqwest::Client::new();

    // First connection comes and goes.
    let mut first = open_channel(addr, "abc").await;
    first.close(None).await.unwrap();

    // Reconnect under the same client id, then start a job.
    let mut second = open_channel(addr, "abc").await;
    start_download(&client, addr, "abc").await;

    assert!(matches!(
        next_event(&mut second).await,
        ProgressEvent::Downloading { .. }
    ));
    assert!(matches!(
        next_event(&mut second).await,
        ProgressEvent::Finished { .. }
    ));
}

#[tokio::test]
async fn test_replacement_targets_only_new_channel() {
    let addr = start_server(MockExtractor::happy("clip.mp4")).await;
    let client = reqwest::Client::new();

    // Two live connections under the same id: the second replaces the first.
    let mut old = open_channel(addr, "abc").await;
    sleep(Duration::from_millis(200)).await;
    let mut new = open_channel(addr, "abc").await;
    // The retry loop below cannot distinguish old from new registration, so
    // give the replacement time to land server-side before dispatching.
    sleep(Duration::from_millis(300)).await;

    start_download(&client, addr, "abc").await;

    assert!(matches!(
        next_event(&mut new).await,
        ProgressEvent::Downloading { .. }
    ));
    assert!(matches!(
        next_event(&mut new).await,
        ProgressEvent::Finished { .. }
    ));

    // The superseded connection sees no events (it may see silence or a
    // close, but never a progress payload).
    match timeout(Duration::from_millis(500), old.next()).await {
        Err(_) => {}
        Ok(None) => {}
        Ok(Some(Ok(Message::Text(payload)))) => {
            panic!("old channel unexpectedly received: {payload}")
        }
        Ok(Some(_)) => {}
    }
}
