//! WebSocket Relay End-to-End Tests
//!
//! Runs the real router on a local port and talks to it with a WebSocket client.
//! The recognition backend is scripted so every test controls what the
//! "remote" side returns.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use stt_relay::AppState;
use stt_relay::core::{BackendError, BackendEvent, StreamEndpoint};

use common::{ScriptedBackend, response, spawn_server, test_config};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

async fn start(
    max_connections_per_ip: u32,
) -> (
    SocketAddr,
    Arc<AppState>,
    Arc<ScriptedBackend>,
    mpsc::UnboundedReceiver<StreamEndpoint>,
) {
    let (backend, endpoints) = ScriptedBackend::new();
    let mut config = test_config();
    config.max_connections_per_ip = max_connections_per_ip;
    let state = AppState::new(config, backend.clone());
    let addr = spawn_server(state.clone()).await;
    (addr, state, backend, endpoints)
}

async fn connect(addr: SocketAddr, path: &str) -> Client {
    let (ws, _response) = connect_async(format!("ws://{addr}{path}"))
        .await
        .expect("WebSocket connect failed");
    ws
}

/// Next frame that is not a ping/pong.
async fn next_frame(ws: &mut Client) -> Option<Message> {
    loop {
        let frame = timeout(STEP_TIMEOUT, ws.next())
            .await
            .expect("no frame from server")?;
        match frame {
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(message) => return Some(message),
            Err(_) => return None,
        }
    }
}

async fn next_transcript(ws: &mut Client) -> Value {
    match next_frame(ws).await {
        Some(Message::Text(text)) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("expected transcript, got {other:?}"),
    }
}

async fn wait_for_sessions(state: &AppState, expected: usize) {
    timeout(STEP_TIMEOUT, async {
        while state.active_sessions() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("session count did not settle");
}

#[tokio::test]
async fn test_audio_relayed_and_transcripts_returned() {
    let (addr, state, backend, mut endpoints) = start(100).await;
    let mut ws = connect(addr, "/").await;

    for chunk in [&b"chunk-1"[..], b"chunk-2", b"chunk-3"] {
        ws.send(Message::Binary(Bytes::copy_from_slice(chunk)))
            .await
            .unwrap();
    }

    let mut endpoint = timeout(STEP_TIMEOUT, endpoints.recv())
        .await
        .unwrap()
        .unwrap();
    for expected in [&b"chunk-1"[..], b"chunk-2", b"chunk-3"] {
        let chunk = timeout(STEP_TIMEOUT, endpoint.audio_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&chunk[..], expected);
    }

    endpoint
        .events_tx
        .send(response("hello", false))
        .await
        .unwrap();
    endpoint
        .events_tx
        .send(BackendEvent::Response(
            stt_relay::core::RecognitionResponse::from_value(json!({
                "alternatives": [{"transcript": "hello world"}],
                "isFinal": true,
                "languageCode": "en-us"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(
        next_transcript(&mut ws).await,
        json!({"transcript": "hello", "isFinal": false})
    );
    assert_eq!(
        next_transcript(&mut ws).await,
        json!({"transcript": "hello world", "isFinal": true, "languageCode": "en-us"})
    );

    ws.close(None).await.unwrap();

    timeout(STEP_TIMEOUT, endpoint.cancel.cancelled())
        .await
        .expect("backend stream not released");
    wait_for_sessions(&state, 0).await;
    assert_eq!(backend.opened(), 1);
}

#[tokio::test]
async fn test_backend_error_closes_with_1011() {
    let (addr, state, _backend, mut endpoints) = start(100).await;
    let mut ws = connect(addr, "/ws").await;

    ws.send(Message::Binary(Bytes::from_static(b"audio")))
        .await
        .unwrap();
    let endpoint = timeout(STEP_TIMEOUT, endpoints.recv())
        .await
        .unwrap()
        .unwrap();

    endpoint
        .events_tx
        .send(BackendEvent::Error(BackendError::ProviderError(
            "internal".to_string(),
        )))
        .await
        .unwrap();

    match next_frame(&mut ws).await {
        Some(Message::Close(Some(frame))) => {
            assert_eq!(frame.code, CloseCode::from(1011));
            assert_eq!(frame.reason.as_str(), "backend error");
        }
        other => panic!("expected close frame, got {other:?}"),
    }

    wait_for_sessions(&state, 0).await;
    assert!(endpoint.cancel.is_cancelled());
}

#[tokio::test]
async fn test_text_frames_ignored() {
    let (addr, _state, backend, mut endpoints) = start(100).await;
    let mut ws = connect(addr, "/").await;

    ws.send(Message::Text("not audio".into())).await.unwrap();
    ws.send(Message::Binary(Bytes::from_static(b"audio")))
        .await
        .unwrap();

    let mut endpoint = timeout(STEP_TIMEOUT, endpoints.recv())
        .await
        .unwrap()
        .unwrap();
    let chunk = timeout(STEP_TIMEOUT, endpoint.audio_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&chunk[..], b"audio");
    assert_eq!(backend.opened(), 1);
}

#[tokio::test]
async fn test_shutdown_closes_with_1001() {
    let (addr, state, _backend, _endpoints) = start(100).await;
    let mut ws = connect(addr, "/").await;
    wait_for_sessions(&state, 1).await;

    state.shutdown.cancel();

    match next_frame(&mut ws).await {
        Some(Message::Close(Some(frame))) => {
            assert_eq!(frame.code, CloseCode::from(1001));
            assert_eq!(frame.reason.as_str(), "server shutting down");
        }
        other => panic!("expected close frame, got {other:?}"),
    }

    timeout(STEP_TIMEOUT, state.registry.wait_until_empty())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_per_ip_limit_rejects_extra_connection() {
    let (addr, state, _backend, _endpoints) = start(1).await;

    let first = connect(addr, "/").await;
    wait_for_sessions(&state, 1).await;

    let rejected = connect_async(format!("ws://{addr}/")).await;
    match rejected {
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), 429);
        }
        other => panic!("expected HTTP 429, got {:?}", other.map(|_| ())),
    }

    // Closing the first connection frees the slot
    drop(first);
    wait_for_sessions(&state, 0).await;
    timeout(STEP_TIMEOUT, async {
        while state.ws_connection_count() != 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let _second = connect(addr, "/").await;
    wait_for_sessions(&state, 1).await;
}
