//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::extract::connect_info::MockConnectInfo;
use axum::{Router, middleware};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use stt_relay::middleware::connection_limit_middleware;
use stt_relay::{AppState, ServerConfig, routes};
use stt_relay::core::{
    BackendError, BackendEvent, BackendStream, RecognitionBackend, RecognitionConfig,
    RecognitionResponse, StreamEndpoint, StreamPolicy,
};

/// Backend that hands the far end of every opened stream to the test.
pub struct ScriptedBackend {
    opened: AtomicUsize,
    endpoints: mpsc::UnboundedSender<StreamEndpoint>,
}

impl ScriptedBackend {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<StreamEndpoint>) {
        let (endpoints, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                opened: AtomicUsize::new(0),
                endpoints,
            }),
            rx,
        )
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecognitionBackend for ScriptedBackend {
    async fn open_stream(&self, _config: &RecognitionConfig) -> Result<BackendStream, BackendError> {
        let (stream, endpoint) = BackendStream::pair();
        self.opened.fetch_add(1, Ordering::SeqCst);
        let _ = self.endpoints.send(endpoint);
        Ok(stream)
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Nested-shape response carrying a single alternative.
pub fn response(transcript: &str, is_final: bool) -> BackendEvent {
    BackendEvent::Response(RecognitionResponse::from_value(json!({
        "results": [{"alternatives": [{"transcript": transcript}], "isFinal": is_final}]
    })))
}

/// Minimal configuration for in-process servers.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 8080,
        tls: None,
        google_credentials: None,
        google_project_id: None,
        google_location: "global".to_string(),
        google_recognizer: "_".to_string(),
        recognition: RecognitionConfig::default(),
        stream_policy: StreamPolicy::Lazy,
        heartbeat_interval_seconds: 30,
        audio_write_timeout_ms: None,
        cors_allowed_origins: None,
        max_websocket_connections: None,
        max_connections_per_ip: 100,
    }
}

/// Application router wired the way the binary wires it.
pub fn relay_router(state: Arc<AppState>) -> Router {
    let ws_routes = routes::ws::create_ws_router().layer(middleware::from_fn_with_state(
        state.clone(),
        connection_limit_middleware,
    ));

    Router::new()
        .merge(routes::api::create_api_router())
        .merge(ws_routes)
        .with_state(state)
        // in-process `oneshot` requests carry no socket address; real servers override this
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 0))))
}

/// Serve `state` on an ephemeral local port.
pub async fn spawn_server(state: Arc<AppState>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().unwrap();
    let app = relay_router(state);

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    addr
}
