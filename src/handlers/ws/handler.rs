//! Axum WebSocket handler
//!
//! Splits the socket into a reader task that turns frames into
//! [`ClientEvent`]s and a writer task that drains [`MessageRoute`]s, and runs
//! the [`Session`] between them on the connection task.

use std::net::IpAddr;
use std::sync::Arc;

use axum::{
    Extension,
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::registry::{LivenessRecord, SessionId};
use crate::core::session::{ClientEvent, MessageRoute, OutboundReceiver, Session, outbound_channel};
use crate::middleware::ClientIp;
use crate::state::AppState;

/// Optimized channel buffer size for audio workloads
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// How long the writer may keep flushing once the session has ended
const WRITER_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// WebSocket relay handler
///
/// Upgrades the HTTP connection and relays its audio to a new recognition
/// session. `ClientIp` is present when the connection limit middleware admitted
/// the request; its slot is released when the connection ends.
pub async fn ws_relay_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    client_ip: Option<Extension<ClientIp>>,
) -> Response {
    let client_ip = client_ip.map(|Extension(ClientIp(ip))| ip);
    debug!(client_ip = ?client_ip, "Relay WebSocket upgrade requested");

    let failed_state = state.clone();
    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_failed_upgrade(move |e| {
            warn!(error = %e, "WebSocket upgrade failed");
            if let Some(ip) = client_ip {
                failed_state.release_connection(ip);
            }
        })
        .on_upgrade(move |socket| handle_relay_socket(socket, state, client_ip))
}

async fn handle_relay_socket(socket: WebSocket, state: Arc<AppState>, client_ip: Option<IpAddr>) {
    let registration = state.registry.register();
    let session_id = registration.id;
    info!(
        session_id = %session_id,
        client_ip = ?client_ip,
        active = state.registry.len(),
        "Relay connection established"
    );

    let (sender, receiver) = socket.split();
    let (route_tx, route_rx) = outbound_channel(CHANNEL_BUFFER_SIZE);
    let (event_tx, event_rx) = mpsc::channel::<ClientEvent>(CHANNEL_BUFFER_SIZE);

    let session = Session::new(
        registration,
        state.session_adapter(),
        route_tx,
        state.config.stream_policy,
    );

    let mut writer = tokio::spawn(write_routes(sender, route_rx, session_id));
    let reader = tokio::spawn(read_frames(
        receiver,
        event_tx,
        session.liveness(),
        session.hangup_token(),
        session_id,
    ));

    let report = session.run(event_rx, state.shutdown.clone()).await;

    reader.abort();

    // The session owned the only route sender, so the writer finishes once it
    // has flushed what is queued and the final route.
    if tokio::time::timeout(WRITER_FLUSH_TIMEOUT, &mut writer)
        .await
        .is_err()
    {
        warn!(session_id = %session_id, "Client not draining, dropping connection");
        writer.abort();
    }

    if let Some(ip) = client_ip {
        state.release_connection(ip);
    }

    info!(
        session_id = %session_id,
        reason = ?report.reason,
        streams_opened = report.stats.streams_opened,
        chunks_written = report.stats.chunks_written,
        chunks_dropped = report.stats.chunks_dropped,
        results_forwarded = report.stats.results_forwarded,
        results_discarded = report.stats.results_discarded,
        probes_sent = report.stats.probes_sent,
        "Relay connection terminated"
    );
}

/// Turn inbound frames into session events until the client goes away.
///
/// The reader never waits on the session: pongs mark the liveness record
/// directly, audio is dropped when the session is behind, and a hangup is
/// signalled on `hangup` as well as the event channel.
async fn read_frames(
    mut receiver: SplitStream<WebSocket>,
    events: mpsc::Sender<ClientEvent>,
    liveness: LivenessRecord,
    hangup: CancellationToken,
    session_id: SessionId,
) {
    while let Some(frame) = receiver.next().await {
        let terminal = match frame {
            Ok(Message::Binary(data)) => {
                match events.try_send(ClientEvent::Audio(data)) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        warn!(session_id = %session_id, "Session behind, dropping audio chunk");
                    }
                    Err(TrySendError::Closed(_)) => return,
                }
                continue;
            }
            Ok(Message::Pong(_)) => {
                liveness.mark_alive();
                debug!(session_id = %session_id, "Liveness probe acknowledged");
                continue;
            }
            Ok(Message::Text(text)) => {
                debug!(session_id = %session_id, bytes = text.len(), "Ignoring text frame");
                continue;
            }
            // Ping replies are sent automatically by axum
            Ok(Message::Ping(_)) => continue,
            Ok(Message::Close(frame)) => {
                debug!(session_id = %session_id, frame = ?frame, "Client sent close frame");
                ClientEvent::Closed
            }
            Err(e) => {
                debug!(session_id = %session_id, error = %e, "WebSocket receive failed");
                ClientEvent::Error(e.to_string())
            }
        };

        let _ = events.try_send(terminal);
        hangup.cancel();
        return;
    }

    let _ = events.try_send(ClientEvent::Closed);
    hangup.cancel();
}

/// Deliver routes to the client until a final route or a send failure.
async fn write_routes(
    mut sender: SplitSink<WebSocket, Message>,
    mut routes: OutboundReceiver,
    session_id: SessionId,
) {
    while let Some(route) = routes.recv().await {
        let result = match route {
            MessageRoute::Transcript(event) => match event.to_json() {
                Ok(json) => sender.send(Message::Text(json.into())).await,
                Err(e) => {
                    error!(session_id = %session_id, error = %e, "Failed to serialize transcript");
                    continue;
                }
            },
            MessageRoute::Ping => sender.send(Message::Ping(Bytes::new())).await,
            MessageRoute::Close { code, reason } => {
                info!(session_id = %session_id, code, reason = %reason, "Closing client connection");
                let frame = CloseFrame {
                    code,
                    reason: reason.into(),
                };
                if let Err(e) = sender.send(Message::Close(Some(frame))).await {
                    debug!(session_id = %session_id, error = %e, "Close frame not delivered");
                }
                return;
            }
            MessageRoute::Terminate => {
                debug!(session_id = %session_id, "Dropping connection without close handshake");
                return;
            }
        };

        if let Err(e) = result {
            debug!(session_id = %session_id, error = %e, "Failed to send WebSocket message");
            return;
        }
    }
}
