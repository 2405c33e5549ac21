use bytes::Bytes;

use crate::core::backend::ResultEvent;

/// Close code sent when the backend call fails.
pub const CLOSE_BACKEND_ERROR: u16 = 1011;
pub const CLOSE_BACKEND_ERROR_REASON: &str = "backend error";

/// Close code sent when the server shuts down.
pub const CLOSE_GOING_AWAY: u16 = 1001;
pub const CLOSE_GOING_AWAY_REASON: &str = "server shutting down";

/// Inbound events from the client connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Audio(Bytes),
    /// Acknowledgment of a liveness probe
    Pong,
    /// The client closed the connection
    Closed,
    /// The connection failed
    Error(String),
}

/// Outbound instructions for the connection writer.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageRoute {
    /// Send a transcript as a JSON text frame
    Transcript(ResultEvent),
    /// Send a liveness probe
    Ping,
    /// Send a close frame and stop writing
    Close { code: u16, reason: String },
    /// Drop the connection without a close handshake
    Terminate,
}

impl MessageRoute {
    pub fn backend_error() -> Self {
        MessageRoute::Close {
            code: CLOSE_BACKEND_ERROR,
            reason: CLOSE_BACKEND_ERROR_REASON.to_string(),
        }
    }

    pub fn going_away() -> Self {
        MessageRoute::Close {
            code: CLOSE_GOING_AWAY,
            reason: CLOSE_GOING_AWAY_REASON.to_string(),
        }
    }

    /// Whether the writer stops after delivering this route.
    pub fn is_final(&self) -> bool {
        matches!(self, MessageRoute::Close { .. } | MessageRoute::Terminate)
    }
}
