//! Streaming speech-recognition backends.
//!
//! A [`RecognitionBackend`] is an already-authenticated factory for streaming
//! recognition calls. Each call is represented by a [`BackendStream`]: a bounded
//! audio sender, a receiver of [`BackendEvent`]s and a cancellation token that
//! releases the call. The backend drives the other end through a
//! [`StreamEndpoint`].

pub mod config;
pub mod error;
pub mod google;
pub mod response;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use config::{AudioEncoding, RecognitionConfig};
pub use error::BackendError;
pub use response::{RecognitionResponse, ResponseShape, ResultEvent};

/// Audio chunks buffered between the session and the backend call.
pub const AUDIO_CHANNEL_BUFFER_SIZE: usize = 32;

/// Backend events buffered before the session reads them.
pub const EVENT_CHANNEL_BUFFER_SIZE: usize = 64;

/// Event produced by a backend stream. The event channel closing without an
/// `Error` means the backend ended the stream gracefully.
#[derive(Debug, Clone)]
pub enum BackendEvent {
    Response(RecognitionResponse),
    Error(BackendError),
}

/// Session-side handle of one streaming recognition call.
///
/// Dropping the handle releases the call.
#[derive(Debug)]
pub struct BackendStream {
    audio_tx: mpsc::Sender<Bytes>,
    events: mpsc::Receiver<BackendEvent>,
    cancel: CancellationToken,
}

/// Backend-side half of a [`BackendStream`].
#[derive(Debug)]
pub struct StreamEndpoint {
    pub audio_rx: mpsc::Receiver<Bytes>,
    pub events_tx: mpsc::Sender<BackendEvent>,
    pub cancel: CancellationToken,
}

impl BackendStream {
    /// Create a connected stream/endpoint pair.
    pub fn pair() -> (BackendStream, StreamEndpoint) {
        let (audio_tx, audio_rx) = mpsc::channel(AUDIO_CHANNEL_BUFFER_SIZE);
        let (events_tx, events) = mpsc::channel(EVENT_CHANNEL_BUFFER_SIZE);
        let cancel = CancellationToken::new();

        (
            BackendStream {
                audio_tx,
                events,
                cancel: cancel.clone(),
            },
            StreamEndpoint {
                audio_rx,
                events_tx,
                cancel,
            },
        )
    }

    pub fn audio_sender(&self) -> &mpsc::Sender<Bytes> {
        &self.audio_tx
    }

    /// Whether the backend still accepts audio on this stream.
    pub fn is_writable(&self) -> bool {
        !self.cancel.is_cancelled() && !self.audio_tx.is_closed()
    }

    pub async fn recv(&mut self) -> Option<BackendEvent> {
        self.events.recv().await
    }

    /// Release the underlying call. Safe to call more than once.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for BackendStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Factory for streaming recognition calls.
#[async_trait]
pub trait RecognitionBackend: Send + Sync {
    /// Start one streaming call configured with `config`.
    ///
    /// Implementations return as soon as the call is usable for buffering audio;
    /// connection failures after this point arrive as [`BackendEvent::Error`].
    async fn open_stream(&self, config: &RecognitionConfig) -> Result<BackendStream, BackendError>;

    /// Backend name for logging.
    fn name(&self) -> &'static str;
}
