//! Backend Stream Adapter
//!
//! Owns at most one streaming recognition call on behalf of a session. Writes are
//! checked against the writability of the call and dropped, never raised, when the
//! call cannot take them. Backend responses are normalized into [`ResultEvent`]s
//! at this boundary.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc::error::SendTimeoutError;
use tracing::{debug, info, warn};

use crate::core::backend::{
    BackendError, BackendEvent, BackendStream, RecognitionBackend, RecognitionConfig, ResultEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    /// No call open; `open` may start one
    Idle,
    /// A call is open
    Open,
    /// Destroyed or failed; no further calls
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NotOpen,
    NotWritable,
    Closed,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Dropped(DropReason),
}

/// What the adapter observed on the open call.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    Result(ResultEvent),
    Error(BackendError),
    /// The backend ended the call without error
    Ended,
}

pub struct BackendStreamAdapter {
    backend: Arc<dyn RecognitionBackend>,
    config: RecognitionConfig,
    stream: Option<BackendStream>,
    state: AdapterState,
    destroyed: bool,
    streams_opened: u32,
    write_timeout: Option<Duration>,
}

impl BackendStreamAdapter {
    pub fn new(backend: Arc<dyn RecognitionBackend>, config: RecognitionConfig) -> Self {
        Self {
            backend,
            config,
            stream: None,
            state: AdapterState::Idle,
            destroyed: false,
            streams_opened: 0,
            write_timeout: None,
        }
    }

    /// Drop writes that cannot be enqueued within `timeout`.
    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn state(&self) -> AdapterState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == AdapterState::Open
    }

    pub fn is_writable(&self) -> bool {
        self.state == AdapterState::Open && self.stream.as_ref().is_some_and(|s| s.is_writable())
    }

    /// Number of calls opened over the adapter's lifetime.
    pub fn streams_opened(&self) -> u32 {
        self.streams_opened
    }

    /// Open a call unless one is already open. Fails once the adapter is closed.
    pub async fn open(&mut self) -> Result<(), BackendError> {
        match self.state {
            AdapterState::Open => return Ok(()),
            AdapterState::Closed => return Err(BackendError::StreamClosed),
            AdapterState::Idle => {}
        }

        let stream = self.backend.open_stream(&self.config).await?;

        // destroy() may not interleave here: both take &mut self
        self.stream = Some(stream);
        self.state = AdapterState::Open;
        self.streams_opened += 1;

        info!(
            backend = self.backend.name(),
            streams_opened = self.streams_opened,
            "Recognition stream opened"
        );
        Ok(())
    }

    /// Forward one audio chunk. Never fails: chunks that cannot be written are
    /// reported as dropped.
    pub async fn write(&mut self, chunk: Bytes) -> WriteOutcome {
        match self.state {
            AdapterState::Idle => return WriteOutcome::Dropped(DropReason::NotOpen),
            AdapterState::Closed => return WriteOutcome::Dropped(DropReason::Closed),
            AdapterState::Open => {}
        }

        let Some(stream) = self.stream.as_ref() else {
            return WriteOutcome::Dropped(DropReason::NotOpen);
        };
        if !stream.is_writable() {
            return WriteOutcome::Dropped(DropReason::NotWritable);
        }

        let sender = stream.audio_sender();
        let result = match self.write_timeout {
            Some(timeout) => sender.send_timeout(chunk, timeout).await,
            None => sender.send(chunk).await.map_err(|e| SendTimeoutError::Closed(e.0)),
        };

        match result {
            Ok(()) => WriteOutcome::Written,
            Err(SendTimeoutError::Timeout(_)) => {
                warn!("Audio write timed out, dropping chunk");
                WriteOutcome::Dropped(DropReason::Timeout)
            }
            Err(SendTimeoutError::Closed(_)) => WriteOutcome::Dropped(DropReason::NotWritable),
        }
    }

    /// Wait for the next event on the open call. Pending forever while no call is
    /// open, so it can sit in a `select!` next to other sources.
    ///
    /// Cancel safe.
    pub async fn next_event(&mut self) -> AdapterEvent {
        let Some(stream) = self.stream.as_mut() else {
            return std::future::pending().await;
        };

        loop {
            match stream.recv().await {
                Some(BackendEvent::Response(response)) => match response.to_event() {
                    Some(event) => return AdapterEvent::Result(event),
                    None => debug!("Backend response without alternatives, skipping"),
                },
                Some(BackendEvent::Error(e)) => return AdapterEvent::Error(e),
                None => return AdapterEvent::Ended,
            }
        }
    }

    /// Release a call the backend ended gracefully; a later `open` starts a new one.
    pub fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.close();
        }
        if self.state == AdapterState::Open {
            self.state = AdapterState::Idle;
        }
    }

    /// Close after a backend error. No further writes or opens are accepted.
    pub fn fail(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.close();
        }
        self.state = AdapterState::Closed;
    }

    /// Release the call immediately, whatever the state. Returns `true` only for
    /// the first call.
    pub fn destroy(&mut self) -> bool {
        if self.destroyed {
            return false;
        }
        self.destroyed = true;
        if let Some(stream) = self.stream.take() {
            stream.close();
        }
        self.state = AdapterState::Closed;
        true
    }
}

impl Drop for BackendStreamAdapter {
    fn drop(&mut self) {
        self.destroy();
    }
}
