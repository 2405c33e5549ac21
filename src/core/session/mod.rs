//! Session
//!
//! Pairs one client connection with one [`BackendStreamAdapter`]. The session is a
//! single task that reacts to three typed sources: client events, backend events
//! and registry commands. All state transitions happen on that task, so audio
//! writes and transcript deliveries for one session are strictly ordered and the
//! adapter is never opened twice concurrently.
//!
//! Outbound traffic goes through a bounded channel to the connection writer and
//! is never awaited: a client that stops reading loses transcripts instead of
//! stalling its session. The final close route has a slot of its own.
//!
//! A backend write that cannot make progress still yields to shutdown, client
//! hangup and registry commands.

mod events;
mod outbound;
mod state;


use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::adapter::{AdapterEvent, BackendStreamAdapter, WriteOutcome};
use crate::core::backend::ResultEvent;
use crate::core::registry::{
    LivenessRecord, RegistrationGuard, SessionCommand, SessionId, SessionRegistration,
};

pub use events::{
    CLOSE_BACKEND_ERROR, CLOSE_BACKEND_ERROR_REASON, CLOSE_GOING_AWAY, CLOSE_GOING_AWAY_REASON,
    ClientEvent, MessageRoute,
};
pub use outbound::{OutboundReceiver, OutboundSender, outbound_channel};
pub use state::{SessionState, StreamPolicy, TeardownReason};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub streams_opened: u32,
    pub chunks_written: u64,
    pub chunks_dropped: u64,
    pub results_forwarded: u64,
    pub results_discarded: u64,
    pub probes_sent: u64,
    /// Teardown requests seen, including ignored repeats
    pub teardown_triggers: u32,
}

/// Summary returned when a session finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub id: SessionId,
    pub state: SessionState,
    pub reason: Option<TeardownReason>,
    pub stats: SessionStats,
}

pub struct Session {
    id: SessionId,
    state: SessionState,
    policy: StreamPolicy,
    adapter: BackendStreamAdapter,
    outbound: OutboundSender,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    liveness: LivenessRecord,
    hangup: CancellationToken,
    registration: Option<RegistrationGuard>,
    teardown: Option<TeardownReason>,
    stats: SessionStats,
}

impl Session {
    pub fn new(
        registration: SessionRegistration,
        adapter: BackendStreamAdapter,
        outbound: OutboundSender,
        policy: StreamPolicy,
    ) -> Self {
        let SessionRegistration {
            id,
            liveness,
            commands,
            guard,
        } = registration;

        Self {
            id,
            state: SessionState::Idle,
            policy,
            adapter,
            outbound,
            commands,
            liveness,
            hangup: CancellationToken::new(),
            registration: Some(guard),
            teardown: None,
            stats: SessionStats::default(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Liveness record of this session, for acknowledging probes off the data path.
    pub fn liveness(&self) -> LivenessRecord {
        self.liveness.clone()
    }

    /// Token the connection reader cancels once the client is gone. Lets a
    /// pending backend write give up without waiting for the inbound queue.
    pub fn hangup_token(&self) -> CancellationToken {
        self.hangup.clone()
    }

    /// Drive the session until it reaches `Closed`.
    ///
    /// `inbound` closing counts as a client disconnect. `shutdown` closes the
    /// client with 1001.
    pub async fn run(
        mut self,
        mut inbound: mpsc::Receiver<ClientEvent>,
        shutdown: CancellationToken,
    ) -> SessionReport {
        info!(session_id = %self.id, policy = ?self.policy, "Session started");

        if self.policy == StreamPolicy::Eager {
            self.ensure_stream().await;
        }

        while self.state != SessionState::Closed {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => {
                    self.teardown(TeardownReason::ServerShutdown);
                }
                Some(command) = self.commands.recv() => {
                    self.handle_command(command);
                }
                event = self.adapter.next_event() => {
                    self.handle_adapter_event(event).await;
                }
                event = inbound.recv() => match event {
                    Some(event) => self.handle_client_event(event, &shutdown).await,
                    None => self.teardown(TeardownReason::ClientClosed),
                },
                () = self.hangup.cancelled() => {
                    self.teardown(TeardownReason::ClientClosed);
                }
            }
        }

        self.report()
    }

    fn report(&self) -> SessionReport {
        let mut stats = self.stats;
        stats.streams_opened = self.adapter.streams_opened();
        SessionReport {
            id: self.id,
            state: self.state,
            reason: self.teardown.clone(),
            stats,
        }
    }

    /// Open the backend call if none is open. Returns whether the session is
    /// `Active` afterwards.
    async fn ensure_stream(&mut self) -> bool {
        match self.state {
            SessionState::Active => return true,
            SessionState::Idle => {}
            SessionState::Opening | SessionState::Closing | SessionState::Closed => return false,
        }

        self.state = SessionState::Opening;
        match self.adapter.open().await {
            Ok(()) => {
                self.state = SessionState::Active;
                true
            }
            Err(e) => {
                error!(session_id = %self.id, error = %e, "Failed to open recognition stream");
                self.teardown(TeardownReason::BackendError(e));
                false
            }
        }
    }

    async fn handle_client_event(&mut self, event: ClientEvent, shutdown: &CancellationToken) {
        match event {
            ClientEvent::Audio(chunk) => self.on_audio(chunk, shutdown).await,
            ClientEvent::Pong => {
                self.liveness.mark_alive();
                debug!(session_id = %self.id, "Liveness probe acknowledged");
            }
            ClientEvent::Closed => self.teardown(TeardownReason::ClientClosed),
            ClientEvent::Error(e) => self.teardown(TeardownReason::ClientError(e)),
        }
    }

    async fn on_audio(&mut self, chunk: Bytes, shutdown: &CancellationToken) {
        if !self.ensure_stream().await {
            self.stats.chunks_dropped += 1;
            return;
        }

        let len = chunk.len();
        let outcome = {
            let write = self.adapter.write(chunk);
            tokio::pin!(write);

            loop {
                tokio::select! {
                    biased;

                    () = shutdown.cancelled() => break Err(TeardownReason::ServerShutdown),
                    () = self.hangup.cancelled() => break Err(TeardownReason::ClientClosed),
                    Some(command) = self.commands.recv() => match command {
                        SessionCommand::Evict => break Err(TeardownReason::Evicted),
                        SessionCommand::Probe => {
                            send_probe(&self.outbound, &mut self.stats, self.id);
                        }
                    },
                    outcome = &mut write => break Ok(outcome),
                }
            }
        };

        match outcome {
            Ok(WriteOutcome::Written) => self.stats.chunks_written += 1,
            Ok(WriteOutcome::Dropped(reason)) => {
                self.stats.chunks_dropped += 1;
                debug!(session_id = %self.id, bytes = len, ?reason, "Dropped audio chunk");
            }
            Err(reason) => {
                self.stats.chunks_dropped += 1;
                debug!(session_id = %self.id, bytes = len, trigger = %reason, "Audio write interrupted");
                self.teardown(reason);
            }
        }
    }

    async fn handle_adapter_event(&mut self, event: AdapterEvent) {
        match event {
            AdapterEvent::Result(result) => self.forward(result),
            AdapterEvent::Error(e) => {
                warn!(session_id = %self.id, kind = e.kind(), error = %e, "Recognition stream failed");
                self.teardown(TeardownReason::BackendError(e));
            }
            AdapterEvent::Ended => {
                info!(session_id = %self.id, "Recognition stream ended by backend");
                self.adapter.release();
                if self.state == SessionState::Active {
                    self.state = SessionState::Idle;
                }
                if self.policy == StreamPolicy::Eager {
                    self.ensure_stream().await;
                }
            }
        }
    }

    fn forward(&mut self, result: ResultEvent) {
        if self.state != SessionState::Active || self.outbound.is_closed() {
            self.stats.results_discarded += 1;
            return;
        }

        match self.outbound.try_send(MessageRoute::Transcript(result)) {
            Ok(()) => self.stats.results_forwarded += 1,
            Err(TrySendError::Full(_)) => {
                warn!(session_id = %self.id, "Client not keeping up, dropping transcript");
                self.stats.results_discarded += 1;
            }
            Err(TrySendError::Closed(_)) => self.stats.results_discarded += 1,
        }
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Probe => {
                if self.state.is_terminating() {
                    return;
                }
                send_probe(&self.outbound, &mut self.stats, self.id);
            }
            SessionCommand::Evict => self.teardown(TeardownReason::Evicted),
        }
    }

    /// Release the client connection and the backend call. Only the first call
    /// has any effect.
    fn teardown(&mut self, reason: TeardownReason) {
        self.stats.teardown_triggers += 1;
        if self.teardown.is_some() {
            debug!(session_id = %self.id, trigger = %reason, "Session already torn down");
            return;
        }

        self.state = SessionState::Closing;

        let route = match &reason {
            TeardownReason::BackendError(_) => Some(MessageRoute::backend_error()),
            TeardownReason::ServerShutdown => Some(MessageRoute::going_away()),
            TeardownReason::Evicted => Some(MessageRoute::Terminate),
            TeardownReason::ClientClosed | TeardownReason::ClientError(_) => None,
        };
        let expects_close = route.is_some();
        if !self.outbound.finish(route) && expects_close {
            debug!(session_id = %self.id, "Connection gone before close");
        }

        if matches!(reason, TeardownReason::BackendError(_)) {
            self.adapter.fail();
        }
        self.adapter.destroy();

        // leaving the registry stops further probes
        self.registration.take();
        self.state = SessionState::Closed;

        info!(
            session_id = %self.id,
            reason = %reason,
            streams_opened = self.adapter.streams_opened(),
            chunks_written = self.stats.chunks_written,
            chunks_dropped = self.stats.chunks_dropped,
            results_forwarded = self.stats.results_forwarded,
            "Session closed"
        );
        self.teardown = Some(reason);
    }
}

fn send_probe(outbound: &OutboundSender, stats: &mut SessionStats, id: SessionId) {
    match outbound.try_send(MessageRoute::Ping) {
        Ok(()) => stats.probes_sent += 1,
        Err(e) => debug!(session_id = %id, error = %e, "Probe not sent"),
    }
}
