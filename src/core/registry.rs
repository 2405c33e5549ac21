//! Live session set shared by the server loop and the liveness monitor.
//!
//! Each entry carries the session's liveness record and a control channel. Sessions
//! are deregistered by dropping the [`RegistrationGuard`] they receive on
//! registration, which happens once they reach `CLOSED`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tokio::sync::{Notify, mpsc};
use tracing::debug;
use uuid::Uuid;

pub type SessionId = Uuid;

/// Control messages delivered to a session outside the audio path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Send a liveness probe to the client
    Probe,
    /// Terminate the connection
    Evict,
}

/// Liveness flag of one session. Written by the monitor and by the session when
/// the client acknowledges a probe.
#[derive(Debug, Clone)]
pub struct LivenessRecord(Arc<AtomicBool>);

impl Default for LivenessRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl LivenessRecord {
    /// New records start alive.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn mark_alive(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clear the flag, returning whether it was set.
    pub fn check_and_reset(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Registry-side view of a session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: SessionId,
    pub liveness: LivenessRecord,
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    /// Deliver a command; `false` when the session has already stopped listening.
    pub fn send(&self, command: SessionCommand) -> bool {
        self.commands.send(command).is_ok()
    }
}

/// Everything a newly registered session needs.
#[derive(Debug)]
pub struct SessionRegistration {
    pub id: SessionId,
    pub liveness: LivenessRecord,
    pub commands: mpsc::UnboundedReceiver<SessionCommand>,
    pub guard: RegistrationGuard,
}

/// Removes the session from the registry when dropped.
#[derive(Debug)]
pub struct RegistrationGuard {
    id: SessionId,
    registry: Arc<SessionRegistry>,
}

impl RegistrationGuard {
    pub fn id(&self) -> SessionId {
        self.id
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.registry.deregister(&self.id);
    }
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionHandle>,
    drained: Notify,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(self: &Arc<Self>) -> SessionRegistration {
        let id = Uuid::new_v4();
        let liveness = LivenessRecord::new();
        let (tx, rx) = mpsc::unbounded_channel();

        self.sessions.insert(
            id,
            SessionHandle {
                id,
                liveness: liveness.clone(),
                commands: tx,
            },
        );
        debug!(session_id = %id, active = self.sessions.len(), "Session registered");

        SessionRegistration {
            id,
            liveness,
            commands: rx,
            guard: RegistrationGuard {
                id,
                registry: Arc::clone(self),
            },
        }
    }

    /// Remove a session. Returns `false` if it was not registered.
    pub fn deregister(&self, id: &SessionId) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            debug!(session_id = %id, active = self.sessions.len(), "Session deregistered");
        }
        if self.sessions.is_empty() {
            self.drained.notify_waiters();
        }
        removed
    }

    /// Clone of the current handles. Holds no lock once returned.
    pub fn snapshot(&self) -> Vec<SessionHandle> {
        self.sessions.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Resolve once no session is registered.
    pub async fn wait_until_empty(&self) {
        loop {
            let notified = self.drained.notified();
            if self.sessions.is_empty() {
                return;
            }
            notified.await;
        }
    }
}
