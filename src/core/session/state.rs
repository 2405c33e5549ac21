use std::fmt;

use crate::core::backend::BackendError;

/// Lifecycle of a session.
///
/// `Idle -> Opening -> Active -> Closing -> Closed`. An `Active` session whose
/// backend call ends gracefully returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Opening,
    Active,
    Closing,
    Closed,
}

impl SessionState {
    pub fn is_terminating(&self) -> bool {
        matches!(self, SessionState::Closing | SessionState::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Opening => "opening",
            SessionState::Active => "active",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// When the backend call is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamPolicy {
    /// On the first audio chunk
    #[default]
    Lazy,
    /// As soon as the connection is accepted
    Eager,
}

impl std::str::FromStr for StreamPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lazy" => Ok(StreamPolicy::Lazy),
            "eager" => Ok(StreamPolicy::Eager),
            other => Err(format!("Invalid stream policy '{other}', expected 'lazy' or 'eager'")),
        }
    }
}

/// Why a session was torn down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownReason {
    ClientClosed,
    ClientError(String),
    BackendError(BackendError),
    Evicted,
    ServerShutdown,
}

impl fmt::Display for TeardownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeardownReason::ClientClosed => write!(f, "client closed"),
            TeardownReason::ClientError(e) => write!(f, "client error: {e}"),
            TeardownReason::BackendError(e) => write!(f, "backend error: {e}"),
            TeardownReason::Evicted => write!(f, "liveness eviction"),
            TeardownReason::ServerShutdown => write!(f, "server shutdown"),
        }
    }
}
