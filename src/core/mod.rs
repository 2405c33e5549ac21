pub mod adapter;
pub mod backend;
pub mod liveness;
pub mod registry;
pub mod session;

// Re-export commonly used types for convenience
pub use adapter::{AdapterEvent, BackendStreamAdapter, WriteOutcome};
pub use backend::{
    BackendError, BackendEvent, BackendStream, RecognitionBackend, RecognitionConfig,
    RecognitionResponse, ResultEvent, StreamEndpoint,
};
pub use liveness::{LivenessMonitor, SweepStats};
pub use registry::{SessionCommand, SessionId, SessionRegistry};
pub use session::{
    ClientEvent, MessageRoute, OutboundReceiver, OutboundSender, Session, SessionReport,
    SessionState, StreamPolicy, TeardownReason, outbound_channel,
};
