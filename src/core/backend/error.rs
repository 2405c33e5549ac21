/// Errors raised by a recognition backend or one of its streams.
///
/// Cloneable so a single failure can be logged, reported and routed through channels.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Credentials rejected or token unavailable
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Request or audio rejected as invalid
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The stream could not be established
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Transport failure or deadline exceeded
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Backend quota or rate limit hit
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Any other backend-side failure
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Operation attempted on a stream that was already released
    #[error("Stream closed")]
    StreamClosed,
}

impl BackendError {
    /// Short machine-readable category used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::AuthenticationFailed(_) => "authentication",
            BackendError::ConfigurationError(_) => "configuration",
            BackendError::ConnectionFailed(_) => "connection",
            BackendError::NetworkError(_) => "network",
            BackendError::QuotaExceeded(_) => "quota",
            BackendError::ProviderError(_) => "provider",
            BackendError::StreamClosed => "closed",
        }
    }
}
