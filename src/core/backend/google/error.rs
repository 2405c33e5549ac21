use crate::core::backend::BackendError;

/// Errors raised while preparing Google Cloud credentials and transport.
#[derive(Debug, thiserror::Error)]
pub enum GoogleError {
    /// Credentials could not be loaded or a token could not be issued
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid project, location or credential source
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The gRPC channel could not be built
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
}

impl From<GoogleError> for BackendError {
    fn from(e: GoogleError) -> Self {
        match e {
            GoogleError::AuthenticationFailed(msg) => BackendError::AuthenticationFailed(msg),
            GoogleError::ConfigurationError(msg) => BackendError::ConfigurationError(msg),
            GoogleError::ConnectionFailed(msg) => BackendError::ConnectionFailed(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GoogleError::ConfigurationError("Missing project ID".to_string());
        assert_eq!(err.to_string(), "Configuration error: Missing project ID");
    }

    #[test]
    fn test_into_backend_error() {
        let err: BackendError = GoogleError::AuthenticationFailed("expired".to_string()).into();
        assert_eq!(err, BackendError::AuthenticationFailed("expired".to_string()));

        let err: BackendError = GoogleError::ConnectionFailed("refused".to_string()).into();
        assert_eq!(err, BackendError::ConnectionFailed("refused".to_string()));
    }
}
