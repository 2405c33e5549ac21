use tonic::metadata::{Ascii, MetadataValue};
use tonic::transport::{Channel, ClientTlsConfig};
use tracing::{debug, error};

use super::GOOGLE_SPEECH_ENDPOINT;
use super::error::GoogleError;

/// Speech API endpoint serving `location`. Regional recognizers must be reached
/// through their regional host.
pub fn speech_endpoint(location: &str) -> String {
    if location.is_empty() || location == "global" {
        GOOGLE_SPEECH_ENDPOINT.to_string()
    } else {
        format!("https://{location}-speech.googleapis.com")
    }
}

/// Build a TLS channel to `endpoint`. The connection is established on first use
/// and shared by every stream opened over the channel.
pub fn create_grpc_channel(endpoint: &str) -> Result<Channel, GoogleError> {
    let channel = Channel::from_shared(endpoint.to_string())
        .map_err(|e| {
            error!(error = %e, endpoint = %endpoint, "Invalid endpoint URL");
            GoogleError::ConfigurationError(format!("Invalid endpoint URL '{endpoint}': {e}"))
        })?
        .tls_config(ClientTlsConfig::new())
        .map_err(|e| {
            error!(error = %e, "Failed to configure TLS");
            GoogleError::ConnectionFailed(format!("Failed to configure TLS: {e}"))
        })?
        .connect_lazy();

    debug!(endpoint = %endpoint, "Created lazy gRPC channel");
    Ok(channel)
}

/// Attaches a bearer token to every request made through a client.
#[derive(Clone)]
pub struct BearerInterceptor {
    value: MetadataValue<Ascii>,
}

impl BearerInterceptor {
    pub fn new(token: &str) -> Result<Self, GoogleError> {
        let value = format!("Bearer {token}").parse().map_err(|_| {
            GoogleError::AuthenticationFailed("Failed to parse authorization header".to_string())
        })?;
        Ok(Self { value })
    }
}

impl tonic::service::Interceptor for BearerInterceptor {
    fn call(&mut self, mut request: tonic::Request<()>) -> Result<tonic::Request<()>, tonic::Status> {
        request
            .metadata_mut()
            .insert("authorization", self.value.clone());
        Ok(request)
    }
}
