use std::sync::Arc;

use async_trait::async_trait;
use google_api_proto::google::cloud::speech::v2::StreamingRecognizeRequest;
use google_api_proto::google::cloud::speech::v2::speech_client::SpeechClient;
use tonic::transport::Channel;
use tracing::{debug, error, info};

use crate::core::backend::{
    BackendError, BackendEvent, BackendStream, RecognitionBackend, RecognitionConfig,
    StreamEndpoint,
};

use super::GOOGLE_CLOUD_PLATFORM_SCOPE;
use super::auth::{CredentialSource, GoogleAuthClient, TokenProvider};
use super::client::{BearerInterceptor, create_grpc_channel, speech_endpoint};
use super::error::GoogleError;
use super::streaming::{build_audio_request, build_config_request, chunk_audio, handle_grpc_error};

/// Startup settings for [`GoogleBackend`].
#[derive(Debug, Clone, Default)]
pub struct GoogleSettings {
    /// Empty for ADC, inline JSON or a file path
    pub credentials: String,
    /// Overrides the project id found in the credentials
    pub project_id: Option<String>,
    pub location: String,
    pub recognizer: String,
}

/// Google Cloud Speech-to-Text v2 streaming backend.
///
/// All streams share one lazily connected channel. Each stream runs in its own
/// task and is released when its [`BackendStream`] is closed or dropped.
pub struct GoogleBackend {
    channel: Channel,
    tokens: Arc<dyn TokenProvider>,
    recognizer: String,
}

impl std::fmt::Debug for GoogleBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleBackend")
            .field("recognizer", &self.recognizer)
            .finish()
    }
}

/// Full resource name of a recognizer.
pub fn recognizer_path(project_id: &str, location: &str, recognizer: &str) -> String {
    let location = if location.is_empty() { "global" } else { location };
    let recognizer = if recognizer.is_empty() { "_" } else { recognizer };
    format!("projects/{project_id}/locations/{location}/recognizers/{recognizer}")
}

impl GoogleBackend {
    /// Load credentials and prepare the channel. Any failure here is a startup
    /// failure.
    pub fn new(settings: &GoogleSettings) -> Result<Self, GoogleError> {
        let source = CredentialSource::parse(&settings.credentials);
        let project_id = settings
            .project_id
            .clone()
            .filter(|p| !p.is_empty())
            .or_else(|| source.project_id())
            .ok_or_else(|| {
                GoogleError::ConfigurationError(
                    "Google project id not found in credentials; set GOOGLE_PROJECT_ID"
                        .to_string(),
                )
            })?;

        let auth = GoogleAuthClient::new(&source, &[GOOGLE_CLOUD_PLATFORM_SCOPE])?;
        let channel = create_grpc_channel(&speech_endpoint(&settings.location))?;
        let recognizer = recognizer_path(&project_id, &settings.location, &settings.recognizer);

        info!(recognizer = %recognizer, "Google Speech-to-Text backend ready");
        Ok(Self::with_token_provider(channel, Arc::new(auth), recognizer))
    }

    pub fn with_token_provider(
        channel: Channel,
        tokens: Arc<dyn TokenProvider>,
        recognizer: String,
    ) -> Self {
        Self {
            channel,
            tokens,
            recognizer,
        }
    }

    pub fn recognizer(&self) -> &str {
        &self.recognizer
    }
}

#[async_trait]
impl RecognitionBackend for GoogleBackend {
    async fn open_stream(&self, config: &RecognitionConfig) -> Result<BackendStream, BackendError> {
        let (stream, endpoint) = BackendStream::pair();
        let initial = build_config_request(&self.recognizer, config);

        tokio::spawn(run_stream(
            self.channel.clone(),
            self.tokens.clone(),
            self.recognizer.clone(),
            initial,
            endpoint,
        ));

        Ok(stream)
    }

    fn name(&self) -> &'static str {
        "google"
    }
}

/// Drive one `StreamingRecognize` call until the backend ends it, it fails, or
/// the session releases it.
async fn run_stream(
    channel: Channel,
    tokens: Arc<dyn TokenProvider>,
    recognizer: String,
    initial: StreamingRecognizeRequest,
    endpoint: StreamEndpoint,
) {
    let StreamEndpoint {
        audio_rx,
        events_tx,
        cancel,
    } = endpoint;

    let interceptor = match tokens.get_token().await.and_then(|t| BearerInterceptor::new(&t)) {
        Ok(interceptor) => interceptor,
        Err(e) => {
            error!(error = %e, "Failed to authorize recognition stream");
            let _ = events_tx.send(BackendEvent::Error(e.into())).await;
            return;
        }
    };

    let mut client = SpeechClient::with_interceptor(channel, interceptor);

    let request_cancel = cancel.clone();
    let requests = async_stream::stream! {
        yield initial;

        let mut audio_rx = audio_rx;
        loop {
            tokio::select! {
                biased;

                () = request_cancel.cancelled() => {
                    debug!("Recognition stream released, ending request stream");
                    break;
                }
                audio = audio_rx.recv() => {
                    match audio {
                        Some(data) => {
                            for chunk in chunk_audio(data) {
                                yield build_audio_request(chunk, recognizer.clone());
                            }
                        }
                        None => {
                            debug!("Audio channel closed, ending request stream");
                            break;
                        }
                    }
                }
            }
        }
    };

    let response = tokio::select! {
        () = cancel.cancelled() => return,
        response = client.streaming_recognize(requests) => response,
    };

    let mut responses = match response {
        Ok(response) => response.into_inner(),
        Err(status) => {
            let _ = events_tx
                .send(BackendEvent::Error(handle_grpc_error(status)))
                .await;
            return;
        }
    };

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                debug!("Recognition stream released");
                break;
            }
            message = responses.message() => match message {
                Ok(Some(response)) => {
                    if events_tx.send(BackendEvent::Response(response.into())).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    info!("Recognition stream ended by backend");
                    break;
                }
                Err(status) => {
                    let _ = events_tx
                        .send(BackendEvent::Error(handle_grpc_error(status)))
                        .await;
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::google::auth::MockTokenProvider;
    use tokio::time::{Duration, timeout};

    fn backend(token: Result<String, String>) -> GoogleBackend {
        let channel = Channel::from_static("https://speech.invalid").connect_lazy();
        GoogleBackend::with_token_provider(
            channel,
            Arc::new(MockTokenProvider { token }),
            recognizer_path("p", "global", "_"),
        )
    }

    #[test]
    fn test_recognizer_path() {
        assert_eq!(
            recognizer_path("proj", "global", "_"),
            "projects/proj/locations/global/recognizers/_"
        );
        assert_eq!(
            recognizer_path("proj", "", ""),
            "projects/proj/locations/global/recognizers/_"
        );
        assert_eq!(
            recognizer_path("proj", "us", "custom"),
            "projects/proj/locations/us/recognizers/custom"
        );
    }

    #[test]
    fn test_new_requires_project_id() {
        let settings = GoogleSettings {
            credentials: r#"{"type":"service_account"}"#.to_string(),
            project_id: None,
            location: "global".to_string(),
            recognizer: "_".to_string(),
        };
        let err = GoogleBackend::new(&settings).unwrap_err();
        assert!(err.to_string().contains("project id"));
    }

    #[test]
    fn test_new_rejects_malformed_credentials() {
        let settings = GoogleSettings {
            credentials: "{not json".to_string(),
            project_id: Some("p".to_string()),
            location: "global".to_string(),
            recognizer: "_".to_string(),
        };
        assert!(matches!(
            GoogleBackend::new(&settings),
            Err(GoogleError::ConfigurationError(_))
        ));
    }

    #[tokio::test]
    async fn test_token_failure_surfaces_as_stream_error() {
        let backend = backend(Err("no token".to_string()));
        let mut stream = backend
            .open_stream(&RecognitionConfig::default())
            .await
            .unwrap();

        let event = timeout(Duration::from_secs(5), stream.recv())
            .await
            .unwrap();
        assert!(matches!(
            event,
            Some(BackendEvent::Error(BackendError::AuthenticationFailed(_)))
        ));
    }

    #[tokio::test]
    async fn test_open_stream_returns_immediately() {
        let backend = backend(Ok("token".to_string()));
        let stream = backend
            .open_stream(&RecognitionConfig::default())
            .await
            .unwrap();
        assert!(stream.is_writable());
        stream.close();
        assert!(!stream.is_writable());
    }
}
