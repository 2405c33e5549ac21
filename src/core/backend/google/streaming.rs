use bytes::Bytes;
use google_api_proto::google::cloud::speech::v2::{
    AutoDetectDecodingConfig, ExplicitDecodingConfig, RecognitionConfig as ProtoRecognitionConfig,
    RecognitionFeatures, StreamingRecognitionConfig, StreamingRecognitionFeatures,
    StreamingRecognizeRequest, explicit_decoding_config::AudioEncoding as ProtoEncoding,
    recognition_config::DecodingConfig, streaming_recognize_request::StreamingRequest,
};
use tracing::{debug, error, warn};

use crate::core::backend::{AudioEncoding, BackendError, RecognitionConfig};

/// Largest audio payload sent in a single request message.
pub const MAX_AUDIO_CHUNK_SIZE: usize = 25 * 1024;

fn decoding_config(config: &RecognitionConfig) -> DecodingConfig {
    let encoding = match config.encoding {
        AudioEncoding::Linear16 => ProtoEncoding::Linear16,
        AudioEncoding::Mulaw => ProtoEncoding::Mulaw,
        AudioEncoding::Alaw => ProtoEncoding::Alaw,
        AudioEncoding::WebmOpus | AudioEncoding::OggOpus | AudioEncoding::Flac => {
            return DecodingConfig::AutoDecodingConfig(AutoDetectDecodingConfig {});
        }
    };

    DecodingConfig::ExplicitDecodingConfig(ExplicitDecodingConfig {
        encoding: encoding as i32,
        sample_rate_hertz: config.sample_rate as i32,
        audio_channel_count: config.channels as i32,
    })
}

/// First message of every stream: recognizer and recognition settings.
pub fn build_config_request(recognizer: &str, config: &RecognitionConfig) -> StreamingRecognizeRequest {
    let recognition_config = ProtoRecognitionConfig {
        decoding_config: Some(decoding_config(config)),
        model: config.model.clone(),
        language_codes: config.language_codes(),
        features: Some(RecognitionFeatures {
            enable_automatic_punctuation: config.punctuation,
            ..Default::default()
        }),
        ..Default::default()
    };

    let streaming_config = StreamingRecognitionConfig {
        config: Some(recognition_config),
        config_mask: None,
        streaming_features: Some(StreamingRecognitionFeatures {
            interim_results: config.interim_results,
            ..Default::default()
        }),
    };

    StreamingRecognizeRequest {
        recognizer: recognizer.to_string(),
        streaming_request: Some(StreamingRequest::StreamingConfig(streaming_config)),
    }
}

#[inline]
pub fn build_audio_request(audio: Bytes, recognizer: String) -> StreamingRecognizeRequest {
    StreamingRecognizeRequest {
        recognizer,
        streaming_request: Some(StreamingRequest::Audio(audio)),
    }
}

/// Split a client frame into request-sized slices without copying.
pub fn chunk_audio(audio: Bytes) -> impl Iterator<Item = Bytes> {
    let len = audio.len();
    (0..len)
        .step_by(MAX_AUDIO_CHUNK_SIZE)
        .map(move |start| audio.slice(start..(start + MAX_AUDIO_CHUNK_SIZE).min(len)))
}

/// Map a gRPC status to a backend error, logging at a level matching its severity.
pub fn handle_grpc_error(status: tonic::Status) -> BackendError {
    let code = status.code();
    let message = status.message().to_string();

    match code {
        tonic::Code::Unauthenticated | tonic::Code::PermissionDenied => {
            error!(code = ?code, message = %message, "Speech API rejected credentials");
            BackendError::AuthenticationFailed(message)
        }
        tonic::Code::InvalidArgument => {
            error!(code = ?code, message = %message, "Speech API rejected request or audio");
            BackendError::ConfigurationError(message)
        }
        tonic::Code::ResourceExhausted => {
            warn!(code = ?code, message = %message, "Speech API quota exceeded");
            BackendError::QuotaExceeded(message)
        }
        tonic::Code::Unavailable | tonic::Code::DeadlineExceeded => {
            warn!(code = ?code, message = %message, "Speech API unavailable");
            BackendError::NetworkError(format!("{code}: {message}"))
        }
        tonic::Code::Cancelled => {
            debug!(code = ?code, message = %message, "Speech API call cancelled");
            BackendError::ProviderError(format!("Request cancelled: {message}"))
        }
        _ => {
            error!(code = ?code, message = %message, "Speech API error");
            BackendError::ProviderError(format!("gRPC error {code}: {message}"))
        }
    }
}
