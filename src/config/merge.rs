use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::utils::{parse_bool, parse_list};
use super::yaml::YamlConfig;
use super::{ServerConfig, TlsConfig};
use crate::core::backend::{AudioEncoding, RecognitionConfig};
use crate::core::session::StreamPolicy;

/// Read and parse an environment variable. Unset is `None`, unparsable is an error.
fn env_parsed<T>(name: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid {name} environment variable: {e}").into()),
        Err(_) => Ok(None),
    }
}

fn env_bool(name: &str) -> Result<Option<bool>, Box<dyn std::error::Error>> {
    match env::var(name) {
        Ok(raw) => parse_bool(&raw)
            .map(Some)
            .ok_or_else(|| format!("Invalid {name} environment variable: '{raw}'").into()),
        Err(_) => Ok(None),
    }
}

/// Merge YAML configuration with environment variables
///
/// Priority order (highest to lowest):
/// 1. YAML configuration values
/// 2. Environment variables
/// 3. Default values
pub fn merge_config(
    yaml_config: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let yaml = yaml_config.unwrap_or_default();

    // Helper macro to get value with priority: YAML > ENV > Default
    macro_rules! get_value {
        ($env_var:expr, $yaml_value:expr, $default:expr) => {
            $yaml_value
                .or_else(|| env::var($env_var).ok())
                .unwrap_or_else(|| $default.to_string())
        };
    }

    // Helper macro for optional values: YAML > ENV
    macro_rules! get_optional {
        ($env_var:expr, $yaml_value:expr) => {
            $yaml_value.or_else(|| env::var($env_var).ok())
        };
    }

    // Helper macro for parsed values: YAML > ENV (parsed) > Default
    macro_rules! get_parsed {
        ($env_var:expr, $yaml_value:expr, $default:expr) => {
            match $yaml_value {
                Some(value) => value,
                None => env_parsed($env_var)?.unwrap_or($default),
            }
        };
    }

    // Server configuration
    let server = yaml.server.as_ref();
    let host = get_value!("HOST", server.and_then(|s| s.host.clone()), "0.0.0.0");
    let port: u16 = get_parsed!("PORT", server.and_then(|s| s.port), 8080);

    let tls_yaml = server.and_then(|s| s.tls.as_ref());
    let tls_enabled = match tls_yaml.and_then(|t| t.enabled) {
        Some(enabled) => enabled,
        None => env_bool("TLS_ENABLED")?.unwrap_or(false),
    };
    let tls = if tls_enabled {
        let cert_path = get_optional!("TLS_CERT_PATH", tls_yaml.and_then(|t| t.cert_path.clone()))
            .ok_or("TLS_CERT_PATH is required when TLS is enabled")?;
        let key_path = get_optional!("TLS_KEY_PATH", tls_yaml.and_then(|t| t.key_path.clone()))
            .ok_or("TLS_KEY_PATH is required when TLS is enabled")?;
        Some(TlsConfig {
            cert_path: PathBuf::from(cert_path),
            key_path: PathBuf::from(key_path),
        })
    } else {
        None
    };

    // Google Cloud configuration (credentials can be a path, JSON content, or empty for ADC)
    let google = yaml.google.as_ref();
    let google_credentials = get_optional!(
        "GOOGLE_APPLICATION_CREDENTIALS",
        google.and_then(|g| g.credentials.clone())
    );
    let google_project_id =
        get_optional!("GOOGLE_PROJECT_ID", google.and_then(|g| g.project_id.clone()))
            .filter(|p| !p.trim().is_empty());
    let google_location = get_value!(
        "GOOGLE_LOCATION",
        google.and_then(|g| g.location.clone()),
        "global"
    );
    let google_recognizer = get_value!(
        "GOOGLE_RECOGNIZER",
        google.and_then(|g| g.recognizer.clone()),
        "_"
    );

    // Recognition parameters
    let defaults = RecognitionConfig::default();
    let recognition_yaml = yaml.recognition.as_ref();

    let encoding_raw = get_optional!(
        "RECOGNITION_ENCODING",
        recognition_yaml.and_then(|r| r.encoding.clone())
    );
    let encoding = match encoding_raw {
        Some(raw) => raw.parse::<AudioEncoding>()?,
        None => defaults.encoding,
    };

    let alternative_languages = match recognition_yaml {
        Some(r) if !r.alternative_languages.is_empty() => r.alternative_languages.clone(),
        _ => env::var("RECOGNITION_ALTERNATIVE_LANGUAGES")
            .map(|raw| parse_list(&raw))
            .unwrap_or_default(),
    };

    let punctuation = match recognition_yaml.and_then(|r| r.punctuation) {
        Some(value) => value,
        None => env_bool("RECOGNITION_PUNCTUATION")?.unwrap_or(defaults.punctuation),
    };
    let interim_results = match recognition_yaml.and_then(|r| r.interim_results) {
        Some(value) => value,
        None => env_bool("RECOGNITION_INTERIM_RESULTS")?.unwrap_or(defaults.interim_results),
    };

    let recognition = RecognitionConfig {
        encoding,
        sample_rate: get_parsed!(
            "RECOGNITION_SAMPLE_RATE",
            recognition_yaml.and_then(|r| r.sample_rate),
            defaults.sample_rate
        ),
        channels: get_parsed!(
            "RECOGNITION_CHANNELS",
            recognition_yaml.and_then(|r| r.channels),
            defaults.channels
        ),
        language: get_value!(
            "RECOGNITION_LANGUAGE",
            recognition_yaml.and_then(|r| r.language.clone()),
            defaults.language
        ),
        alternative_languages,
        punctuation,
        interim_results,
        model: get_value!(
            "RECOGNITION_MODEL",
            recognition_yaml.and_then(|r| r.model.clone()),
            defaults.model
        ),
    };

    // Session behavior
    let session = yaml.session.as_ref();
    let stream_policy = match get_optional!(
        "STREAM_POLICY",
        session.and_then(|s| s.stream_policy.clone())
    ) {
        Some(raw) => raw.parse::<StreamPolicy>()?,
        None => StreamPolicy::default(),
    };
    let heartbeat_interval_seconds: u64 = get_parsed!(
        "HEARTBEAT_INTERVAL_SECONDS",
        session.and_then(|s| s.heartbeat_interval_seconds),
        30
    );
    let audio_write_timeout_ms = match session.and_then(|s| s.audio_write_timeout_ms) {
        Some(ms) => Some(ms),
        None => env_parsed::<u64>("AUDIO_WRITE_TIMEOUT_MS")?,
    };

    // Security configuration
    let security = yaml.security.as_ref();
    let cors_allowed_origins = get_optional!(
        "CORS_ALLOWED_ORIGINS",
        security.and_then(|s| s.cors_allowed_origins.clone())
    );
    let max_websocket_connections = match security.and_then(|s| s.max_websocket_connections) {
        Some(max) => Some(max),
        None => env_parsed::<usize>("MAX_WEBSOCKET_CONNECTIONS")?,
    };
    let max_connections_per_ip: u32 = get_parsed!(
        "MAX_CONNECTIONS_PER_IP",
        security.and_then(|s| s.max_connections_per_ip),
        100
    );

    Ok(ServerConfig {
        host,
        port,
        tls,
        google_credentials,
        google_project_id,
        google_location,
        google_recognizer,
        recognition,
        stream_policy,
        heartbeat_interval_seconds,
        audio_write_timeout_ms,
        cors_allowed_origins,
        max_websocket_connections,
        max_connections_per_ip,
    })
}
