use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present here
/// override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8080
///   tls:
///     enabled: true
///     cert_path: "/etc/stt-relay/cert.pem"
///     key_path: "/etc/stt-relay/key.pem"
///
/// google:
///   credentials: "/path/to/service-account.json"
///   project_id: "my-project"
///   location: "global"
///   recognizer: "_"
///
/// recognition:
///   encoding: "webm_opus"
///   sample_rate: 48000
///   channels: 1
///   language: "en-US"
///   alternative_languages: ["fr-FR", "de-DE"]
///   punctuation: true
///   interim_results: true
///   model: "long"
///
/// session:
///   stream_policy: "lazy"
///   heartbeat_interval_seconds: 30
///   audio_write_timeout_ms: 500
///
/// security:
///   cors_allowed_origins: "https://example.com"
///   max_websocket_connections: 1000
///   max_connections_per_ip: 100
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub google: Option<GoogleYaml>,
    pub recognition: Option<RecognitionYaml>,
    pub session: Option<SessionYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Google Cloud Speech-to-Text settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GoogleYaml {
    /// Google Cloud credentials - can be:
    /// - Path to service account JSON file
    /// - Inline JSON content (for secrets management)
    /// - Empty string to use Application Default Credentials
    pub credentials: Option<String>,
    pub project_id: Option<String>,
    pub location: Option<String>,
    pub recognizer: Option<String>,
}

/// Recognition parameters from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RecognitionYaml {
    pub encoding: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub language: Option<String>,
    #[serde(default)]
    pub alternative_languages: Vec<String>,
    pub punctuation: Option<bool>,
    pub interim_results: Option<bool>,
    pub model: Option<String>,
}

/// Session behavior from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionYaml {
    /// "lazy" or "eager"
    pub stream_policy: Option<String>,
    pub heartbeat_interval_seconds: Option<u64>,
    pub audio_write_timeout_ms: Option<u64>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,
    /// Maximum concurrent WebSocket connections
    pub max_websocket_connections: Option<usize>,
    /// Maximum connections per IP address
    pub max_connections_per_ip: Option<u32>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Required fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 9000
  tls:
    enabled: true
    cert_path: "/certs/cert.pem"
    key_path: "/certs/key.pem"

google:
  credentials: "/secrets/sa.json"
  project_id: "relay-project"
  location: "europe-west4"
  recognizer: "my-recognizer"

recognition:
  encoding: "linear16"
  sample_rate: 16000
  channels: 2
  language: "fr-FR"
  alternative_languages: ["en-US", "de-DE"]
  punctuation: false
  interim_results: false
  model: "short"

session:
  stream_policy: "eager"
  heartbeat_interval_seconds: 15
  audio_write_timeout_ms: 250

security:
  cors_allowed_origins: "*"
  max_websocket_connections: 500
  max_connections_per_ip: 10
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        let server = config.server.unwrap();
        assert_eq!(server.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(server.port, Some(9000));
        let tls = server.tls.unwrap();
        assert_eq!(tls.enabled, Some(true));
        assert_eq!(tls.cert_path.as_deref(), Some("/certs/cert.pem"));

        let google = config.google.unwrap();
        assert_eq!(google.project_id.as_deref(), Some("relay-project"));
        assert_eq!(google.location.as_deref(), Some("europe-west4"));

        let recognition = config.recognition.unwrap();
        assert_eq!(recognition.encoding.as_deref(), Some("linear16"));
        assert_eq!(recognition.sample_rate, Some(16000));
        assert_eq!(recognition.channels, Some(2));
        assert_eq!(recognition.alternative_languages, vec!["en-US", "de-DE"]);
        assert_eq!(recognition.punctuation, Some(false));

        let session = config.session.unwrap();
        assert_eq!(session.stream_policy.as_deref(), Some("eager"));
        assert_eq!(session.heartbeat_interval_seconds, Some(15));
        assert_eq!(session.audio_write_timeout_ms, Some(250));

        let security = config.security.unwrap();
        assert_eq!(security.max_websocket_connections, Some(500));
        assert_eq!(security.max_connections_per_ip, Some(10));
    }

    #[test]
    fn test_yaml_config_partial() {
        let yaml = r#"
session:
  heartbeat_interval_seconds: 10
"#;
        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        assert!(config.server.is_none());
        assert!(config.google.is_none());
        let session = config.session.unwrap();
        assert_eq!(session.heartbeat_interval_seconds, Some(10));
        assert!(session.stream_policy.is_none());
    }

    #[test]
    fn test_yaml_config_empty() {
        let config: YamlConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.server.is_none());
        assert!(config.recognition.is_none());
        assert!(config.security.is_none());
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "server:\n  host: \"localhost\"\n  port: 3000\n").unwrap();

        let config = YamlConfig::from_file(&config_path).unwrap();

        let server = config.server.unwrap();
        assert_eq!(server.host.as_deref(), Some("localhost"));
        assert_eq!(server.port, Some(3000));
    }

    #[test]
    fn test_from_file_not_found() {
        let path = PathBuf::from("/nonexistent/config.yaml");
        let result = YamlConfig::from_file(&path);

        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }

    #[test]
    fn test_from_file_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.yaml");
        fs::write(&config_path, "invalid: yaml: content:").unwrap();

        let result = YamlConfig::from_file(&config_path);

        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse YAML")
        );
    }
}
