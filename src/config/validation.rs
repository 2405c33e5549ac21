use super::{ServerConfig, TlsConfig};
use crate::core::backend::google::CredentialSource;

/// Validate TLS configuration
///
/// When TLS is enabled both the certificate and the private key must exist.
pub fn validate_tls(tls: &Option<TlsConfig>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(tls) = tls else {
        return Ok(());
    };

    if !tls.cert_path.exists() {
        return Err(format!(
            "TLS certificate file does not exist: {}",
            tls.cert_path.display()
        )
        .into());
    }
    if !tls.key_path.exists() {
        return Err(format!(
            "TLS private key file does not exist: {}",
            tls.key_path.display()
        )
        .into());
    }

    Ok(())
}

/// Validate the Google credential source
///
/// Inline JSON must parse as an object; a file path must exist and must not
/// contain parent-directory components. Unset or empty means Application
/// Default Credentials and is always accepted here.
pub fn validate_google_credentials(
    credentials: &Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(raw) = credentials else {
        return Ok(());
    };

    CredentialSource::parse(raw)
        .validate()
        .map_err(|e| format!("Invalid GOOGLE_APPLICATION_CREDENTIALS: {e}").into())
}

/// Validate recognition and session parameters
pub fn validate_recognition(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.port == 0 {
        return Err("PORT must be greater than 0".into());
    }
    if config.recognition.sample_rate == 0 {
        return Err("RECOGNITION_SAMPLE_RATE must be greater than 0".into());
    }
    if config.recognition.channels == 0 {
        return Err("RECOGNITION_CHANNELS must be greater than 0".into());
    }
    if config.recognition.language.trim().is_empty() {
        return Err("RECOGNITION_LANGUAGE cannot be empty".into());
    }
    if config.heartbeat_interval_seconds == 0 {
        return Err("HEARTBEAT_INTERVAL_SECONDS must be greater than 0".into());
    }
    if config.audio_write_timeout_ms == Some(0) {
        return Err("AUDIO_WRITE_TIMEOUT_MS must be greater than 0 when set".into());
    }
    if config.max_websocket_connections == Some(0) {
        return Err("MAX_WEBSOCKET_CONNECTIONS must be greater than 0 when set".into());
    }
    if config.max_connections_per_ip == 0 {
        return Err("MAX_CONNECTIONS_PER_IP must be greater than 0".into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_validate_tls_disabled() {
        assert!(validate_tls(&None).is_ok());
    }

    #[test]
    fn test_validate_tls_missing_files() {
        let tls = Some(TlsConfig {
            cert_path: PathBuf::from("/nonexistent/cert.pem"),
            key_path: PathBuf::from("/nonexistent/key.pem"),
        });

        let err = validate_tls(&tls).unwrap_err().to_string();
        assert!(err.contains("certificate file does not exist"));
    }

    #[test]
    fn test_validate_tls_existing_files() {
        let temp_dir = TempDir::new().unwrap();
        let cert_path = temp_dir.path().join("cert.pem");
        let key_path = temp_dir.path().join("key.pem");
        fs::write(&cert_path, "cert").unwrap();
        fs::write(&key_path, "key").unwrap();

        assert!(validate_tls(&Some(TlsConfig { cert_path, key_path })).is_ok());
    }

    #[test]
    fn test_validate_google_credentials() {
        assert!(validate_google_credentials(&None).is_ok());
        assert!(validate_google_credentials(&Some(String::new())).is_ok());
        assert!(validate_google_credentials(&Some(r#"{"type": "service_account"}"#.into())).is_ok());

        assert!(validate_google_credentials(&Some("{not json".into())).is_err());
        assert!(validate_google_credentials(&Some("/nonexistent/sa.json".into())).is_err());
        assert!(validate_google_credentials(&Some("../secrets/sa.json".into())).is_err());
    }
}
