//! Credential loading and access-token issuance for Google Cloud.
//!
//! The credential setting accepts three forms:
//!
//! - empty: Application Default Credentials (ADC)
//! - a JSON object: inline service-account key, as injected by secret managers
//! - anything else: path to a service-account or authorized-user JSON file

use std::path::Path;

use async_trait::async_trait;
use google_cloud_auth::credentials::{
    Builder as CredentialsBuilder, CacheableResource, Credentials, service_account, user_account,
};
use http::Extensions;
use tracing::{debug, error};

use super::error::GoogleError;

/// Where Google credentials come from.
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialSource {
    ApplicationDefault,
    JsonContent(String),
    FilePath(String),
}

impl CredentialSource {
    /// Classify a raw credential setting.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            CredentialSource::ApplicationDefault
        } else if trimmed.starts_with('{') {
            CredentialSource::JsonContent(trimmed.to_string())
        } else {
            CredentialSource::FilePath(trimmed.to_string())
        }
    }

    /// Reject malformed JSON, path traversal and missing files before any
    /// network activity.
    pub fn validate(&self) -> Result<(), GoogleError> {
        match self {
            CredentialSource::ApplicationDefault => Ok(()),
            CredentialSource::JsonContent(json) => {
                let value: serde_json::Value = serde_json::from_str(json).map_err(|e| {
                    GoogleError::ConfigurationError(format!("Invalid credentials JSON: {e}"))
                })?;
                if !value.is_object() {
                    return Err(GoogleError::ConfigurationError(
                        "Invalid credentials JSON: must be a JSON object".to_string(),
                    ));
                }
                Ok(())
            }
            CredentialSource::FilePath(path) => {
                if path.contains("..") {
                    return Err(GoogleError::ConfigurationError(
                        "Invalid credential file path: path traversal not allowed".to_string(),
                    ));
                }
                if !Path::new(path).exists() {
                    return Err(GoogleError::ConfigurationError(format!(
                        "Credential file not found: {path}"
                    )));
                }
                Ok(())
            }
        }
    }

    fn read_json(&self) -> Option<serde_json::Value> {
        let content = match self {
            CredentialSource::ApplicationDefault => {
                let path = std::env::var("GOOGLE_APPLICATION_CREDENTIALS").ok()?;
                std::fs::read_to_string(path).ok()?
            }
            CredentialSource::JsonContent(json) => json.clone(),
            CredentialSource::FilePath(path) => std::fs::read_to_string(path).ok()?,
        };
        serde_json::from_str(&content).ok()
    }

    /// Project id embedded in the credentials, if any.
    pub fn project_id(&self) -> Option<String> {
        self.read_json()?
            .get("project_id")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

/// Issues OAuth2 bearer tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_token(&self) -> Result<String, GoogleError>;
}

/// Token provider backed by `google-cloud-auth` credentials. Tokens are cached
/// and refreshed by the underlying credentials object.
pub struct GoogleAuthClient {
    credentials: Credentials,
}

impl std::fmt::Debug for GoogleAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleAuthClient")
            .field("credentials", &"<redacted>")
            .finish()
    }
}

impl GoogleAuthClient {
    pub fn new(source: &CredentialSource, scopes: &[&str]) -> Result<Self, GoogleError> {
        source.validate()?;
        let scopes: Vec<String> = scopes.iter().map(|s| s.to_string()).collect();

        let credentials = match source {
            CredentialSource::ApplicationDefault => CredentialsBuilder::default()
                .with_scopes(scopes)
                .build()
                .map_err(|e| {
                    error!(error = %e, "Failed to load Application Default Credentials");
                    GoogleError::AuthenticationFailed(format!(
                        "Failed to load Application Default Credentials: {e}"
                    ))
                })?,
            CredentialSource::JsonContent(json) => {
                let value: serde_json::Value = serde_json::from_str(json).map_err(|e| {
                    GoogleError::ConfigurationError(format!("Invalid credentials JSON: {e}"))
                })?;
                Self::from_json(value, scopes, "inline credentials")?
            }
            CredentialSource::FilePath(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    GoogleError::ConfigurationError(format!(
                        "Failed to read credentials file '{path}': {e}"
                    ))
                })?;
                let value: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
                    GoogleError::ConfigurationError(format!(
                        "Failed to parse credentials file '{path}': {e}"
                    ))
                })?;
                Self::from_json(value, scopes, path)?
            }
        };

        debug!("Google credentials loaded");
        Ok(Self { credentials })
    }

    fn from_json(
        value: serde_json::Value,
        scopes: Vec<String>,
        origin: &str,
    ) -> Result<Credentials, GoogleError> {
        let cred_type = value
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("service_account")
            .to_string();

        let built = match cred_type.as_str() {
            "service_account" => service_account::Builder::new(value)
                .with_access_specifier(service_account::AccessSpecifier::from_scopes(scopes))
                .build(),
            "authorized_user" => user_account::Builder::new(value).with_scopes(scopes).build(),
            other => {
                return Err(GoogleError::ConfigurationError(format!(
                    "Unsupported credential type '{other}' in {origin}"
                )));
            }
        };

        built.map_err(|e| {
            error!(error = %e, origin = %origin, "Failed to build credentials");
            GoogleError::AuthenticationFailed(format!(
                "Failed to build {cred_type} credentials from {origin}: {e}"
            ))
        })
    }
}

/// Pull the bearer token out of the headers produced by the credentials object.
fn bearer_token(headers: CacheableResource<http::HeaderMap>) -> Result<String, GoogleError> {
    let header_map = match headers {
        CacheableResource::New { data, .. } => data,
        CacheableResource::NotModified => {
            return Err(GoogleError::AuthenticationFailed(
                "Credentials returned no headers".to_string(),
            ));
        }
    };

    let value = header_map
        .get(http::header::AUTHORIZATION)
        .ok_or_else(|| {
            GoogleError::AuthenticationFailed("Missing Authorization header".to_string())
        })?
        .to_str()
        .map_err(|e| GoogleError::AuthenticationFailed(format!("Invalid Authorization header: {e}")))?;

    value
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or_else(|| {
            GoogleError::AuthenticationFailed("Authorization header is not a Bearer token".to_string())
        })
}

#[async_trait]
impl TokenProvider for GoogleAuthClient {
    async fn get_token(&self) -> Result<String, GoogleError> {
        let headers = self
            .credentials
            .headers(Extensions::new())
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch access token");
                GoogleError::AuthenticationFailed(format!("Failed to fetch access token: {e}"))
            })?;

        bearer_token(headers)
    }
}

#[cfg(test)]
pub(crate) struct MockTokenProvider {
    pub token: Result<String, String>,
}

#[cfg(test)]
#[async_trait]
impl TokenProvider for MockTokenProvider {
    async fn get_token(&self) -> Result<String, GoogleError> {
        self.token
            .clone()
            .map_err(GoogleError::AuthenticationFailed)
    }
}
