//! Google Cloud Speech-to-Text (v2) streaming backend.

pub mod auth;
pub mod client;
pub mod error;
pub mod provider;
pub mod streaming;

pub use auth::{CredentialSource, GoogleAuthClient, TokenProvider};
pub use error::GoogleError;
pub use provider::{GoogleBackend, GoogleSettings, recognizer_path};

pub const GOOGLE_CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

pub const GOOGLE_SPEECH_ENDPOINT: &str = "https://speech.googleapis.com";
