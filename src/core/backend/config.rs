use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Audio encodings accepted from clients.
///
/// Container formats (`WebmOpus`, `OggOpus`, `Flac`) carry their own headers and are
/// decoded by the backend automatically. Raw formats need an explicit sample rate and
/// channel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioEncoding {
    WebmOpus,
    OggOpus,
    Flac,
    Linear16,
    Mulaw,
    Alaw,
}

impl AudioEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioEncoding::WebmOpus => "webm_opus",
            AudioEncoding::OggOpus => "ogg_opus",
            AudioEncoding::Flac => "flac",
            AudioEncoding::Linear16 => "linear16",
            AudioEncoding::Mulaw => "mulaw",
            AudioEncoding::Alaw => "alaw",
        }
    }

    /// Whether the encoding is self-describing (container with headers).
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            AudioEncoding::WebmOpus | AudioEncoding::OggOpus | AudioEncoding::Flac
        )
    }
}

impl fmt::Display for AudioEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "webm_opus" | "webm" => Ok(AudioEncoding::WebmOpus),
            "ogg_opus" | "ogg" | "opus" => Ok(AudioEncoding::OggOpus),
            "flac" => Ok(AudioEncoding::Flac),
            "linear16" | "pcm" | "pcm16" => Ok(AudioEncoding::Linear16),
            "mulaw" | "ulaw" => Ok(AudioEncoding::Mulaw),
            "alaw" => Ok(AudioEncoding::Alaw),
            other => Err(format!("Unsupported audio encoding: {other}")),
        }
    }
}

/// Recognition settings applied to every stream opened for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionConfig {
    pub encoding: AudioEncoding,
    pub sample_rate: u32,
    pub channels: u16,
    /// Primary BCP-47 language hint, e.g. "en-US"
    pub language: String,
    /// Additional languages the backend may detect
    pub alternative_languages: Vec<String>,
    pub punctuation: bool,
    pub interim_results: bool,
    pub model: String,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            encoding: AudioEncoding::WebmOpus,
            sample_rate: 48_000,
            channels: 1,
            language: "en-US".to_string(),
            alternative_languages: Vec::new(),
            punctuation: true,
            interim_results: true,
            model: "long".to_string(),
        }
    }
}

impl RecognitionConfig {
    /// Primary language first, followed by de-duplicated alternatives.
    pub fn language_codes(&self) -> Vec<String> {
        let mut codes = vec![self.language.clone()];
        for lang in &self.alternative_languages {
            if !lang.is_empty() && !codes.contains(lang) {
                codes.push(lang.clone());
            }
        }
        codes
    }
}
