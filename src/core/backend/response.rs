//! Recognition response shapes and their normalization into [`ResultEvent`].
//!
//! Backends report results in one of two layouts:
//!
//! ```json
//! {"results": [{"alternatives": [{"transcript": "hi"}], "isFinal": true}]}
//! {"alternatives": [{"transcript": "hi"}], "isFinal": true}
//! ```
//!
//! Both collapse to the same [`ResultEvent`]. A response without any alternative
//! produces no event at all. Missing or mistyped fields fall back to empty values
//! one field at a time, so a bad `confidence` never costs the transcript.

use google_api_proto::google::cloud::speech::v2::StreamingRecognizeResponse;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// Read a field as `None` when it is present but of the wrong type.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// A single recognition hypothesis.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpeechAlternative {
    #[serde(deserialize_with = "lenient")]
    pub transcript: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub confidence: Option<f32>,
}

/// One result segment carrying ranked alternatives.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpeechResult {
    #[serde(deserialize_with = "lenient")]
    pub alternatives: Option<Vec<SpeechAlternative>>,
    #[serde(deserialize_with = "lenient")]
    pub is_final: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub language_code: Option<String>,
}

/// Raw response as delivered by a backend stream.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecognitionResponse {
    #[serde(deserialize_with = "lenient")]
    pub results: Option<Vec<SpeechResult>>,
    /// Alternatives reported directly on the response object
    #[serde(flatten)]
    pub top_level: SpeechResult,
}

/// Which layout a response uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResponseShape<'a> {
    /// `results[0]` holds the alternatives
    Nested(&'a SpeechResult),
    /// Alternatives sit on the response itself
    TopLevel(&'a SpeechResult),
    /// Nothing to report
    Empty,
}

/// Normalized transcript fragment relayed to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEvent {
    pub transcript: String,
    pub is_final: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
}

impl ResultEvent {
    pub fn new(transcript: impl Into<String>, is_final: bool) -> Self {
        Self {
            transcript: transcript.into(),
            is_final,
            language_code: None,
        }
    }

    pub fn with_language(mut self, language_code: impl Into<String>) -> Self {
        self.language_code = Some(language_code.into());
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl RecognitionResponse {
    /// Parse an arbitrary JSON payload. Anything that does not fit the expected
    /// layout yields an empty response.
    pub fn from_value(value: serde_json::Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    pub fn nested(results: Vec<SpeechResult>) -> Self {
        Self {
            results: Some(results),
            top_level: SpeechResult::default(),
        }
    }

    pub fn shape(&self) -> ResponseShape<'_> {
        if let Some(first) = self.results.as_ref().and_then(|r| r.first()) {
            return ResponseShape::Nested(first);
        }
        if self.top_level.alternatives.is_some() {
            return ResponseShape::TopLevel(&self.top_level);
        }
        ResponseShape::Empty
    }

    /// Collapse the response into a single event, or `None` when no alternative
    /// is present.
    pub fn to_event(&self) -> Option<ResultEvent> {
        let result = match self.shape() {
            ResponseShape::Nested(result) | ResponseShape::TopLevel(result) => result,
            ResponseShape::Empty => return None,
        };

        let best = result.alternatives.as_ref()?.first()?;

        Some(ResultEvent {
            transcript: best.transcript.clone().unwrap_or_default(),
            is_final: result.is_final.unwrap_or(false),
            language_code: result
                .language_code
                .as_ref()
                .filter(|code| !code.is_empty())
                .cloned(),
        })
    }
}

impl From<StreamingRecognizeResponse> for RecognitionResponse {
    fn from(response: StreamingRecognizeResponse) -> Self {
        let results = response
            .results
            .into_iter()
            .map(|result| SpeechResult {
                alternatives: Some(
                    result
                        .alternatives
                        .into_iter()
                        .map(|alt| SpeechAlternative {
                            transcript: Some(alt.transcript),
                            confidence: Some(alt.confidence),
                        })
                        .collect(),
                ),
                is_final: Some(result.is_final),
                language_code: Some(result.language_code),
            })
            .collect();

        RecognitionResponse::nested(results)
    }
}
