//! Google Gemini `generateContent` backend.
//!
//! Sends the instruction and the inline video in a single request:
//!
//! ```text
//! POST {base}/v1beta/models/{model}:generateContent?key=...
//! {"contents":[{"parts":[{"text": ...},{"inline_data":{"mime_type": ...,"data": ...}}]}]}
//! ```
//!
//! and reads `candidates[0].content.parts[0].text` from the reply.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use super::{AnalysisError, AnalysisRequest, VideoAnalyzer};
use crate::config::GeminiConfig;

/// Default Gemini API base URL.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default model for video analysis.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Gemini-backed [`VideoAnalyzer`].
///
/// No overall request timeout is applied unless [`with_timeout`](Self::with_timeout)
/// is used; a long clip can take the model a while.
pub struct GeminiAnalyzer {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for GeminiAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiAnalyzer")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl GeminiAnalyzer {
    /// Create a new Gemini analyzer.
    ///
    /// # Arguments
    /// * `api_key` - Google AI Studio API key
    pub fn new(api_key: String) -> Result<Self, AnalysisError> {
        if api_key.trim().is_empty() {
            return Err(AnalysisError::NotConfigured(
                "Gemini API key must not be empty".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AnalysisError::NotConfigured(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            timeout: None,
        })
    }

    /// Build from the `gemini` config section. Fails with `NotConfigured`
    /// when no API key is set.
    pub fn from_config(config: &GeminiConfig) -> Result<Self, AnalysisError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            AnalysisError::NotConfigured(
                "no Gemini API key; set COURTSIDE_GEMINI_API_KEY or gemini.apiKey".to_string(),
            )
        })?;
        let mut analyzer = Self::new(api_key)?
            .with_base_url(config.base_url.clone())
            .with_model(config.model.clone());
        if let Some(secs) = config.timeout_secs {
            analyzer = analyzer.with_timeout(Duration::from_secs(secs));
        }
        Ok(analyzer)
    }

    /// Set a custom base URL (e.g., for proxy or testing).
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Set a custom model.
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    /// Bound the whole request, upload included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Endpoint URL including the `key` query parameter.
    fn endpoint(&self) -> Result<Url, AnalysisError> {
        let raw = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let mut url = Url::parse(&raw).map_err(|e| {
            AnalysisError::NotConfigured(format!("invalid Gemini endpoint '{raw}': {e}"))
        })?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }
}

#[async_trait]
impl VideoAnalyzer for GeminiAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<String, AnalysisError> {
        let url = self.endpoint()?;
        let body = build_request_body(request);

        tracing::debug!(
            endpoint = %url.path(),
            mime_type = %request.payload().mime_type(),
            payload_len = request.payload().data().len(),
            "Sending Gemini generateContent request"
        );

        let mut builder = self.client.post(url).json(&body);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        // without_url(): the URL carries the API key
        let response = builder
            .send()
            .await
            .map_err(|e| AnalysisError::RequestFailed {
                status: None,
                message: format!("HTTP request failed: {}", e.without_url()),
            })?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|e| AnalysisError::RequestFailed {
                status: Some(status.as_u16()),
                message: format!("failed to read response body: {}", e.without_url()),
            })?;

        if !status.is_success() {
            let message = error_message_from_body(&body_text)
                .unwrap_or_else(|| format!("Gemini API returned HTTP {status}"));
            return Err(AnalysisError::RequestFailed {
                status: Some(status.as_u16()),
                message,
            });
        }

        // a 2xx body that is not a JSON envelope carries no candidate text
        let resp_body: Value = serde_json::from_str(&body_text).map_err(|e| {
            tracing::warn!(status = status.as_u16(), error = %e, "Gemini response is not JSON");
            AnalysisError::EmptyResult
        })?;

        if let Some(message) = resp_body
            .pointer("/error/message")
            .and_then(|m| m.as_str())
        {
            return Err(AnalysisError::RequestFailed {
                status: Some(status.as_u16()),
                message: message.to_string(),
            });
        }

        if let Some(tokens) = resp_body
            .pointer("/usageMetadata/totalTokenCount")
            .and_then(|v| v.as_u64())
        {
            tracing::debug!(tokens, model = %self.model, "Gemini token usage");
        }

        extract_candidate_text(&resp_body)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Build the `generateContent` body: instruction first, then the inline video.
fn build_request_body(request: &AnalysisRequest) -> Value {
    serde_json::json!({
        "contents": [{
            "parts": [
                { "text": request.instruction() },
                {
                    "inline_data": {
                        "mime_type": request.payload().mime_type(),
                        "data": request.payload().data(),
                    }
                }
            ]
        }]
    })
}

/// Text of the first part of the first candidate.
fn extract_candidate_text(response: &Value) -> Result<String, AnalysisError> {
    response
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(|t| t.as_str())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or(AnalysisError::EmptyResult)
}

/// `error.message` from a Gemini error envelope, if the body is one.
fn error_message_from_body(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .and_then(|m| m.as_str())
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
}
