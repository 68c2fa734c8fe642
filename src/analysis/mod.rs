//! Submission of accepted clips to a hosted multimodal model.
//!
//! [`submit`] runs one attempt: encode the file, pair it with the fixed
//! [`ANALYSIS_PROMPT`], hand the request to a [`VideoAnalyzer`] and return the
//! text it produced. There is no retry at any layer.

pub mod gemini;
pub mod prompt;

use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;

use crate::media::{encode, EncodedPayload, EncodingFailed, MediaFile};

pub use gemini::GeminiAnalyzer;
pub use prompt::{ANALYSIS_PROMPT, NOT_BADMINTON_REPLY};

/// Message reported when the response envelope carries no text.
pub const EMPTY_RESULT_MESSAGE: &str = "no analysis result received";

/// Failures of a submission attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error(transparent)]
    EncodingFailed(#[from] EncodingFailed),

    #[error("no analysis result received")]
    EmptyResult,

    /// Transport failure, non-2xx status or an error envelope. `message`
    /// is the remote's own error message whenever one was provided.
    #[error("analysis request failed: {message}")]
    RequestFailed {
        status: Option<u16>,
        message: String,
    },

    #[error("analyzer not configured: {0}")]
    NotConfigured(String),
}

impl AnalysisError {
    /// Stable tag used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::EncodingFailed(_) => "EncodingFailed",
            AnalysisError::EmptyResult => "EmptyResult",
            AnalysisError::RequestFailed { .. } => "RequestFailed",
            AnalysisError::NotConfigured(_) => "NotConfigured",
        }
    }
}

/// One clip plus the fixed instruction. Built once per attempt.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    instruction: &'static str,
    payload: EncodedPayload,
}

impl AnalysisRequest {
    pub fn new(payload: EncodedPayload) -> Self {
        Self {
            instruction: ANALYSIS_PROMPT,
            payload,
        }
    }

    pub fn instruction(&self) -> &str {
        self.instruction
    }

    pub fn payload(&self) -> &EncodedPayload {
        &self.payload
    }
}

/// Backend that turns an [`AnalysisRequest`] into formatted text.
///
/// Implementations make exactly one remote call per invocation.
#[async_trait]
pub trait VideoAnalyzer: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<String, AnalysisError>;

    /// Short provider name for logs (e.g. "gemini").
    fn name(&self) -> &str;
}

/// Run a single analysis attempt for an already validated file.
pub async fn submit(
    file: &MediaFile,
    analyzer: &dyn VideoAnalyzer,
) -> Result<String, AnalysisError> {
    let started = Instant::now();
    let payload = encode(file).await?;
    let request = AnalysisRequest::new(payload);

    let result = analyzer.analyze(&request).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &result {
        Ok(text) => tracing::info!(
            file = %file.name(),
            provider = analyzer.name(),
            elapsed_ms,
            result_len = text.len(),
            "Video analysis completed"
        ),
        Err(e) => tracing::warn!(
            file = %file.name(),
            provider = analyzer.name(),
            elapsed_ms,
            kind = e.kind(),
            error = %e,
            "Video analysis failed"
        ),
    }
    result
}
