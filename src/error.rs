//! Error types for the enrichment pipeline.
//!
//! Each subsystem gets its own error enum; `PipelineError` is the umbrella
//! caught at the orchestrator boundary. A caught error is wrapped into an
//! [`ErrorEnvelope`] carrying a fresh correlation id so a single failure can
//! be traced across logs without a stack trace.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::queue::QueueError;

/// Errors that can occur while resolving a target into an article.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Direct conversion was requested on a target without pre-filled content.
    #[error("target '{url}' is not scraped; cannot convert to article")]
    NotScraped { url: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The fetched page produced no usable title or body text.
    #[error("no article content extracted from '{url}'")]
    EmptyContent { url: String },

    #[error("invalid selector: {0}")]
    Selector(String),

    #[error("scrape timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

/// Errors that can occur during vector-space construction.
#[derive(Debug, Error)]
pub enum ScoreError {
    /// The engine was constructed without background documents.
    #[error("background corpus is empty")]
    EmptyCorpus,

    #[error("invalid token pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Umbrella for every per-message failure caught at the orchestrator.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("scrape failed: {0}")]
    Scrape(#[from] ScrapeError),

    #[error("scoring failed: {0}")]
    Score(#[from] ScoreError),

    #[error("publish failed: {0}")]
    Publish(#[from] QueueError),
}

/// Structured envelope logged for every caught pipeline failure.
///
/// The id is freshly generated per wrap; the message is the source error's
/// display text.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub id: Uuid,
    pub message: String,
}

impl ErrorEnvelope {
    pub fn wrap(error: &PipelineError) -> Self {
        Self {
            id: Uuid::new_v4(),
            message: error.to_string(),
        }
    }
}

impl std::fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => write!(f, "{json}"),
            Err(_) => write!(
                f,
                "{{\"id\":\"{}\",\"message\":\"{}\"}}",
                self.id, self.message
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_preserves_message() {
        let err = PipelineError::Scrape(ScrapeError::EmptyContent {
            url: "https://example.com".to_string(),
        });
        let envelope = ErrorEnvelope::wrap(&err);
        assert!(envelope.message.contains("scrape failed"));
        assert!(envelope.message.contains("https://example.com"));
    }

    #[test]
    fn test_envelope_ids_are_unique() {
        let err = PipelineError::Score(ScoreError::EmptyCorpus);
        let a = ErrorEnvelope::wrap(&err);
        let b = ErrorEnvelope::wrap(&err);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_envelope_display_is_json() {
        let err = PipelineError::Score(ScoreError::EmptyCorpus);
        let envelope = ErrorEnvelope::wrap(&err);
        let parsed: serde_json::Value = serde_json::from_str(&envelope.to_string()).unwrap();
        assert_eq!(parsed["id"], envelope.id.to_string());
        assert_eq!(parsed["message"], envelope.message);
    }
}
