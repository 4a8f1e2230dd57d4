//! AI client error types.

use thiserror::Error;

pub type AiResult<T> = Result<T, AiError>;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Request failed with status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AiError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            429 => Self::RateLimited(body),
            408 | 504 => Self::ServiceUnavailable(format!("gateway timeout: {}", body)),
            500..=599 => Self::ServiceUnavailable(format!("{}: {}", status, body)),
            _ => Self::Http { status, body },
        }
    }

    /// Worth one more attempt: transient service faults and unparseable payloads.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AiError::ServiceUnavailable(_)
                | AiError::RateLimited(_)
                | AiError::Timeout(_)
                | AiError::Network(_)
                | AiError::MalformedResponse(_)
        )
    }

    /// The service answered, but not in a shape we can use.
    pub fn is_malformed(&self) -> bool {
        matches!(self, AiError::MalformedResponse(_))
    }
}
