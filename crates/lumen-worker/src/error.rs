//! Worker error types.

use thiserror::Error;

use lumen_ai::AiError;
use lumen_media::MediaError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Input is not cost-effective: {reason}")]
    NotCostEffective { reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] validator::ValidationErrors),

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("AI service error: {0}")]
    Ai(#[from] AiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn processing_failed(msg: impl Into<String>) -> Self {
        Self::ProcessingFailed(msg.into())
    }

    pub fn not_cost_effective(duration: f64, max: f64) -> Self {
        Self::NotCostEffective {
            reason: format!("{:.1}s exceeds the {:.1}s limit", duration, max),
        }
    }

    pub fn too_large(size: u64, max: u64) -> Self {
        Self::NotCostEffective {
            reason: format!("{} bytes exceeds the {} byte limit", size, max),
        }
    }

    /// Check if error is retryable by the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Ai(e) => e.is_retryable(),
            WorkerError::Media(MediaError::Timeout(_)) => true,
            WorkerError::Io(_) => true,
            _ => false,
        }
    }
}
