//! Error taxonomy for the interview lifecycle.
//!
//! Validation errors never leave the session they were raised for in a
//! modified state. Remote-service errors leave the session in its current
//! status so the same operation can be retried.

use thiserror::Error;
use uuid::Uuid;

use crate::ai::AiError;
use crate::resume::ExtractionError;
use crate::session::{ContactField, SessionStatus};

pub type InterviewResult<T> = Result<T, InterviewError>;

#[derive(Debug, Error)]
pub enum InterviewError {
    /// Bad contact-field format; the candidate is re-prompted.
    #[error("Invalid {field}: {reason}")]
    Validation { field: ContactField, reason: String },

    /// Unsupported or unreadable resume; no session is created.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Question generation failed: {0}")]
    GenerationFailed(String),

    #[error("Scoring failed: {0}")]
    ScoringFailed(String),

    #[error("Summary generation failed: {0}")]
    SummaryFailed(String),

    #[error("Session {0} not found")]
    NotFound(Uuid),

    #[error("Cannot {action} while session is {from}")]
    InvalidTransition {
        from: SessionStatus,
        action: &'static str,
    },

    /// The current question already has a recorded answer.
    #[error("An answer for this question was already submitted")]
    AlreadySubmitted,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl InterviewError {
    pub fn generation(err: AiError) -> Self {
        Self::GenerationFailed(err.to_string())
    }

    pub fn scoring(err: AiError) -> Self {
        Self::ScoringFailed(err.to_string())
    }

    /// Local errors are recovered by re-prompting; remote ones may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::GenerationFailed(_) | Self::ScoringFailed(_) | Self::SummaryFailed(_)
        )
    }
}
