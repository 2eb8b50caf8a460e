//! Remote text generation and the three services built on it: question
//! generation, answer scoring and the final summary.

pub mod gemini;
pub mod questions;
pub mod scoring;

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::config::AiSettings;

pub use gemini::GeminiClient;
pub use questions::{parse_question_set, LlmQuestionProvider, QuestionProvider, StaticQuestionBank};
pub use scoring::{
    compute_totals, fallback_narrative, grade_choice, summary_prompt, AnswerScorer,
    ExactMatchScorer, Grade, LlmSummaryGenerator, ScoreTotals, SummaryGenerator,
    TemplateSummaryGenerator,
};

#[derive(Debug, Error)]
pub enum AiError {
    #[error("API key not configured; set the {0} environment variable")]
    MissingApiKey(String),

    #[error("Text generation returned HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        retryable: bool,
    },

    #[error("Text generation request failed: {message}")]
    Transport { message: String, retryable: bool },

    #[error("Text generation returned no text")]
    EmptyResponse,

    #[error("Unexpected model output: {0}")]
    Parse(String),
}

impl AiError {
    /// Rate-limit and overload failures are worth another attempt; everything else is final.
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::Http {
                retryable, message, ..
            } => *retryable || message.to_ascii_lowercase().contains("overloaded"),
            AiError::Transport { retryable, .. } => *retryable,
            AiError::MissingApiKey(_) | AiError::EmptyResponse | AiError::Parse(_) => false,
        }
    }
}

/// A single-shot prompt-to-text call.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AiError>;
}

/// Bounded exponential backoff for transient remote failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first one; never less than 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_settings(settings: &AiSettings) -> Self {
        Self::new(
            settings.max_attempts,
            Duration::from_millis(settings.base_delay_ms),
        )
    }

    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Wait before retry number `attempt + 1` (0-based): base, 2×base, 4×base, …
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&AiSettings::default())
    }
}

/// Runs `call` until it succeeds, fails permanently, or the attempts run out.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, AiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AiError>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt + 1 < policy.max_attempts => {
                let wait = policy.delay_for(attempt);
                tracing::warn!(
                    operation,
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    wait_ms = wait.as_millis() as u64,
                    error = %err,
                    "retryable text generation error, backing off"
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
