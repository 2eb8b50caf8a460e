use serde::{Deserialize, Serialize};

use crate::session::{ContactField, Difficulty, SessionId, SessionStatus};

/// Buffered events per subscriber before slow receivers start lagging.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Discrete notifications published by the orchestrator.
///
/// Front ends render these as non-blocking messages; nothing in the
/// lifecycle waits for a subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterviewEvent {
    FieldRequested {
        session_id: SessionId,
        field: ContactField,
        prompt: String,
    },
    QuestionPresented {
        session_id: SessionId,
        question_index: usize,
        difficulty: Difficulty,
        time_limit: u32,
        remaining: u32,
    },
    CountdownTick {
        session_id: SessionId,
        question_index: usize,
        remaining: u32,
    },
    CountdownExpired {
        session_id: SessionId,
        question_index: usize,
    },
    AnswerRecorded {
        session_id: SessionId,
        question_index: usize,
        time_spent: u32,
        auto_submitted: bool,
    },
    AnswerScored {
        session_id: SessionId,
        question_index: usize,
        score: u32,
        feedback: String,
    },
    /// Scoring failed; the answer is kept and scoring can be retried.
    ScoringPending {
        session_id: SessionId,
        question_index: usize,
        reason: String,
    },
    InterviewCompleted {
        session_id: SessionId,
        total_score: u32,
        max_score: u32,
        percentage: f64,
    },
    StatusChanged {
        session_id: SessionId,
        status: SessionStatus,
    },
    SessionDeleted {
        session_id: SessionId,
    },
    Notice {
        session_id: Option<SessionId>,
        message: String,
    },
}

impl InterviewEvent {
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            InterviewEvent::FieldRequested { session_id, .. }
            | InterviewEvent::QuestionPresented { session_id, .. }
            | InterviewEvent::CountdownTick { session_id, .. }
            | InterviewEvent::CountdownExpired { session_id, .. }
            | InterviewEvent::AnswerRecorded { session_id, .. }
            | InterviewEvent::AnswerScored { session_id, .. }
            | InterviewEvent::ScoringPending { session_id, .. }
            | InterviewEvent::InterviewCompleted { session_id, .. }
            | InterviewEvent::StatusChanged { session_id, .. }
            | InterviewEvent::SessionDeleted { session_id } => Some(*session_id),
            InterviewEvent::Notice { session_id, .. } => *session_id,
        }
    }
}
