//! Legal transitions of a candidate session.
//!
//! `collecting_info -> in_progress -> {paused <-> in_progress} -> completed`.
//! Every function here is synchronous and mutates exactly one `Session`; the
//! orchestrator owns locking, remote calls and countdowns. A rejected
//! transition leaves the session unchanged.

use chrono::Utc;

use crate::config::ValidationSettings;
use crate::error::{InterviewError, InterviewResult};

use super::model::{
    ChatEntry, ContactField, FinalSummary, Question, Session, SessionStatus, DIFFICULTY_ORDER,
    QUESTION_COUNT,
};
use super::validation::validate_field;

pub const WELCOME_MESSAGE: &str =
    "Welcome! I need a few more details before we begin the interview. Let's complete your profile.";
pub const PROFILE_COMPLETE_MESSAGE: &str = "Perfect! Your profile is complete. Let's start the interview. I'll generate 6 technical questions for you.";

/// Result of one accepted field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStep {
    /// Another field is missing; its prompt was appended to the transcript.
    Prompt(ContactField),
    /// All contact fields are known; a question set must be requested.
    ReadyForQuestions,
}

/// Outcome of the advance transition after a question is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Moved to the question at this index.
    Moved(usize),
    /// The scored question was the last one; the session awaits `complete`.
    Finished,
    /// Not applicable (already advanced, unscored, or not in progress).
    Noop,
}

fn require(session: &Session, allowed: &[SessionStatus], action: &'static str) -> InterviewResult<()> {
    if allowed.contains(&session.status) {
        Ok(())
    } else {
        Err(InterviewError::InvalidTransition {
            from: session.status,
            action,
        })
    }
}

/// Starts conversational collection for the first missing contact field.
///
/// Returns `None` when nothing is missing.
pub fn begin_collection(session: &mut Session) -> Option<ContactField> {
    if session.status != SessionStatus::CollectingInfo {
        return None;
    }
    let first = session.missing_fields().into_iter().next()?;
    session.push_chat(ChatEntry::system(WELCOME_MESSAGE));
    session.collecting_field = Some(first);
    session.push_chat(ChatEntry::bot(first.prompt()));
    Some(first)
}

/// Stores a value for the field currently being solicited.
pub fn collect_field(
    session: &mut Session,
    raw: &str,
    settings: &ValidationSettings,
) -> InterviewResult<CollectionStep> {
    require(session, &[SessionStatus::CollectingInfo], "collect a profile field")?;
    let Some(field) = session.collecting_field else {
        return Err(InterviewError::InvalidTransition {
            from: session.status,
            action: "collect a profile field with none pending",
        });
    };
    let value = validate_field(field, raw, settings)?;

    session.push_chat(ChatEntry::user(value.clone()));
    match field {
        ContactField::Name => session.name = Some(value),
        ContactField::Email => session.email = Some(value),
        ContactField::Phone => session.phone = Some(value),
    }

    match session.missing_fields().into_iter().next() {
        Some(next) => {
            session.collecting_field = Some(next);
            session.push_chat(ChatEntry::bot(next.prompt()));
            Ok(CollectionStep::Prompt(next))
        }
        None => {
            session.collecting_field = None;
            session.push_chat(ChatEntry::bot(PROFILE_COMPLETE_MESSAGE));
            Ok(CollectionStep::ReadyForQuestions)
        }
    }
}

/// Checks the fixed composition of a question set.
pub fn check_question_set(questions: &[Question]) -> Result<(), String> {
    if questions.len() != QUESTION_COUNT {
        return Err(format!(
            "expected {QUESTION_COUNT} questions, got {}",
            questions.len()
        ));
    }
    for (index, (question, expected)) in questions.iter().zip(DIFFICULTY_ORDER).enumerate() {
        if question.difficulty != expected {
            return Err(format!(
                "question {} should be {expected}, got {}",
                index + 1,
                question.difficulty
            ));
        }
        if question.time_limit != expected.time_limit() {
            return Err(format!(
                "question {} has time limit {}s, expected {}s",
                index + 1,
                question.time_limit,
                expected.time_limit()
            ));
        }
    }
    Ok(())
}

/// `collecting_info -> in_progress` once every contact field is known.
pub fn start_interview(session: &mut Session, questions: Vec<Question>) -> InterviewResult<()> {
    require(session, &[SessionStatus::CollectingInfo], "start the interview")?;
    if let Some(field) = session.missing_fields().into_iter().next() {
        return Err(InterviewError::Validation {
            field,
            reason: "profile is incomplete".into(),
        });
    }
    check_question_set(&questions).map_err(InterviewError::GenerationFailed)?;

    let now = Utc::now();
    session.status = SessionStatus::InProgress;
    session.collecting_field = None;
    session.questions = questions;
    session.current_question_index = 0;
    session.remaining_time = None;
    session.started_at = Some(now);
    let entry = ChatEntry::question(0, &session.questions[0]);
    session.push_chat(entry);
    Ok(())
}

/// Records the submitted answer for the current question.
///
/// This is the test-and-set that makes submission at-most-once: a second
/// submission for the same question fails with `AlreadySubmitted`. An empty
/// answer is stored as `""` (the "no answer" sentinel).
pub fn record_submission(
    session: &mut Session,
    question_index: usize,
    answer: Option<&str>,
    time_spent: u32,
) -> InterviewResult<()> {
    require(session, &[SessionStatus::InProgress], "submit an answer")?;
    if question_index != session.current_question_index {
        return Err(InterviewError::AlreadySubmitted);
    }
    let Some(question) = session.questions.get_mut(question_index) else {
        return Err(InterviewError::AlreadySubmitted);
    };
    if question.is_submitted() {
        return Err(InterviewError::AlreadySubmitted);
    }
    let answer = answer.map(str::trim).unwrap_or_default().to_string();
    let time_spent = time_spent.min(question.time_limit);
    question.answer = Some(answer.clone());
    question.time_spent = Some(time_spent);
    let shown = (!answer.is_empty()).then_some(answer.as_str());
    session.push_chat(ChatEntry::answer(question_index, shown, time_spent));
    Ok(())
}

/// Stores a grade for a submitted, not yet scored question.
///
/// Returns `false` (and changes nothing) when the question is already scored.
pub fn record_score(
    session: &mut Session,
    question_index: usize,
    score: u32,
    feedback: String,
) -> InterviewResult<bool> {
    let Some(question) = session.questions.get_mut(question_index) else {
        return Err(InterviewError::InvalidTransition {
            from: session.status,
            action: "score a question outside the set",
        });
    };
    if question.is_scored() {
        return Ok(false);
    }
    if !question.is_submitted() {
        return Err(InterviewError::InvalidTransition {
            from: session.status,
            action: "score an unanswered question",
        });
    }
    question.score = Some(score);
    question.feedback = Some(feedback.clone());
    session.push_chat(ChatEntry::feedback(question_index, &feedback, score));
    Ok(true)
}

/// `in_progress -> in_progress` after `scored_index` was scored.
///
/// Safe to call repeatedly: only the first call for a given index moves the
/// session.
pub fn advance(session: &mut Session, scored_index: usize) -> Advance {
    if session.status != SessionStatus::InProgress || scored_index != session.current_question_index
    {
        return Advance::Noop;
    }
    match session.questions.get(scored_index) {
        Some(question) if question.is_scored() => {}
        _ => return Advance::Noop,
    }
    if session.is_last_question() {
        return Advance::Finished;
    }
    let next = scored_index + 1;
    session.current_question_index = next;
    session.remaining_time = None;
    let entry = ChatEntry::question(next, &session.questions[next]);
    session.push_chat(entry);
    Advance::Moved(next)
}

/// `in_progress -> completed`; sets the final score and summary together.
pub fn complete(session: &mut Session, mut summary: FinalSummary) -> InterviewResult<()> {
    require(session, &[SessionStatus::InProgress], "complete the interview")?;
    if session.questions.is_empty() || session.questions.iter().any(|q| !q.is_scored()) {
        return Err(InterviewError::InvalidTransition {
            from: session.status,
            action: "complete with unscored questions",
        });
    }
    let total: u32 = session.questions.iter().filter_map(|q| q.score).sum();
    summary.total_score = total;
    session.status = SessionStatus::Completed;
    session.final_score = Some(total);
    session.current_question_index = session.questions.len();
    session.remaining_time = None;
    session.completed_at = Some(Utc::now());
    session.push_chat(ChatEntry::completion(&summary));
    session.final_summary = Some(summary);
    Ok(())
}

/// `in_progress -> paused`, keeping the live countdown value when known.
pub fn pause(session: &mut Session, live_remaining: Option<u32>) -> InterviewResult<()> {
    require(session, &[SessionStatus::InProgress], "pause")?;
    session.status = SessionStatus::Paused;
    session.paused_at = Some(Utc::now());
    if live_remaining.is_some() {
        session.remaining_time = live_remaining;
    }
    session.touch();
    Ok(())
}

/// `paused -> in_progress`. `remaining_time` is left for the countdown to consume.
///
/// Also accepted for an `in_progress` session whose countdown is not running,
/// e.g. one restored from a snapshot.
pub fn resume(session: &mut Session) -> InterviewResult<()> {
    require(
        session,
        &[SessionStatus::Paused, SessionStatus::InProgress],
        "resume",
    )?;
    session.status = SessionStatus::InProgress;
    session.touch();
    Ok(())
}

/// Initial countdown value for the current question. Consumes `remaining_time`.
pub fn take_initial_countdown(session: &mut Session) -> Option<u32> {
    let limit = session.current_question()?.time_limit;
    let carried = session.remaining_time.take();
    Some(carried.map(|r| r.min(limit)).unwrap_or(limit))
}

/// Persists one countdown tick. Ignored unless it belongs to the live question.
pub fn persist_tick(session: &mut Session, question_index: usize, remaining: u32) -> bool {
    let live = session.status == SessionStatus::InProgress
        && session.current_question_index == question_index
        && session
            .current_question()
            .map(|q| !q.is_submitted())
            .unwrap_or(false);
    if live {
        session.remaining_time = Some(remaining);
        session.touch();
    }
    live
}
