//! Interview orchestration.
//!
//! `InterviewOrchestrator` sequences one candidate session through profile
//! collection, question generation, the per-question submit/score/advance
//! loop and the final summary. All session mutations happen under a single
//! lock around the [`SessionStore`]; remote calls run with the lock released
//! and a per-session in-flight marker keeps them serialized.

mod events;

pub use events::{InterviewEvent, EVENT_CHANNEL_CAPACITY};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use crate::ai::{
    self, AiError, AnswerScorer, ExactMatchScorer, GeminiClient, Grade, LlmQuestionProvider,
    LlmSummaryGenerator, QuestionProvider, RetryPolicy, StaticQuestionBank, SummaryGenerator,
    TemplateSummaryGenerator, TextGenerator,
};
use crate::config::{self, AppConfig, ValidationSettings};
use crate::dashboard::{self, DashboardQuery, DashboardRow};
use crate::error::{InterviewError, InterviewResult};
use crate::resume::{self, ExtractionError, ParsedResume};
use crate::session::snapshot::{self, SnapshotWriter};
use crate::session::{
    machine, Advance, CollectionStep, ContactField, Difficulty, FinalSummary, Question, Session,
    SessionId, SessionStatus, SessionStore,
};
use crate::timer::{self, CountdownHandle, CountdownSink, TimerKey};

/// The three remote collaborators.
#[derive(Clone)]
pub struct Providers {
    pub questions: Arc<dyn QuestionProvider>,
    pub scorer: Arc<dyn AnswerScorer>,
    pub summaries: Arc<dyn SummaryGenerator>,
}

impl Providers {
    /// Built-in question bank, exact-match scoring and a templated summary.
    pub fn offline() -> Self {
        Self {
            questions: Arc::new(StaticQuestionBank::new()),
            scorer: Arc::new(ExactMatchScorer),
            summaries: Arc::new(TemplateSummaryGenerator),
        }
    }

    /// Questions and summary narrative from a text generator.
    pub fn llm(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            questions: Arc::new(LlmQuestionProvider::new(generator.clone())),
            scorer: Arc::new(ExactMatchScorer),
            summaries: Arc::new(LlmSummaryGenerator::new(generator)),
        }
    }

    /// Gemini when an API key is configured, otherwise the offline set.
    pub fn from_config(config: &AppConfig) -> InterviewResult<Self> {
        match GeminiClient::from_settings(&config.ai) {
            Ok(client) => {
                tracing::info!(model = client.model(), "using Gemini for questions and summaries");
                Ok(Self::llm(Arc::new(client)))
            }
            Err(AiError::MissingApiKey(var)) => {
                tracing::warn!(
                    env = %var,
                    "no API key configured; using the offline question bank"
                );
                Ok(Self::offline())
            }
            Err(err) => Err(InterviewError::Config(err.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub tick: Duration,
    pub max_scoring_failures: u32,
    pub retry: RetryPolicy,
    pub validation: ValidationSettings,
    /// Snapshot target; `None` keeps sessions in memory only.
    pub snapshot_path: Option<PathBuf>,
}

impl OrchestratorSettings {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let snapshot_path = if config.storage.restore_snapshot {
            Some(config::snapshot_path(config)?)
        } else {
            None
        };
        Ok(Self {
            tick: Duration::from_millis(config.interview.tick_millis.max(1)),
            max_scoring_failures: config.interview.max_scoring_failures.max(1),
            retry: RetryPolicy::from_settings(&config.ai),
            validation: config.validation.clone(),
            snapshot_path,
        })
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        let config = AppConfig::default();
        Self {
            tick: Duration::from_millis(config.interview.tick_millis),
            max_scoring_failures: config.interview.max_scoring_failures,
            retry: RetryPolicy::from_settings(&config.ai),
            validation: config.validation,
            snapshot_path: None,
        }
    }
}

/// What the candidate sees for the live question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionView {
    pub session_id: SessionId,
    pub question_index: usize,
    pub total: usize,
    pub difficulty: Difficulty,
    pub question: String,
    pub options: BTreeMap<String, String>,
    pub time_limit: u32,
    pub remaining: u32,
}

impl QuestionView {
    fn current(session: &Session, remaining: u32) -> Option<Self> {
        let question = session.current_question()?;
        Some(Self {
            session_id: session.id,
            question_index: session.current_question_index,
            total: session.questions.len(),
            difficulty: question.difficulty,
            question: question.question.clone(),
            options: question.options.clone(),
            time_limit: question.time_limit,
            remaining,
        })
    }
}

/// Where a session stands after profile input.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum NextStep {
    Collect { field: ContactField, prompt: String },
    Started { question: QuestionView },
    /// Profile complete but no question set yet; `start_questions` retries.
    QuestionsPending { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadOutcome {
    pub session_id: SessionId,
    pub next: NextStep,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Next { grade: Grade, question: QuestionView },
    Completed { grade: Grade, summary: FinalSummary },
    /// Scored, but the session was no longer on that question.
    Scored { grade: Grade },
}

/// Data for the "welcome back" prompt of an interrupted session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WelcomeBack {
    pub session_id: SessionId,
    pub name: Option<String>,
    pub status: SessionStatus,
    pub questions_completed: usize,
    pub questions_remaining: usize,
    pub remaining_time: Option<u32>,
    pub last_active_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Submission {
    Manual,
    Expired,
}

#[derive(Default)]
struct Runtime {
    store: SessionStore,
    timers: HashMap<SessionId, CountdownHandle>,
    /// Current selection per session, keyed with the question it belongs to.
    staged: HashMap<SessionId, (usize, String)>,
    /// Sessions with a generation, scoring or summary call outstanding.
    in_flight: HashSet<SessionId>,
    /// Consecutive failed scoring attempts for the current question.
    scoring_failures: HashMap<SessionId, u32>,
    countdown_generation: u64,
}

struct Inner {
    state: Mutex<Runtime>,
    providers: Providers,
    settings: OrchestratorSettings,
    snapshots: Option<SnapshotWriter>,
    events: broadcast::Sender<InterviewEvent>,
}

/// Cheap to clone; clones share the same sessions.
#[derive(Clone)]
pub struct InterviewOrchestrator {
    inner: Arc<Inner>,
}

impl InterviewOrchestrator {
    /// Starts with an empty store.
    pub fn new(providers: Providers, settings: OrchestratorSettings) -> Self {
        Self::with_store(SessionStore::new(), providers, settings)
    }

    pub fn with_store(
        store: SessionStore,
        providers: Providers,
        settings: OrchestratorSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let runtime = Runtime {
            store,
            ..Runtime::default()
        };
        let snapshots = settings.snapshot_path.clone().map(SnapshotWriter::new);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(runtime),
                providers,
                settings,
                snapshots,
                events,
            }),
        }
    }

    /// Fresh store, or the snapshot when `storage.restore_snapshot` is set.
    pub fn from_config(config: &AppConfig, providers: Providers) -> anyhow::Result<Self> {
        let settings = OrchestratorSettings::from_config(config)?;
        let store = match &settings.snapshot_path {
            Some(path) => {
                let restored = snapshot::load(path)?;
                if let Some(store) = &restored {
                    tracing::info!(
                        sessions = store.len(),
                        path = %path.display(),
                        "restored session snapshot"
                    );
                }
                restored.unwrap_or_default()
            }
            None => SessionStore::new(),
        };
        Ok(Self::with_store(store, providers, settings))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InterviewEvent> {
        self.inner.events.subscribe()
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.inner.settings
    }

    // ----- profile collection -------------------------------------------

    /// Parses a resume file and opens a session for it.
    pub async fn upload_resume(&self, path: impl AsRef<Path>) -> InterviewResult<UploadOutcome> {
        let path = path.as_ref().to_path_buf();
        let parsed = tokio::task::spawn_blocking(move || resume::parse_resume(&path))
            .await
            .map_err(|err| ExtractionError::Corrupt(format!("resume parser stopped: {err}")))??;
        self.open_session(parsed).await
    }

    /// Creates a session from an already parsed resume and makes it current.
    pub async fn open_session(&self, parsed: ParsedResume) -> InterviewResult<UploadOutcome> {
        let ParsedResume { fields, meta, .. } = parsed;
        let session = Session::new(fields.name, fields.email, fields.phone, Some(meta));

        let (session_id, pending) = {
            let mut rt = self.inner.state.lock().await;
            let previous = rt.store.current_id();
            let id = rt.store.create(session);
            if let Some(previous) = previous {
                self.pause_for_navigation(&mut rt, previous);
            }
            let pending = rt.store.update(&id, |s| Ok(machine::begin_collection(s)))?;
            self.persist(&rt);
            (id, pending)
        };
        tracing::info!(%session_id, missing = ?pending, "session created from resume");

        let next = match pending {
            Some(field) => self.field_requested(session_id, field),
            None => self.next_after_profile(session_id).await?,
        };
        Ok(UploadOutcome { session_id, next })
    }

    /// Accepts a value for the field being collected.
    ///
    /// Invalid input returns `Validation` and leaves the session untouched.
    pub async fn submit_field(&self, id: SessionId, raw: &str) -> InterviewResult<NextStep> {
        let step = {
            let mut rt = self.inner.state.lock().await;
            let validation = &self.inner.settings.validation;
            let step = rt
                .store
                .update(&id, |s| machine::collect_field(s, raw, validation))?;
            self.persist(&rt);
            step
        };
        match step {
            CollectionStep::Prompt(field) => Ok(self.field_requested(id, field)),
            CollectionStep::ReadyForQuestions => self.next_after_profile(id).await,
        }
    }

    /// Requests a question set and starts the interview.
    ///
    /// On failure the session stays in `collecting_info` and this call can be
    /// repeated. If another session became current while the set was being
    /// generated, the interview starts paused on its first question.
    pub async fn start_questions(&self, id: SessionId) -> InterviewResult<QuestionView> {
        {
            let mut rt = self.inner.state.lock().await;
            let session = rt.store.get(&id).ok_or(InterviewError::NotFound(id))?;
            if session.status != SessionStatus::CollectingInfo {
                return Err(InterviewError::InvalidTransition {
                    from: session.status,
                    action: "start the interview",
                });
            }
            if let Some(field) = session.missing_fields().into_iter().next() {
                return Err(InterviewError::Validation {
                    field,
                    reason: "profile is incomplete".into(),
                });
            }
            if !rt.in_flight.insert(id) {
                return Err(InterviewError::InvalidTransition {
                    from: SessionStatus::CollectingInfo,
                    action: "start the interview while questions are being generated",
                });
            }
        }

        let provider = self.inner.providers.questions.as_ref();
        let generated = ai::with_retry(&self.inner.settings.retry, "generate_questions", || {
            provider.generate_questions()
        })
        .await;

        let mut rt = self.inner.state.lock().await;
        rt.in_flight.remove(&id);
        let questions = match generated {
            Ok(questions) => questions,
            Err(err) => {
                tracing::warn!(session_id = %id, error = %err, "question generation failed");
                let err = InterviewError::generation(err);
                self.emit(InterviewEvent::Notice {
                    session_id: Some(id),
                    message: err.to_string(),
                });
                return Err(err);
            }
        };

        rt.store
            .update(&id, |s| machine::start_interview(s, questions))?;
        tracing::info!(session_id = %id, "interview started");
        self.emit(InterviewEvent::StatusChanged {
            session_id: id,
            status: SessionStatus::InProgress,
        });
        let view = self.present_question_locked(&mut rt, id)?.ok_or_else(|| {
            InterviewError::GenerationFailed("question set has no playable question".into())
        })?;
        self.persist(&rt);
        Ok(view)
    }

    // ----- answering ------------------------------------------------------

    /// Records the candidate's current selection; auto-submission uses it at expiry.
    pub async fn stage_answer(&self, id: SessionId, label: &str) -> InterviewResult<()> {
        let mut rt = self.inner.state.lock().await;
        let session = rt.store.get(&id).ok_or(InterviewError::NotFound(id))?;
        if session.status != SessionStatus::InProgress {
            return Err(InterviewError::InvalidTransition {
                from: session.status,
                action: "select an answer",
            });
        }
        let index = session.current_question_index;
        match session.current_question() {
            Some(question) if !question.is_submitted() => {}
            _ => return Err(InterviewError::AlreadySubmitted),
        }
        rt.staged
            .insert(id, (index, label.trim().to_ascii_uppercase()));
        Ok(())
    }

    /// Manual submission of whatever question is current.
    pub async fn submit_answer(&self, id: SessionId, label: &str) -> InterviewResult<SubmitOutcome> {
        self.submit(id, None, Some(label.to_string()), Submission::Manual)
            .await
    }

    /// Manual submission for the question the candidate was shown.
    ///
    /// Fails with `AlreadySubmitted` if that question was already answered,
    /// e.g. because its countdown expired first.
    pub async fn submit_answer_at(
        &self,
        id: SessionId,
        question_index: usize,
        label: &str,
    ) -> InterviewResult<SubmitOutcome> {
        self.submit(
            id,
            Some(question_index),
            Some(label.to_string()),
            Submission::Manual,
        )
        .await
    }

    /// Re-attempts scoring of a submitted but unscored current question.
    pub async fn retry_scoring(&self, id: SessionId) -> InterviewResult<SubmitOutcome> {
        let (index, question) = {
            let mut rt = self.inner.state.lock().await;
            let session = rt.store.get(&id).ok_or(InterviewError::NotFound(id))?;
            let status = session.status;
            let pending = match session.current_question() {
                Some(q) if status == SessionStatus::InProgress && q.is_submitted() && !q.is_scored() => {
                    Some((session.current_question_index, q.clone()))
                }
                _ => None,
            };
            let Some(pending) = pending else {
                return Err(InterviewError::InvalidTransition {
                    from: status,
                    action: "retry scoring without a pending answer",
                });
            };
            if !rt.in_flight.insert(id) {
                return Err(InterviewError::InvalidTransition {
                    from: status,
                    action: "retry scoring while scoring is in flight",
                });
            }
            pending
        };
        self.score_and_advance(id, index, question).await
    }

    async fn submit(
        &self,
        id: SessionId,
        expected_index: Option<usize>,
        answer: Option<String>,
        source: Submission,
    ) -> InterviewResult<SubmitOutcome> {
        let auto = source == Submission::Expired;
        let (index, question) = {
            let mut rt = self.inner.state.lock().await;
            let session = rt.store.get(&id).ok_or(InterviewError::NotFound(id))?;
            let index = expected_index.unwrap_or(session.current_question_index);
            let live = rt
                .timers
                .get(&id)
                .filter(|handle| handle.key().question_index == index)
                .map(CountdownHandle::remaining);
            let answer = if auto {
                rt.staged
                    .get(&id)
                    .filter(|(staged_index, _)| *staged_index == index)
                    .map(|(_, label)| label.clone())
            } else {
                answer
            };

            // Test-and-set: the loser of a manual/expiry race fails here.
            let question = rt.store.update(&id, |session| {
                let limit = session
                    .questions
                    .get(index)
                    .map(|q| q.time_limit)
                    .unwrap_or_default();
                let remaining = live.or(session.remaining_time).unwrap_or(limit);
                let spent = if auto {
                    limit
                } else {
                    limit.saturating_sub(remaining)
                };
                machine::record_submission(session, index, answer.as_deref(), spent)?;
                Ok(session.questions[index].clone())
            })?;

            if let Some(handle) = rt.timers.remove(&id) {
                handle.cancel();
            }
            rt.staged.remove(&id);
            rt.in_flight.insert(id);
            self.persist(&rt);

            if auto {
                self.emit(InterviewEvent::CountdownExpired {
                    session_id: id,
                    question_index: index,
                });
            }
            self.emit(InterviewEvent::AnswerRecorded {
                session_id: id,
                question_index: index,
                time_spent: question.time_spent.unwrap_or_default(),
                auto_submitted: auto,
            });
            tracing::info!(
                session_id = %id,
                question_index = index,
                auto_submitted = auto,
                "answer recorded"
            );
            (index, question)
        };

        self.score_and_advance(id, index, question).await
    }

    /// Scores a recorded answer, then advances or completes the session.
    ///
    /// The caller must have marked the session in flight.
    async fn score_and_advance(
        &self,
        id: SessionId,
        index: usize,
        question: Question,
    ) -> InterviewResult<SubmitOutcome> {
        let answer = question.answer.as_deref().filter(|a| !a.is_empty());
        let scorer = self.inner.providers.scorer.as_ref();
        let question_ref = &question;
        let result = ai::with_retry(&self.inner.settings.retry, "score_answer", || {
            scorer.score(question_ref, answer)
        })
        .await;

        let mut rt = self.inner.state.lock().await;
        if !rt.store.contains(&id) {
            rt.in_flight.remove(&id);
            return Err(InterviewError::NotFound(id));
        }

        let grade = match result {
            Ok(grade) => {
                rt.scoring_failures.remove(&id);
                grade
            }
            Err(err) => {
                let failures = {
                    let count = rt.scoring_failures.entry(id).or_insert(0);
                    *count += 1;
                    *count
                };
                tracing::warn!(
                    session_id = %id,
                    question_index = index,
                    failures,
                    error = %err,
                    "scoring failed"
                );
                if failures < self.inner.settings.max_scoring_failures {
                    rt.in_flight.remove(&id);
                    self.emit(InterviewEvent::ScoringPending {
                        session_id: id,
                        question_index: index,
                        reason: err.to_string(),
                    });
                    return Err(InterviewError::scoring(err));
                }
                rt.scoring_failures.remove(&id);
                Grade {
                    score: 0,
                    feedback: format!(
                        "Scoring was unavailable after {failures} attempts ({err}); this question was scored 0."
                    ),
                }
            }
        };

        let step = rt.store.update(&id, |session| {
            machine::record_score(session, index, grade.score, grade.feedback.clone())?;
            Ok(machine::advance(session, index))
        });
        let step = match step {
            Ok(step) => step,
            Err(err) => {
                rt.in_flight.remove(&id);
                return Err(err);
            }
        };
        self.emit(InterviewEvent::AnswerScored {
            session_id: id,
            question_index: index,
            score: grade.score,
            feedback: grade.feedback.clone(),
        });

        match step {
            Advance::Moved(_) => {
                let view = self.present_question_locked(&mut rt, id);
                rt.in_flight.remove(&id);
                self.persist(&rt);
                match view? {
                    Some(question) => Ok(SubmitOutcome::Next { grade, question }),
                    None => Ok(SubmitOutcome::Scored { grade }),
                }
            }
            Advance::Noop => {
                rt.in_flight.remove(&id);
                self.persist(&rt);
                Ok(SubmitOutcome::Scored { grade })
            }
            Advance::Finished => {
                let questions = rt
                    .store
                    .get(&id)
                    .map(|s| s.questions.clone())
                    .unwrap_or_default();
                self.persist(&rt);
                drop(rt);

                let summary = self.summarize(id, &questions).await;

                let mut rt = self.inner.state.lock().await;
                rt.in_flight.remove(&id);
                rt.store
                    .update(&id, |session| machine::complete(session, summary.clone()))?;
                self.persist(&rt);
                tracing::info!(
                    session_id = %id,
                    total_score = summary.total_score,
                    percentage = summary.percentage,
                    "interview completed"
                );
                self.emit(InterviewEvent::InterviewCompleted {
                    session_id: id,
                    total_score: summary.total_score,
                    max_score: summary.max_score,
                    percentage: summary.percentage,
                });
                Ok(SubmitOutcome::Completed { grade, summary })
            }
        }
    }

    /// Totals are always computed; the narrative falls back to local text.
    async fn summarize(&self, id: SessionId, questions: &[Question]) -> FinalSummary {
        let totals = ai::compute_totals(questions);
        let summaries = self.inner.providers.summaries.as_ref();
        let totals_ref = &totals;
        let narrated = ai::with_retry(&self.inner.settings.retry, "final_summary", || {
            summaries.narrate(questions, totals_ref)
        })
        .await;

        let (narrative, narrative_fallback) = match narrated {
            Ok(text) => (text, false),
            Err(err) => {
                let failure = InterviewError::SummaryFailed(err.to_string());
                tracing::warn!(session_id = %id, error = %failure, "using fallback narrative");
                self.emit(InterviewEvent::Notice {
                    session_id: Some(id),
                    message: failure.to_string(),
                });
                (ai::fallback_narrative(&totals), true)
            }
        };
        FinalSummary {
            total_score: totals.total_score,
            max_score: totals.max_score,
            percentage: totals.percentage,
            narrative,
            narrative_fallback,
        }
    }

    // ----- pause / resume / navigation -----------------------------------

    /// `in_progress -> paused`, capturing the live countdown value.
    pub async fn pause(&self, id: SessionId) -> InterviewResult<()> {
        let mut rt = self.inner.state.lock().await;
        self.pause_locked(&mut rt, id)?;
        self.persist(&rt);
        Ok(())
    }

    /// Resumes a paused (or restored, timer-less) session and makes it current.
    ///
    /// Returns the live question, or `None` when the current answer is still
    /// awaiting a score.
    pub async fn resume(&self, id: SessionId) -> InterviewResult<Option<QuestionView>> {
        let mut rt = self.inner.state.lock().await;
        let session = rt.store.get(&id).ok_or(InterviewError::NotFound(id))?;
        if !matches!(
            session.status,
            SessionStatus::Paused | SessionStatus::InProgress
        ) {
            return Err(InterviewError::InvalidTransition {
                from: session.status,
                action: "resume",
            });
        }

        let previous = rt.store.set_current(&id)?;
        if let Some(previous) = previous.filter(|p| *p != id) {
            self.pause_for_navigation(&mut rt, previous);
        }

        if let Some(handle) = rt.timers.get(&id).filter(|h| h.is_running()) {
            let remaining = handle.remaining();
            return Ok(rt
                .store
                .get(&id)
                .and_then(|s| QuestionView::current(s, remaining)));
        }

        rt.store.update(&id, machine::resume)?;
        let view = self.start_countdown_locked(&mut rt, id)?;
        self.persist(&rt);
        tracing::info!(session_id = %id, "session resumed");
        self.emit(InterviewEvent::StatusChanged {
            session_id: id,
            status: SessionStatus::InProgress,
        });
        Ok(view)
    }

    /// Welcome-back data for a paused or interrupted session; `None` otherwise.
    pub async fn resume_view(&self, id: SessionId) -> InterviewResult<Option<WelcomeBack>> {
        let rt = self.inner.state.lock().await;
        let session = rt.store.get(&id).ok_or(InterviewError::NotFound(id))?;
        let live = rt.timers.get(&id).map(|h| h.is_running()).unwrap_or(false);
        let interrupted = match session.status {
            SessionStatus::Paused => true,
            SessionStatus::InProgress => !live && !rt.in_flight.contains(&id),
            _ => false,
        };
        if !interrupted {
            return Ok(None);
        }
        let completed = session.questions_answered();
        Ok(Some(WelcomeBack {
            session_id: id,
            name: session.name.clone(),
            status: session.status,
            questions_completed: completed,
            questions_remaining: session.questions.len().saturating_sub(completed),
            remaining_time: session.remaining_time,
            last_active_at: session.last_active_at,
        }))
    }

    /// Makes `id` current; an in-progress previous session is paused.
    pub async fn select_session(&self, id: SessionId) -> InterviewResult<()> {
        let mut rt = self.inner.state.lock().await;
        let previous = rt.store.set_current(&id)?;
        if let Some(previous) = previous.filter(|p| *p != id) {
            self.pause_for_navigation(&mut rt, previous);
        }
        self.persist(&rt);
        Ok(())
    }

    fn pause_locked(&self, rt: &mut Runtime, id: SessionId) -> InterviewResult<()> {
        let status = rt
            .store
            .get(&id)
            .map(|s| s.status)
            .ok_or(InterviewError::NotFound(id))?;
        if status != SessionStatus::InProgress {
            return Err(InterviewError::InvalidTransition {
                from: status,
                action: "pause",
            });
        }
        if rt.in_flight.contains(&id) {
            return Err(InterviewError::InvalidTransition {
                from: status,
                action: "pause while an answer is being scored",
            });
        }
        let live = rt.timers.remove(&id).map(|handle| {
            handle.cancel();
            handle.remaining()
        });
        rt.store.update(&id, |s| machine::pause(s, live))?;
        tracing::info!(session_id = %id, remaining = ?live, "session paused");
        self.emit(InterviewEvent::StatusChanged {
            session_id: id,
            status: SessionStatus::Paused,
        });
        Ok(())
    }

    fn pause_for_navigation(&self, rt: &mut Runtime, id: SessionId) {
        let in_progress = rt
            .store
            .get(&id)
            .map(|s| s.status == SessionStatus::InProgress)
            .unwrap_or(false);
        if !in_progress {
            return;
        }
        if let Err(err) = self.pause_locked(rt, id) {
            // A busy session pauses itself once its call returns.
            tracing::debug!(session_id = %id, error = %err, "previous session not paused yet");
        }
    }

    /// Starts the countdown for the current question, unless the candidate
    /// moved to another session meanwhile; then the session is paused with the
    /// full time limit left.
    fn present_question_locked(
        &self,
        rt: &mut Runtime,
        id: SessionId,
    ) -> InterviewResult<Option<QuestionView>> {
        if rt.store.current_id() == Some(id) {
            return self.start_countdown_locked(rt, id);
        }
        if let Some(previous) = rt.timers.remove(&id) {
            previous.cancel();
        }
        let view = rt.store.update(&id, |session| {
            let Some(limit) = session
                .current_question()
                .filter(|q| !q.is_submitted())
                .map(|q| q.time_limit)
            else {
                return Ok(None);
            };
            if session.status == SessionStatus::InProgress {
                machine::pause(session, Some(limit))?;
            }
            Ok(QuestionView::current(session, limit))
        })?;
        if view.is_some() {
            tracing::info!(session_id = %id, "session is no longer current; left paused");
            self.emit(InterviewEvent::StatusChanged {
                session_id: id,
                status: SessionStatus::Paused,
            });
        }
        Ok(view)
    }

    // ----- removal and queries ------------------------------------------

    /// Removes a session from every structure and stops its countdown.
    pub async fn delete(&self, id: SessionId) -> InterviewResult<()> {
        let mut rt = self.inner.state.lock().await;
        if let Some(handle) = rt.timers.remove(&id) {
            handle.cancel();
        }
        rt.staged.remove(&id);
        rt.in_flight.remove(&id);
        rt.scoring_failures.remove(&id);
        rt.store.delete(&id).ok_or(InterviewError::NotFound(id))?;
        self.persist(&rt);
        tracing::info!(session_id = %id, "session deleted");
        self.emit(InterviewEvent::SessionDeleted { session_id: id });
        Ok(())
    }

    /// Full copy of one session, as shown by the interviewer's detail view.
    pub async fn session(&self, id: SessionId) -> InterviewResult<Session> {
        let rt = self.inner.state.lock().await;
        rt.store
            .get(&id)
            .cloned()
            .ok_or(InterviewError::NotFound(id))
    }

    pub async fn current_session_id(&self) -> Option<SessionId> {
        self.inner.state.lock().await.store.current_id()
    }

    /// Live countdown value, if a countdown is running for the session.
    pub async fn live_remaining(&self, id: SessionId) -> Option<u32> {
        let rt = self.inner.state.lock().await;
        rt.timers
            .get(&id)
            .filter(|h| h.is_running())
            .map(CountdownHandle::remaining)
    }

    /// The unanswered live question, if any.
    pub async fn current_question(&self, id: SessionId) -> InterviewResult<Option<QuestionView>> {
        let rt = self.inner.state.lock().await;
        let session = rt.store.get(&id).ok_or(InterviewError::NotFound(id))?;
        if session.status != SessionStatus::InProgress {
            return Ok(None);
        }
        let Some(question) = session.current_question().filter(|q| !q.is_submitted()) else {
            return Ok(None);
        };
        let remaining = rt
            .timers
            .get(&id)
            .map(CountdownHandle::remaining)
            .or(session.remaining_time)
            .unwrap_or(question.time_limit);
        Ok(QuestionView::current(session, remaining))
    }

    pub async fn dashboard(&self, query: &DashboardQuery) -> Vec<DashboardRow> {
        let rt = self.inner.state.lock().await;
        dashboard::build_rows(rt.store.iter(), query)
    }

    /// Pauses every running interview and writes a final snapshot.
    pub async fn shutdown(&self) {
        let mut rt = self.inner.state.lock().await;
        let running: Vec<SessionId> = rt.timers.keys().copied().collect();
        for id in running {
            if let Err(err) = self.pause_locked(&mut rt, id) {
                tracing::debug!(session_id = %id, error = %err, "not paused at shutdown");
                if let Some(handle) = rt.timers.remove(&id) {
                    handle.cancel();
                }
            }
        }
        if let Some(write) = self.persist(&rt) {
            if let Err(err) = write.await {
                tracing::warn!(error = %err, "final session snapshot did not finish");
            }
        }
    }

    // ----- countdown plumbing ---------------------------------------------

    /// Starts the countdown for the current question, replacing any previous one.
    fn start_countdown_locked(
        &self,
        rt: &mut Runtime,
        id: SessionId,
    ) -> InterviewResult<Option<QuestionView>> {
        if let Some(previous) = rt.timers.remove(&id) {
            previous.cancel();
        }
        let view = rt.store.update(&id, |session| {
            if session.status != SessionStatus::InProgress {
                return Ok(None);
            }
            match session.current_question() {
                Some(question) if !question.is_submitted() => {}
                _ => return Ok(None),
            }
            Ok(machine::take_initial_countdown(session)
                .and_then(|remaining| QuestionView::current(session, remaining)))
        })?;
        let Some(view) = view else {
            return Ok(None);
        };

        rt.countdown_generation += 1;
        let key = TimerKey::new(id, view.question_index, rt.countdown_generation);
        let handle = timer::start_countdown(key, view.remaining, self.inner.settings.tick, self.sink());
        rt.timers.insert(id, handle);
        self.emit(InterviewEvent::QuestionPresented {
            session_id: id,
            question_index: view.question_index,
            difficulty: view.difficulty,
            time_limit: view.time_limit,
            remaining: view.remaining,
        });
        Ok(Some(view))
    }

    fn sink(&self) -> Arc<dyn CountdownSink> {
        Arc::new(TimerBridge {
            inner: Arc::downgrade(&self.inner),
        })
    }

    async fn on_tick(&self, key: TimerKey, remaining: u32) {
        let mut rt = self.inner.state.lock().await;
        let live = rt
            .timers
            .get(&key.session_id)
            .is_some_and(|handle| handle.key() == key);
        if !live {
            tracing::debug!(
                session_id = %key.session_id,
                question_index = key.question_index,
                "ignoring tick from a replaced countdown"
            );
            return;
        }
        let persisted = rt
            .store
            .update(&key.session_id, |s| {
                Ok(machine::persist_tick(s, key.question_index, remaining))
            })
            .unwrap_or(false);
        if persisted {
            self.persist(&rt);
            self.emit(InterviewEvent::CountdownTick {
                session_id: key.session_id,
                question_index: key.question_index,
                remaining,
            });
        }
    }

    async fn on_expired(&self, key: TimerKey) {
        let result = self
            .submit(
                key.session_id,
                Some(key.question_index),
                None,
                Submission::Expired,
            )
            .await;
        match result {
            Ok(_) => {}
            Err(
                err @ (InterviewError::AlreadySubmitted
                | InterviewError::InvalidTransition { .. }
                | InterviewError::NotFound(_)),
            ) => {
                tracing::debug!(
                    session_id = %key.session_id,
                    question_index = key.question_index,
                    error = %err,
                    "expiry did not submit"
                );
            }
            Err(err) => {
                tracing::warn!(
                    session_id = %key.session_id,
                    question_index = key.question_index,
                    error = %err,
                    "auto-submission failed"
                );
            }
        }
    }

    // ----- helpers ---------------------------------------------------------

    fn field_requested(&self, id: SessionId, field: ContactField) -> NextStep {
        self.emit(InterviewEvent::FieldRequested {
            session_id: id,
            field,
            prompt: field.prompt().to_string(),
        });
        NextStep::Collect {
            field,
            prompt: field.prompt().to_string(),
        }
    }

    async fn next_after_profile(&self, id: SessionId) -> InterviewResult<NextStep> {
        match self.start_questions(id).await {
            Ok(question) => Ok(NextStep::Started { question }),
            Err(err @ InterviewError::GenerationFailed(_)) => Ok(NextStep::QuestionsPending {
                reason: err.to_string(),
            }),
            Err(err) => Err(err),
        }
    }

    fn emit(&self, event: InterviewEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    /// Queues a snapshot of the store; the disk write happens off the lock.
    fn persist(&self, rt: &Runtime) -> Option<JoinHandle<()>> {
        let writer = self.inner.snapshots.as_ref()?;
        match writer.write(&rt.store) {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::warn!(
                    path = %writer.path().display(),
                    error = %format!("{err:#}"),
                    "failed to queue session snapshot"
                );
                None
            }
        }
    }
}

/// Routes countdown callbacks back into the orchestrator without keeping it alive.
struct TimerBridge {
    inner: Weak<Inner>,
}

#[async_trait]
impl CountdownSink for TimerBridge {
    async fn tick(&self, key: TimerKey, remaining: u32) {
        if let Some(inner) = self.inner.upgrade() {
            InterviewOrchestrator { inner }.on_tick(key, remaining).await;
        }
    }

    async fn expired(&self, key: TimerKey) {
        if let Some(inner) = self.inner.upgrade() {
            InterviewOrchestrator { inner }.on_expired(key).await;
        }
    }
}
