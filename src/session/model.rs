use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::resume::ResumeMeta;

pub type SessionId = Uuid;

/// Number of questions in every interview set.
pub const QUESTION_COUNT: usize = 6;

/// Points awarded for a correct answer.
pub const POINTS_PER_QUESTION: u32 = 10;

/// Option labels every question carries, in display order.
pub const OPTION_LABELS: [&str; 4] = ["A", "B", "C", "D"];

/// Difficulty order of a question set: two of each, easiest first.
pub const DIFFICULTY_ORDER: [Difficulty; QUESTION_COUNT] = [
    Difficulty::Easy,
    Difficulty::Easy,
    Difficulty::Medium,
    Difficulty::Medium,
    Difficulty::Hard,
    Difficulty::Hard,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    CollectingInfo,
    InProgress,
    Paused,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::CollectingInfo => "collecting_info",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "collecting_info" => Some(SessionStatus::CollectingInfo),
            "in_progress" => Some(SessionStatus::InProgress),
            "paused" => Some(SessionStatus::Paused),
            "completed" => Some(SessionStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contact attribute solicited during profile collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactField {
    Name,
    Email,
    Phone,
}

impl ContactField {
    /// Collection order.
    pub const ALL: [ContactField; 3] = [ContactField::Name, ContactField::Email, ContactField::Phone];

    pub fn prompt(&self) -> &'static str {
        match self {
            ContactField::Name => "What is your full name?",
            ContactField::Email => "What is your email address?",
            ContactField::Phone => "What is your phone number?",
        }
    }
}

impl fmt::Display for ContactField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ContactField::Name => "name",
            ContactField::Email => "email",
            ContactField::Phone => "phone",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Countdown length in seconds; depends on nothing but the difficulty.
    pub const fn time_limit(&self) -> u32 {
        match self {
            Difficulty::Easy => 20,
            Difficulty::Medium => 60,
            Difficulty::Hard => 120,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One multiple-choice question plus the candidate's result for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub difficulty: Difficulty,
    pub question: String,
    /// Label (`A`..`D`) to option text.
    pub options: BTreeMap<String, String>,
    pub correct_answer: String,
    pub time_limit: u32,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub time_spent: Option<u32>,
    #[serde(default)]
    pub score: Option<u32>,
    #[serde(default)]
    pub feedback: Option<String>,
}

impl Question {
    pub fn new(
        difficulty: Difficulty,
        question: impl Into<String>,
        options: BTreeMap<String, String>,
        correct_answer: impl Into<String>,
    ) -> Self {
        Self {
            difficulty,
            question: question.into(),
            options,
            correct_answer: correct_answer.into(),
            time_limit: difficulty.time_limit(),
            answer: None,
            time_spent: None,
            score: None,
            feedback: None,
        }
    }

    pub fn option_text(&self, label: &str) -> Option<&str> {
        self.options
            .get(&label.trim().to_ascii_uppercase())
            .map(String::as_str)
    }

    pub fn is_submitted(&self) -> bool {
        self.answer.is_some()
    }

    pub fn is_scored(&self) -> bool {
        self.score.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatEntryKind {
    System,
    Bot,
    User,
    Question,
    Answer,
    Feedback,
    Completion,
}

/// One transcript line. The transcript is append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub kind: ChatEntryKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub question_index: Option<usize>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub time_limit: Option<u32>,
    #[serde(default)]
    pub options: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub time_spent: Option<u32>,
    #[serde(default)]
    pub score: Option<u32>,
    #[serde(default)]
    pub max_score: Option<u32>,
    #[serde(default)]
    pub percentage: Option<f64>,
}

impl ChatEntry {
    pub fn new(kind: ChatEntryKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            timestamp: Utc::now(),
            question_index: None,
            difficulty: None,
            time_limit: None,
            options: None,
            time_spent: None,
            score: None,
            max_score: None,
            percentage: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatEntryKind::System, content)
    }

    pub fn bot(content: impl Into<String>) -> Self {
        Self::new(ChatEntryKind::Bot, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatEntryKind::User, content)
    }

    pub fn question(index: usize, question: &Question) -> Self {
        let mut entry = Self::new(ChatEntryKind::Question, question.question.clone());
        entry.question_index = Some(index);
        entry.difficulty = Some(question.difficulty);
        entry.time_limit = Some(question.time_limit);
        entry.options = Some(question.options.clone());
        entry
    }

    pub fn answer(index: usize, answer: Option<&str>, time_spent: u32) -> Self {
        let content = answer
            .map(str::to_string)
            .unwrap_or_else(|| "(No answer provided - time expired)".to_string());
        let mut entry = Self::new(ChatEntryKind::Answer, content);
        entry.question_index = Some(index);
        entry.time_spent = Some(time_spent);
        entry
    }

    pub fn feedback(index: usize, feedback: &str, score: u32) -> Self {
        let mut entry = Self::new(ChatEntryKind::Feedback, feedback);
        entry.question_index = Some(index);
        entry.score = Some(score);
        entry
    }

    pub fn completion(summary: &FinalSummary) -> Self {
        let mut entry = Self::new(ChatEntryKind::Completion, summary.narrative.clone());
        entry.score = Some(summary.total_score);
        entry.max_score = Some(summary.max_score);
        entry.percentage = Some(summary.percentage);
        entry
    }
}

/// Aggregate result recorded once all questions are scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalSummary {
    pub total_score: u32,
    pub max_score: u32,
    /// Percentage rounded to one decimal place.
    pub percentage: f64,
    pub narrative: String,
    /// `true` when the narrative is the local fallback text.
    #[serde(default)]
    pub narrative_fallback: bool,
}

/// One candidate's end-to-end interview record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub resume_meta: Option<ResumeMeta>,
    pub status: SessionStatus,
    pub collecting_field: Option<ContactField>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub current_question_index: usize,
    #[serde(default)]
    pub remaining_time: Option<u32>,
    #[serde(default)]
    pub chat_history: Vec<ChatEntry>,
    pub final_score: Option<u32>,
    pub final_summary: Option<FinalSummary>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_active_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        name: Option<String>,
        email: Option<String>,
        phone: Option<String>,
        resume_meta: Option<ResumeMeta>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: non_empty(name),
            email: non_empty(email),
            phone: non_empty(phone),
            resume_meta,
            status: SessionStatus::CollectingInfo,
            collecting_field: None,
            questions: Vec::new(),
            current_question_index: 0,
            remaining_time: None,
            chat_history: Vec::new(),
            final_score: None,
            final_summary: None,
            created_at: now,
            started_at: None,
            paused_at: None,
            completed_at: None,
            last_active_at: now,
        }
    }

    pub fn field(&self, field: ContactField) -> Option<&str> {
        match field {
            ContactField::Name => self.name.as_deref(),
            ContactField::Email => self.email.as_deref(),
            ContactField::Phone => self.phone.as_deref(),
        }
    }

    /// Contact fields still empty, in collection order.
    pub fn missing_fields(&self) -> Vec<ContactField> {
        ContactField::ALL
            .into_iter()
            .filter(|field| self.field(*field).is_none())
            .collect()
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_question_index)
    }

    pub fn is_last_question(&self) -> bool {
        !self.questions.is_empty() && self.current_question_index + 1 == self.questions.len()
    }

    pub fn questions_answered(&self) -> usize {
        self.questions.iter().filter(|q| q.is_scored()).count()
    }

    pub fn max_score(&self) -> u32 {
        let count = if self.questions.is_empty() {
            QUESTION_COUNT
        } else {
            self.questions.len()
        };
        count as u32 * POINTS_PER_QUESTION
    }

    pub(crate) fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }

    pub(crate) fn push_chat(&mut self, entry: ChatEntry) {
        self.chat_history.push(entry);
        self.touch();
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
