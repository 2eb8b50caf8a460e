use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

use interviewbase::ai::{
    grade_choice, AiError, AnswerScorer, Grade, QuestionProvider, ScoreTotals, SummaryGenerator,
};
use interviewbase::session::{Question, DIFFICULTY_ORDER, OPTION_LABELS};

/// Correct labels of [`question_set`], in order.
pub const ANSWER_KEY: [&str; 6] = ["A", "B", "C", "D", "A", "B"];

pub fn question_set() -> Vec<Question> {
    DIFFICULTY_ORDER
        .iter()
        .zip(ANSWER_KEY)
        .enumerate()
        .map(|(i, (difficulty, correct))| {
            let options: BTreeMap<String, String> = OPTION_LABELS
                .iter()
                .map(|label| (label.to_string(), format!("Option {label} of question {}", i + 1)))
                .collect();
            Question::new(
                *difficulty,
                format!("Question {} ({difficulty})?", i + 1),
                options,
                correct,
            )
        })
        .collect()
}

fn scripted_error(retryable: bool) -> AiError {
    if retryable {
        AiError::Http {
            status: 503,
            message: "service unavailable".into(),
            retryable: true,
        }
    } else {
        AiError::Parse("malformed reply".into())
    }
}

/// Fails the first `failures` calls, then behaves.
struct Script {
    failures_left: AtomicU32,
    retryable: bool,
    calls: AtomicU32,
}

impl Script {
    fn new(failures: u32, retryable: bool) -> Self {
        Self {
            failures_left: AtomicU32::new(failures),
            retryable,
            calls: AtomicU32::new(0),
        }
    }

    fn next(&self) -> Result<(), AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            Err(scripted_error(self.retryable))
        } else {
            Ok(())
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

pub struct ScriptedQuestions {
    script: Script,
}

impl ScriptedQuestions {
    pub fn reliable() -> Self {
        Self::failing(0, false)
    }

    pub fn failing(failures: u32, retryable: bool) -> Self {
        Self {
            script: Script::new(failures, retryable),
        }
    }

    pub fn calls(&self) -> u32 {
        self.script.calls()
    }
}

#[async_trait]
impl QuestionProvider for ScriptedQuestions {
    async fn generate_questions(&self) -> Result<Vec<Question>, AiError> {
        self.script.next()?;
        Ok(question_set())
    }
}

pub struct ScriptedScorer {
    script: Script,
}

impl ScriptedScorer {
    pub fn reliable() -> Self {
        Self::failing(0, false)
    }

    pub fn failing(failures: u32, retryable: bool) -> Self {
        Self {
            script: Script::new(failures, retryable),
        }
    }

    pub fn calls(&self) -> u32 {
        self.script.calls()
    }
}

#[async_trait]
impl AnswerScorer for ScriptedScorer {
    async fn score(&self, question: &Question, answer: Option<&str>) -> Result<Grade, AiError> {
        self.script.next()?;
        Ok(grade_choice(question, answer))
    }
}

pub struct ScriptedSummary {
    script: Script,
}

impl ScriptedSummary {
    pub fn reliable() -> Self {
        Self {
            script: Script::new(0, false),
        }
    }

    pub fn broken() -> Self {
        Self {
            script: Script::new(u32::MAX, false),
        }
    }

    pub fn calls(&self) -> u32 {
        self.script.calls()
    }
}

#[async_trait]
impl SummaryGenerator for ScriptedSummary {
    async fn narrate(&self, _questions: &[Question], totals: &ScoreTotals) -> Result<String, AiError> {
        self.script.next()?;
        Ok(format!(
            "Narrative for {}/{}",
            totals.total_score, totals.max_score
        ))
    }
}
