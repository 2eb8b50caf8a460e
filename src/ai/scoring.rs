//! Answer grading and the end-of-interview summary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{AiError, TextGenerator};
use crate::session::{Question, POINTS_PER_QUESTION};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
    pub score: u32,
    pub feedback: String,
}

/// Grades one submitted answer. `None` means nothing was submitted.
#[async_trait]
pub trait AnswerScorer: Send + Sync {
    async fn score(&self, question: &Question, answer: Option<&str>) -> Result<Grade, AiError>;
}

/// Case-insensitive label comparison; full marks or nothing.
pub fn grade_choice(question: &Question, answer: Option<&str>) -> Grade {
    let selected = answer.map(str::trim).unwrap_or_default();
    if selected.is_empty() {
        return Grade {
            score: 0,
            feedback: "No answer provided (time expired).".to_string(),
        };
    }

    let correct = question.correct_answer.trim().to_ascii_uppercase();
    let correct_text = question.option_text(&correct).unwrap_or_default();
    if selected.eq_ignore_ascii_case(&correct) {
        Grade {
            score: POINTS_PER_QUESTION,
            feedback: format!("Correct! The answer is {correct}: {correct_text}"),
        }
    } else {
        let selected_text = question.option_text(selected).unwrap_or("Invalid option");
        Grade {
            score: 0,
            feedback: format!(
                "Incorrect. You selected {selected}: {selected_text}. The correct answer is {correct}: {correct_text}"
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatchScorer;

#[async_trait]
impl AnswerScorer for ExactMatchScorer {
    async fn score(&self, question: &Question, answer: Option<&str>) -> Result<Grade, AiError> {
        Ok(grade_choice(question, answer))
    }
}

/// Numeric part of the final summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreTotals {
    pub total_score: u32,
    pub max_score: u32,
    /// Rounded to one decimal place.
    pub percentage: f64,
}

pub fn compute_totals(questions: &[Question]) -> ScoreTotals {
    let total_score: u32 = questions.iter().filter_map(|q| q.score).sum();
    let max_score = questions.len() as u32 * POINTS_PER_QUESTION;
    let percentage = if max_score == 0 {
        0.0
    } else {
        round1(f64::from(total_score) / f64::from(max_score) * 100.0)
    };
    ScoreTotals {
        total_score,
        max_score,
        percentage,
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Writes the narrative part of the final summary.
#[async_trait]
pub trait SummaryGenerator: Send + Sync {
    async fn narrate(&self, questions: &[Question], totals: &ScoreTotals)
        -> Result<String, AiError>;
}

const SUMMARY_INSTRUCTIONS: &str = "You are an expert technical interviewer providing a final evaluation summary.
Based on the candidate's performance across all questions, provide:
1. Overall assessment (2-3 sentences)
2. Key strengths
3. Areas for improvement

Keep it professional, constructive, and concise.";

/// Full summary prompt: instructions, totals and the per-question transcript.
pub fn summary_prompt(questions: &[Question], totals: &ScoreTotals) -> String {
    let transcript = questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let answer = q.answer.as_deref().filter(|a| !a.is_empty()).unwrap_or("No answer");
            format!(
                "Q{} ({}): {}\nAnswer: {}\nScore: {}/{}\nFeedback: {}",
                i + 1,
                q.difficulty,
                q.question,
                answer,
                q.score.unwrap_or(0),
                POINTS_PER_QUESTION,
                q.feedback.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "{SUMMARY_INSTRUCTIONS}\n\nCandidate Performance Summary:\nTotal Score: {}/{} ({:.1}%)\n\n{transcript}\n\nProvide a final evaluation summary.",
        totals.total_score, totals.max_score, totals.percentage
    )
}

pub struct LlmSummaryGenerator {
    generator: Arc<dyn TextGenerator>,
}

impl LlmSummaryGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl SummaryGenerator for LlmSummaryGenerator {
    async fn narrate(
        &self,
        questions: &[Question],
        totals: &ScoreTotals,
    ) -> Result<String, AiError> {
        let text = self
            .generator
            .generate(&summary_prompt(questions, totals))
            .await?;
        Ok(text.trim().to_string())
    }
}

/// Used when the narrative could not be generated.
pub fn fallback_narrative(totals: &ScoreTotals) -> String {
    format!(
        "The candidate scored {}/{} ({:.1}%). A written evaluation could not be generated.",
        totals.total_score, totals.max_score, totals.percentage
    )
}

/// Offline narrative built from the scores alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateSummaryGenerator;

#[async_trait]
impl SummaryGenerator for TemplateSummaryGenerator {
    async fn narrate(
        &self,
        questions: &[Question],
        totals: &ScoreTotals,
    ) -> Result<String, AiError> {
        let verdict = match totals.percentage {
            p if p >= 80.0 => "Strong performance across the question set.",
            p if p >= 50.0 => "Solid fundamentals with some gaps on harder topics.",
            _ => "Significant gaps; further preparation is recommended.",
        };
        let mut strengths = Vec::new();
        let mut gaps = Vec::new();
        for (i, question) in questions.iter().enumerate() {
            let label = format!("Q{} ({})", i + 1, question.difficulty);
            if question.score.unwrap_or(0) > 0 {
                strengths.push(label);
            } else {
                gaps.push(label);
            }
        }
        let list = |items: &[String]| {
            if items.is_empty() {
                "none".to_string()
            } else {
                items.join(", ")
            }
        };
        Ok(format!(
            "Total score {}/{} ({:.1}%). {verdict}\nAnswered correctly: {}\nNeeds review: {}",
            totals.total_score,
            totals.max_score,
            totals.percentage,
            list(strengths.as_slice()),
            list(gaps.as_slice())
        ))
    }
}
