//! Question providers: the LLM-backed generator and an offline bank.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::{AiError, TextGenerator};
use crate::session::machine::check_question_set;
use crate::session::{Difficulty, Question, DIFFICULTY_ORDER, OPTION_LABELS};

/// Produces a full question set in the fixed easy, medium, hard order.
#[async_trait]
pub trait QuestionProvider: Send + Sync {
    async fn generate_questions(&self) -> Result<Vec<Question>, AiError>;
}

const QUESTION_PROMPT: &str = r#"You are an expert technical interviewer for a Full Stack Developer position (React/Node.js).

Generate EXACTLY 6 Multiple Choice Questions (MCQ) in this specific order:
- 2 EASY questions (fundamental concepts)
- 2 MEDIUM questions (practical implementation)
- 2 HARD questions (advanced problem-solving)

Each question must have:
- A clear question
- 4 options (A, B, C, D)
- One correct answer

CRITICAL: Return ONLY a valid JSON array. No markdown, no code blocks, no explanation text.
Start your response with [ and end with ]. Nothing else.

Format of each element:
{
  "difficulty": "easy",
  "question": "What is the virtual DOM in React?",
  "options": {
    "A": "A copy of the real DOM stored in memory",
    "B": "A database for storing component state",
    "C": "A CSS framework for styling",
    "D": "A testing library"
  },
  "correctAnswer": "A"
}

Make questions specific, technical, and relevant to modern React and Node.js development."#;

/// Asks a text generator for a question set and validates the reply.
pub struct LlmQuestionProvider {
    generator: Arc<dyn TextGenerator>,
}

impl LlmQuestionProvider {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl QuestionProvider for LlmQuestionProvider {
    async fn generate_questions(&self) -> Result<Vec<Question>, AiError> {
        let raw = self.generator.generate(QUESTION_PROMPT).await?;
        let questions = parse_question_set(&raw)?;
        tracing::info!(count = questions.len(), "generated question set");
        Ok(questions)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestion {
    difficulty: String,
    question: String,
    options: BTreeMap<String, String>,
    correct_answer: String,
}

/// Parses model output into a checked question set.
///
/// Tolerates markdown fences and chatter around the JSON array; rejects
/// anything that is not exactly six well-formed questions in order.
pub fn parse_question_set(raw: &str) -> Result<Vec<Question>, AiError> {
    let cleaned = raw.replace("```json", "").replace("```", "");
    let start = cleaned.find('[');
    let end = cleaned.rfind(']');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &cleaned[start..=end],
        _ => {
            return Err(AiError::Parse(
                "Failed to parse questions from model response".into(),
            ))
        }
    };

    let parsed: Vec<RawQuestion> = serde_json::from_str(json)
        .map_err(|err| AiError::Parse(format!("Question set is not valid JSON: {err}")))?;

    let questions = parsed
        .into_iter()
        .enumerate()
        .map(|(index, raw)| into_question(index, raw))
        .collect::<Result<Vec<_>, _>>()?;
    check_question_set(&questions).map_err(AiError::Parse)?;
    Ok(questions)
}

fn into_question(index: usize, raw: RawQuestion) -> Result<Question, AiError> {
    let number = index + 1;
    let difficulty = match raw.difficulty.trim().to_ascii_lowercase().as_str() {
        "easy" => Difficulty::Easy,
        "medium" => Difficulty::Medium,
        "hard" => Difficulty::Hard,
        other => {
            return Err(AiError::Parse(format!(
                "question {number} has unknown difficulty '{other}'"
            )))
        }
    };
    if raw.question.trim().is_empty() {
        return Err(AiError::Parse(format!("question {number} has no text")));
    }

    let options: BTreeMap<String, String> = raw
        .options
        .into_iter()
        .map(|(label, text)| (label.trim().to_ascii_uppercase(), text.trim().to_string()))
        .collect();
    let labels_ok = options.len() == OPTION_LABELS.len()
        && OPTION_LABELS
            .iter()
            .all(|label| options.get(*label).map(|t| !t.is_empty()).unwrap_or(false));
    if !labels_ok {
        return Err(AiError::Parse(format!(
            "question {number} must have non-empty options A, B, C and D"
        )));
    }

    let correct = raw.correct_answer.trim().to_ascii_uppercase();
    if !OPTION_LABELS.contains(&correct.as_str()) {
        return Err(AiError::Parse(format!(
            "question {number} has invalid correct answer '{}'",
            raw.correct_answer
        )));
    }

    Ok(Question::new(difficulty, raw.question.trim(), options, correct))
}

struct BankEntry {
    difficulty: Difficulty,
    question: &'static str,
    options: [&'static str; 4],
    correct: &'static str,
}

const BANK: &[BankEntry] = &[
    BankEntry {
        difficulty: Difficulty::Easy,
        question: "What is the virtual DOM in React?",
        options: [
            "A copy of the real DOM kept in memory",
            "A database for component state",
            "A CSS framework",
            "A testing library",
        ],
        correct: "A",
    },
    BankEntry {
        difficulty: Difficulty::Easy,
        question: "Which hook runs side effects in a React function component?",
        options: ["useState", "useEffect", "useContext", "useReducer"],
        correct: "B",
    },
    BankEntry {
        difficulty: Difficulty::Easy,
        question: "Which command initialises a new package.json?",
        options: ["node init", "npm start", "npm init", "npm build"],
        correct: "C",
    },
    BankEntry {
        difficulty: Difficulty::Easy,
        question: "What does JSX compile to?",
        options: [
            "HTML strings",
            "Web components",
            "CSS modules",
            "React.createElement calls",
        ],
        correct: "D",
    },
    BankEntry {
        difficulty: Difficulty::Medium,
        question: "Which HTTP status code indicates a resource was created?",
        options: ["200 OK", "201 Created", "204 No Content", "301 Moved Permanently"],
        correct: "B",
    },
    BankEntry {
        difficulty: Difficulty::Medium,
        question: "Which Node.js core module performs file system operations?",
        options: ["http", "path", "fs", "url"],
        correct: "C",
    },
    BankEntry {
        difficulty: Difficulty::Medium,
        question: "What does Express middleware call to pass control to the next handler?",
        options: ["next()", "done()", "res.end()", "app.use()"],
        correct: "A",
    },
    BankEntry {
        difficulty: Difficulty::Medium,
        question: "Why does React require a key prop on list items?",
        options: [
            "To style each item",
            "To identify items between renders",
            "To make items focusable",
            "To sort the list",
        ],
        correct: "B",
    },
    BankEntry {
        difficulty: Difficulty::Hard,
        question: "What is the average time complexity of a hash table lookup?",
        options: ["O(n)", "O(log n)", "O(1)", "O(n^2)"],
        correct: "C",
    },
    BankEntry {
        difficulty: Difficulty::Hard,
        question: "Which pattern centralises complex state updates through a single reducer?",
        options: [
            "Singleton pattern",
            "Observer pattern",
            "Flux/Redux pattern",
            "Factory pattern",
        ],
        correct: "C",
    },
    BankEntry {
        difficulty: Difficulty::Hard,
        question: "In the Node.js event loop, when do process.nextTick callbacks run?",
        options: [
            "Before other queued microtasks, once the current operation completes",
            "During the timers phase",
            "During the poll phase",
            "Only after all I/O callbacks",
        ],
        correct: "A",
    },
    BankEntry {
        difficulty: Difficulty::Hard,
        question: "What problem does useMemo address?",
        options: [
            "Persisting state across page reloads",
            "Sharing state between sibling components",
            "Recomputing expensive values on every render",
            "Subscribing to external stores",
        ],
        correct: "C",
    },
];

/// Offline provider that draws two questions per difficulty from a built-in bank.
pub struct StaticQuestionBank {
    rng: Mutex<StdRng>,
}

impl StaticQuestionBank {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic draws for tests and demos.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn draw(&self) -> Vec<Question> {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut questions = Vec::with_capacity(DIFFICULTY_ORDER.len());
        for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            let pool: Vec<&BankEntry> = BANK.iter().filter(|e| e.difficulty == difficulty).collect();
            let per_level = DIFFICULTY_ORDER
                .iter()
                .filter(|d| **d == difficulty)
                .count();
            for entry in pool.choose_multiple(&mut *rng, per_level) {
                let options = OPTION_LABELS
                    .iter()
                    .zip(entry.options)
                    .map(|(label, text)| (label.to_string(), text.to_string()))
                    .collect();
                questions.push(Question::new(
                    entry.difficulty,
                    entry.question,
                    options,
                    entry.correct,
                ));
            }
        }
        questions
    }
}

impl Default for StaticQuestionBank {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuestionProvider for StaticQuestionBank {
    async fn generate_questions(&self) -> Result<Vec<Question>, AiError> {
        let questions = self.draw();
        check_question_set(&questions).map_err(AiError::Parse)?;
        Ok(questions)
    }
}
