use anyhow::{bail, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use interviewbase::ai::RetryPolicy;
use interviewbase::config::ValidationSettings;
use interviewbase::resume::{DocumentFormat, ExtractedFields, ParsedResume, ResumeMeta};
use interviewbase::session::{ChatEntryKind, Session};
use interviewbase::{
    InterviewEvent, InterviewOrchestrator, NextStep, OrchestratorSettings, Providers, SessionId,
};

use super::providers::{ScriptedQuestions, ScriptedScorer, ScriptedSummary};
use crate::IntegrationHarness;

pub const CANDIDATE_NAME: &str = "Ada Lovelace";
pub const CANDIDATE_EMAIL: &str = "ada@example.com";
pub const CANDIDATE_PHONE: &str = "+44 20 7946 0958";

pub struct FixtureOptions {
    pub questions: ScriptedQuestions,
    pub scorer: ScriptedScorer,
    pub summaries: ScriptedSummary,
    pub max_scoring_failures: u32,
    pub snapshot: bool,
}

impl Default for FixtureOptions {
    fn default() -> Self {
        Self {
            questions: ScriptedQuestions::reliable(),
            scorer: ScriptedScorer::reliable(),
            summaries: ScriptedSummary::reliable(),
            max_scoring_failures: 3,
            snapshot: false,
        }
    }
}

/// An orchestrator on a one-second tick with scripted collaborators.
pub struct InterviewFixture {
    pub harness: IntegrationHarness,
    pub orchestrator: InterviewOrchestrator,
    pub questions: Arc<ScriptedQuestions>,
    pub scorer: Arc<ScriptedScorer>,
    pub summaries: Arc<ScriptedSummary>,
    settings: OrchestratorSettings,
}

impl InterviewFixture {
    pub fn new() -> Self {
        Self::with_options(FixtureOptions::default())
    }

    pub fn with_options(options: FixtureOptions) -> Self {
        let harness = IntegrationHarness::new();
        let questions = Arc::new(options.questions);
        let scorer = Arc::new(options.scorer);
        let summaries = Arc::new(options.summaries);
        let settings = OrchestratorSettings {
            tick: Duration::from_secs(1),
            max_scoring_failures: options.max_scoring_failures,
            retry: RetryPolicy::new(3, Duration::from_millis(10)),
            validation: ValidationSettings::default(),
            snapshot_path: options.snapshot.then(|| harness.snapshot_path()),
        };
        let providers = Providers {
            questions: questions.clone(),
            scorer: scorer.clone(),
            summaries: summaries.clone(),
        };
        let orchestrator = InterviewOrchestrator::new(providers, settings.clone());
        Self {
            harness,
            orchestrator,
            questions,
            scorer,
            summaries,
            settings,
        }
    }

    pub fn providers(&self) -> Providers {
        Providers {
            questions: self.questions.clone(),
            scorer: self.scorer.clone(),
            summaries: self.summaries.clone(),
        }
    }

    pub fn settings(&self) -> OrchestratorSettings {
        self.settings.clone()
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.harness.snapshot_path()
    }

    /// Opens a session with a complete profile and expects the first question.
    pub async fn start_interview(&self) -> Result<SessionId> {
        let outcome = self.orchestrator.open_session(complete_resume()).await?;
        match outcome.next {
            NextStep::Started { question } if question.question_index == 0 => {
                Ok(outcome.session_id)
            }
            other => bail!("expected the first question, got {other:?}"),
        }
    }

    pub async fn session(&self, id: SessionId) -> Result<Session> {
        Ok(self.orchestrator.session(id).await?)
    }
}

pub fn resume_with(name: Option<&str>, email: Option<&str>, phone: Option<&str>) -> ParsedResume {
    let text = [name, email, phone]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("\n");
    ParsedResume {
        meta: ResumeMeta::new("cv.pdf", DocumentFormat::Pdf, text.as_bytes()),
        fields: ExtractedFields {
            name: name.map(str::to_string),
            email: email.map(str::to_string),
            phone: phone.map(str::to_string),
        },
        text,
    }
}

pub fn complete_resume() -> ParsedResume {
    resume_with(
        Some(CANDIDATE_NAME),
        Some(CANDIDATE_EMAIL),
        Some(CANDIDATE_PHONE),
    )
}

/// Writes a minimal DOCX with one paragraph per line.
pub fn write_docx(dir: &Path, file_name: &str, lines: &[&str]) -> Result<PathBuf> {
    let paragraphs: String = lines
        .iter()
        .map(|line| format!("<w:p><w:r><w:t>{line}</w:t></w:r></w:p>"))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{paragraphs}</w:body></w:document>"#
    );

    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    writer.start_file("word/document.xml", zip::write::FileOptions::default())?;
    writer.write_all(xml.as_bytes())?;
    let bytes = writer.finish()?.into_inner();

    let path = dir.join(file_name);
    std::fs::write(&path, bytes)?;
    Ok(path)
}

pub fn count_entries(session: &Session, kind: ChatEntryKind, question_index: Option<usize>) -> usize {
    session
        .chat_history
        .iter()
        .filter(|entry| entry.kind == kind)
        .filter(|entry| question_index.is_none() || entry.question_index == question_index)
        .count()
}

/// Everything published since the last drain.
pub fn drain(events: &mut broadcast::Receiver<InterviewEvent>) -> Vec<InterviewEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

/// Lets spawned countdown and scoring work run without crossing a tick.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// Sleeps to `seconds` plus half a tick, so the tick at `seconds` has landed.
pub async fn advance_secs(seconds: u64) {
    tokio::time::sleep(Duration::from_millis(seconds * 1000 + 500)).await;
}
