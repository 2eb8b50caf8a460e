use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use interviewbase::config::{self, AppConfig};
use interviewbase::interview::{InterviewEvent, NextStep, Providers, QuestionView, SubmitOutcome};
use interviewbase::session::{ChatEntryKind, SessionStatus};
use interviewbase::{
    DashboardQuery, InterviewError, InterviewOrchestrator, SessionId, SortKey,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "interviewbase=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse()?;
    let mut config = config::load_or_default()?;
    if args.restore {
        config.storage.restore_snapshot = true;
    }
    if args.write_config {
        config::save(&config)?;
        println!("Configuration written to {}", config::config_file_path()?.display());
    }

    let providers = if args.offline {
        Providers::offline()
    } else {
        Providers::from_config(&config)?
    };
    let orchestrator = InterviewOrchestrator::from_config(&config, providers)?;
    spawn_event_printer(orchestrator.clone());

    print_banner(&config);
    if let Some(path) = args.resume_path {
        run_command(&orchestrator, &format!("/upload {}", path.display())).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "/quit" | "/exit") {
            break;
        }
        run_command(&orchestrator, line).await;
    }

    orchestrator.shutdown().await;
    Ok(())
}

struct CliArgs {
    resume_path: Option<PathBuf>,
    offline: bool,
    restore: bool,
    write_config: bool,
}

impl CliArgs {
    fn parse() -> Result<Self> {
        let mut args = env::args().skip(1);
        let mut parsed = CliArgs {
            resume_path: None,
            offline: false,
            restore: false,
            write_config: false,
        };
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--resume" => {
                    let value = args
                        .next()
                        .context("Expected a PDF or DOCX path after --resume")?;
                    parsed.resume_path = Some(PathBuf::from(value));
                }
                "--offline" => parsed.offline = true,
                "--restore" => parsed.restore = true,
                "--write-config" => parsed.write_config = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                other => {
                    return Err(anyhow!(
                        "Unknown argument '{other}'. Run with --help for usage instructions."
                    ));
                }
            }
        }
        Ok(parsed)
    }
}

fn print_usage() {
    println!("InterviewBase terminal interview");
    println!("Usage: cargo run --bin interview -- [options]");
    println!("Options:");
    println!("  --resume <path>   Upload a PDF or DOCX resume on startup");
    println!("  --offline         Use the built-in question bank even if an API key is set");
    println!("  --restore         Restore and keep a session snapshot between runs");
    println!("  --write-config    Write the effective configuration to config.toml");
}

fn print_banner(config: &AppConfig) {
    println!("InterviewBase ({})", config.ai.model);
    println!("Type /help for commands. Plain text answers the current prompt.");
}

fn print_help() {
    println!("Candidate:");
    println!("  /upload <path>        start a session from a PDF or DOCX resume");
    println!("  <text>                answer the current profile prompt or question");
    println!("  /pick <label>         select an option without submitting it");
    println!("  /retry                retry question generation or scoring");
    println!("  /pause, /resume [id]  pause or resume the current session");
    println!("Interviewer:");
    println!("  /dashboard [--search text] [--status s] [--sort score|date|name]");
    println!("  /view <id>            show one session's answers and transcript");
    println!("  /select <id>          switch the current session");
    println!("  /delete <id>          remove a session");
    println!("  /quit");
}

async fn run_command(orchestrator: &InterviewOrchestrator, line: &str) {
    if let Err(err) = dispatch(orchestrator, line).await {
        match err.downcast_ref::<InterviewError>() {
            Some(InterviewError::Validation { reason, .. }) => println!("! {reason}"),
            _ => println!("! {err:#}"),
        }
    }
}

async fn dispatch(orchestrator: &InterviewOrchestrator, line: &str) -> Result<()> {
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command {
        "/help" => print_help(),
        "/upload" => {
            if rest.is_empty() {
                bail!("Usage: /upload <path>");
            }
            let outcome = orchestrator.upload_resume(rest).await?;
            println!("Session {} created.", outcome.session_id);
            print_next_step(&outcome.next);
        }
        "/pick" => {
            let id = current(orchestrator).await?;
            orchestrator.stage_answer(id, rest).await?;
            println!("Selected {}. Submit with the same label or wait for the timer.", rest.to_ascii_uppercase());
        }
        "/retry" => {
            let id = current(orchestrator).await?;
            let session = orchestrator.session(id).await?;
            if session.status == SessionStatus::CollectingInfo {
                orchestrator.start_questions(id).await?;
            } else {
                let outcome = orchestrator.retry_scoring(id).await?;
                print_submit_outcome(&outcome);
            }
        }
        "/pause" => {
            let id = current(orchestrator).await?;
            orchestrator.pause(id).await?;
            println!("Interview paused.");
        }
        "/resume" => {
            let id = if rest.is_empty() {
                current(orchestrator).await?
            } else {
                resolve_id(orchestrator, rest).await?
            };
            if orchestrator.resume(id).await?.is_none() {
                println!("Resumed. The last answer is waiting for a score; use /retry.");
            }
        }
        "/select" => {
            let id = resolve_id(orchestrator, rest).await?;
            orchestrator.select_session(id).await?;
            match orchestrator.resume_view(id).await? {
                Some(welcome) => {
                    println!(
                        "Welcome back{}! {} of {} questions done, last active {}.",
                        welcome
                            .name
                            .as_deref()
                            .map(|n| format!(", {n}"))
                            .unwrap_or_default(),
                        welcome.questions_completed,
                        welcome.questions_completed + welcome.questions_remaining,
                        welcome.last_active_at.format("%Y-%m-%d %H:%M:%S")
                    );
                    println!("Type /resume to continue.");
                }
                None => println!("Session {id} is now current."),
            }
        }
        "/dashboard" => {
            let query = parse_dashboard_query(rest)?;
            let rows = orchestrator.dashboard(&query).await;
            if rows.is_empty() {
                println!("No candidates.");
            }
            for row in rows {
                println!(
                    "#{:<3} {:<24} {:<28} {:<16} {:>7}  {}",
                    row.rank,
                    row.name.as_deref().unwrap_or("-"),
                    row.email.as_deref().unwrap_or("-"),
                    row.status.to_string(),
                    row.final_score
                        .map(|s| format!("{s}/{}", row.max_score))
                        .unwrap_or_else(|| "-".into()),
                    row.session_id
                );
            }
        }
        "/view" => {
            let id = resolve_id(orchestrator, rest).await?;
            print_session(orchestrator, id).await?;
        }
        "/delete" => {
            let id = resolve_id(orchestrator, rest).await?;
            orchestrator.delete(id).await?;
            println!("Session {id} deleted.");
        }
        other if other.starts_with('/') => bail!("Unknown command {other}. Type /help."),
        _ => answer_prompt(orchestrator, line).await?,
    }
    Ok(())
}

/// Plain text goes to whatever the current session is waiting for.
async fn answer_prompt(orchestrator: &InterviewOrchestrator, text: &str) -> Result<()> {
    let id = current(orchestrator).await?;
    let session = orchestrator.session(id).await?;
    match session.status {
        SessionStatus::CollectingInfo if session.collecting_field.is_some() => {
            let next = orchestrator.submit_field(id, text).await?;
            print_next_step(&next);
        }
        SessionStatus::CollectingInfo => {
            println!("Questions are not ready yet. Type /retry to generate them.");
        }
        SessionStatus::InProgress => {
            let index = session.current_question_index;
            let outcome = orchestrator.submit_answer_at(id, index, text).await?;
            print_submit_outcome(&outcome);
        }
        SessionStatus::Paused => println!("The interview is paused. Type /resume to continue."),
        SessionStatus::Completed => println!("This interview is complete. Use /view {id}."),
    }
    Ok(())
}

async fn current(orchestrator: &InterviewOrchestrator) -> Result<SessionId> {
    orchestrator
        .current_session_id()
        .await
        .context("No current session. Upload a resume with /upload <path>.")
}

/// Accepts a full id or a unique prefix of one.
async fn resolve_id(orchestrator: &InterviewOrchestrator, raw: &str) -> Result<SessionId> {
    let raw = raw.trim();
    if raw.is_empty() {
        bail!("Expected a session id");
    }
    if let Ok(id) = SessionId::parse_str(raw) {
        return Ok(id);
    }
    let rows = orchestrator.dashboard(&DashboardQuery::default()).await;
    let matches: Vec<SessionId> = rows
        .iter()
        .map(|row| row.session_id)
        .filter(|id| id.to_string().starts_with(raw))
        .collect();
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => bail!("No session matches '{raw}'"),
        _ => bail!("'{raw}' matches {} sessions; use more characters", matches.len()),
    }
}

fn parse_dashboard_query(raw: &str) -> Result<DashboardQuery> {
    let mut query = DashboardQuery::default();
    let mut parts = raw.split_whitespace();
    while let Some(flag) = parts.next() {
        let value = parts
            .next()
            .with_context(|| format!("Expected a value after {flag}"))?;
        match flag {
            "--search" => query.search = Some(value.to_string()),
            "--status" => {
                query.status = if value == "all" {
                    None
                } else {
                    Some(
                        SessionStatus::parse(value)
                            .with_context(|| format!("Unknown status '{value}'"))?,
                    )
                }
            }
            "--sort" => {
                query.sort =
                    SortKey::parse(value).with_context(|| format!("Unknown sort key '{value}'"))?
            }
            other => bail!("Unknown dashboard option {other}"),
        }
    }
    Ok(query)
}

fn print_next_step(next: &NextStep) {
    match next {
        NextStep::Collect { prompt, .. } => println!("> {prompt}"),
        NextStep::Started { .. } => {}
        NextStep::QuestionsPending { reason } => {
            println!("! {reason}");
            println!("Type /retry to generate the questions again.");
        }
    }
}

fn print_submit_outcome(outcome: &SubmitOutcome) {
    if let SubmitOutcome::Completed { summary, .. } = outcome {
        if summary.narrative_fallback {
            println!("(The written evaluation is a fallback; the scores are final.)");
        }
    }
}

fn print_question(view: &QuestionView) {
    println!(
        "\nQuestion {}/{} [{}] ({}s)",
        view.question_index + 1,
        view.total,
        view.difficulty,
        view.remaining
    );
    println!("{}", view.question);
    for (label, text) in &view.options {
        println!("  {label}) {text}");
    }
}

async fn print_session(orchestrator: &InterviewOrchestrator, id: SessionId) -> Result<()> {
    let session = orchestrator.session(id).await?;
    println!(
        "{} <{}> {}",
        session.name.as_deref().unwrap_or("-"),
        session.email.as_deref().unwrap_or("-"),
        session.phone.as_deref().unwrap_or("-")
    );
    println!("Status: {}", session.status);
    if let Some(meta) = &session.resume_meta {
        println!("Resume: {} ({} bytes)", meta.file_name, meta.size_bytes);
    }
    for (i, question) in session.questions.iter().enumerate() {
        println!(
            "Q{} [{}] {} -> {} ({}s) score {}",
            i + 1,
            question.difficulty,
            question.question,
            question
                .answer
                .as_deref()
                .filter(|a| !a.is_empty())
                .unwrap_or("no answer"),
            question
                .time_spent
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".into()),
            question
                .score
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".into())
        );
    }
    if let Some(summary) = &session.final_summary {
        println!(
            "Final: {}/{} ({:.1}%)\n{}",
            summary.total_score, summary.max_score, summary.percentage, summary.narrative
        );
    }
    let chat_lines = session
        .chat_history
        .iter()
        .filter(|e| matches!(e.kind, ChatEntryKind::User | ChatEntryKind::Answer))
        .count();
    println!("Transcript: {} entries ({} from the candidate)", session.chat_history.len(), chat_lines);
    Ok(())
}

fn spawn_event_printer(orchestrator: InterviewOrchestrator) {
    let mut events = orchestrator.subscribe();
    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "event printer lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            match event {
                InterviewEvent::QuestionPresented { session_id, .. } => {
                    if let Ok(Some(view)) = orchestrator.current_question(session_id).await {
                        print_question(&view);
                    }
                }
                InterviewEvent::CountdownTick { remaining, .. } if remaining == 10 || remaining == 5 => {
                    println!("  ({remaining}s left)");
                }
                InterviewEvent::CountdownExpired { .. } => println!("Time's up! Submitting."),
                InterviewEvent::AnswerScored { score, feedback, .. } => {
                    println!("{feedback} [{score} points]");
                }
                InterviewEvent::ScoringPending { reason, .. } => {
                    println!("! Scoring failed: {reason}. Type /retry.");
                }
                InterviewEvent::InterviewCompleted {
                    session_id,
                    total_score,
                    max_score,
                    percentage,
                } => {
                    println!("\nInterview complete: {total_score}/{max_score} ({percentage:.1}%)");
                    if let Ok(session) = orchestrator.session(session_id).await {
                        if let Some(summary) = session.final_summary {
                            println!("{}", summary.narrative);
                        }
                    }
                }
                InterviewEvent::Notice { message, .. } => println!("! {message}"),
                _ => {}
            }
        }
    });
}
