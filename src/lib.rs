pub mod ai;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod interview;
pub mod resume;
pub mod session;
pub mod timer;

// Re-export commonly used types for convenience.
pub use config::AppConfig;
pub use dashboard::{DashboardQuery, DashboardRow, SortKey};
pub use error::{InterviewError, InterviewResult};
pub use interview::{
    InterviewEvent, InterviewOrchestrator, NextStep, OrchestratorSettings, Providers,
    QuestionView, SubmitOutcome, UploadOutcome, WelcomeBack,
};
pub use session::{Session, SessionId, SessionStatus, SessionStore};
