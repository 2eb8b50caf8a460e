//! Interviewer dashboard: a read-only filter/sort/rank projection over sessions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;

use crate::session::{Session, SessionId, SessionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Final score descending; unscored sessions last.
    #[default]
    Score,
    /// Newest first.
    Date,
    /// Name ascending, case-insensitive.
    Name,
}

impl SortKey {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "score" => Some(SortKey::Score),
            "date" => Some(SortKey::Date),
            "name" => Some(SortKey::Name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardQuery {
    /// Case-insensitive substring of name or email.
    pub search: Option<String>,
    /// `None` means all statuses.
    pub status: Option<SessionStatus>,
    pub sort: SortKey,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardRow {
    /// 1-based position after filtering and sorting.
    pub rank: usize,
    pub session_id: SessionId,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: SessionStatus,
    pub final_score: Option<u32>,
    pub max_score: u32,
    pub percentage: Option<f64>,
    pub questions_answered: usize,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Projects sessions (newest first) into ranked dashboard rows.
pub fn build_rows<'a>(
    sessions: impl Iterator<Item = &'a Session>,
    query: &DashboardQuery,
) -> Vec<DashboardRow> {
    let needle = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let mut matching: Vec<&Session> = sessions
        .filter(|s| query.status.map(|status| s.status == status).unwrap_or(true))
        .filter(|s| match &needle {
            Some(needle) => [s.name.as_deref(), s.email.as_deref()]
                .into_iter()
                .flatten()
                .any(|value| value.to_lowercase().contains(needle.as_str())),
            None => true,
        })
        .collect();

    // Stable sort keeps the store's newest-first order among ties.
    match query.sort {
        SortKey::Score => matching.sort_by(|a, b| score_key(b).cmp(&score_key(a))),
        SortKey::Date => matching.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortKey::Name => matching.sort_by(|a, b| compare_names(a, b)),
    }

    matching
        .into_iter()
        .enumerate()
        .map(|(i, session)| DashboardRow {
            rank: i + 1,
            session_id: session.id,
            name: session.name.clone(),
            email: session.email.clone(),
            phone: session.phone.clone(),
            status: session.status,
            final_score: session.final_score,
            max_score: session.max_score(),
            percentage: session.final_summary.as_ref().map(|s| s.percentage),
            questions_answered: session.questions_answered(),
            created_at: session.created_at,
            completed_at: session.completed_at,
        })
        .collect()
}

/// Missing scores rank below zero.
fn score_key(session: &Session) -> i64 {
    session.final_score.map(i64::from).unwrap_or(-1)
}

fn compare_names(a: &Session, b: &Session) -> Ordering {
    let a = a.name.as_deref().unwrap_or_default();
    let b = b.name.as_deref().unwrap_or_default();
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}
