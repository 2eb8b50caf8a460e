//! Heuristic contact-field extraction from resume text.

use regex::Regex;
use std::sync::OnceLock;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}").expect("valid email regex")
    })
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\+?\d[\d\-\s()]{7,}\d").expect("valid phone regex"))
}

fn whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"))
}

/// Name lines are short: at most this many words.
const MAX_NAME_WORDS: usize = 4;
/// Fallback name search only looks at the top of the document.
const NAME_SCAN_LINES: usize = 6;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ExtractedFields {
    pub fn from_text(text: &str) -> Self {
        let email = extract_email(text);
        Self {
            name: extract_name(text, email.as_deref()),
            phone: extract_phone(text),
            email,
        }
    }
}

/// First email-looking token.
pub fn extract_email(text: &str) -> Option<String> {
    email_regex().find(text).map(|m| m.as_str().to_string())
}

/// First phone-looking run, whitespace collapsed.
pub fn extract_phone(text: &str) -> Option<String> {
    let raw = phone_regex().find(text)?.as_str();
    let collapsed = whitespace_regex().replace_all(raw, " ");
    let trimmed = collapsed.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Prefers the short line right above the one containing `email`; otherwise
/// the first short, digit-free line near the top.
pub fn extract_name(text: &str, email: Option<&str>) -> Option<String> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let email_line = email
        .filter(|email| !email.is_empty())
        .and_then(|email| lines.iter().position(|line| line.contains(email)));
    if let Some(email_line) = email_line {
        if email_line > 0 {
            let candidate = lines[email_line - 1];
            if word_count(candidate) <= MAX_NAME_WORDS {
                return Some(candidate.to_string());
            }
        }
    }

    lines
        .iter()
        .take(NAME_SCAN_LINES)
        .find(|line| {
            !line.chars().any(|c| c.is_ascii_digit()) && word_count(line) <= MAX_NAME_WORDS
        })
        .map(|line| line.to_string())
}

fn word_count(line: &str) -> usize {
    line.split_whitespace().count()
}
