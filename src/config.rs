//! Configuration primitives for InterviewBase.
//!
//! Stored in a machine-readable TOML file located at:
//!   %APPDATA%/InterviewBase/config/config.toml on Windows
//!   $XDG_DATA_HOME/InterviewBase/config/config.toml on Linux
//!   ~/Library/Application Support/InterviewBase/config/config.toml on macOS
//!
//! The config tracks the text-generation service settings, interview pacing,
//! contact-field validation strictness and the optional session snapshot.

use serde::{Deserialize, Serialize};

/// Root configuration persisted per installation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Remote text-generation service (question generation, summaries).
    #[serde(default)]
    pub ai: AiSettings,
    /// Countdown pacing and scoring failure policy.
    #[serde(default)]
    pub interview: InterviewSettings,
    /// Contact-field validation strictness used during profile collection.
    #[serde(default)]
    pub validation: ValidationSettings,
    /// Optional snapshot of the session store between runs.
    #[serde(default)]
    pub storage: StorageSettings,
}

/// Settings for the remote text-generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSettings {
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Attempts per remote call, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry; doubled after every transient failure.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl AiSettings {
    /// Reads the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

const fn default_temperature() -> f32 {
    0.7
}

const fn default_max_output_tokens() -> u32 {
    1000
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_base_delay_ms() -> u64 {
    2000
}

const fn default_request_timeout_secs() -> u64 {
    60
}

/// Interview pacing and failure policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewSettings {
    /// Length of one countdown tick in milliseconds.
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
    /// Consecutive scoring failures tolerated before a question is scored 0.
    #[serde(default = "default_max_scoring_failures")]
    pub max_scoring_failures: u32,
}

impl Default for InterviewSettings {
    fn default() -> Self {
        Self {
            tick_millis: default_tick_millis(),
            max_scoring_failures: default_max_scoring_failures(),
        }
    }
}

const fn default_tick_millis() -> u64 {
    1000
}

const fn default_max_scoring_failures() -> u32 {
    3
}

/// Contact-field validation knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSettings {
    /// Minimum phone length (characters from digits, space, `+`, `-`, parentheses).
    #[serde(default = "default_phone_min_chars")]
    pub phone_min_chars: usize,
    /// Also require `phone_min_chars` digits, rejecting inputs like `----------`.
    #[serde(default)]
    pub strict_phone: bool,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            phone_min_chars: default_phone_min_chars(),
            strict_phone: false,
        }
    }
}

const fn default_phone_min_chars() -> usize {
    10
}

/// Session snapshot settings. Sessions are in-memory unless `restore_snapshot` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub restore_snapshot: bool,
    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            restore_snapshot: false,
            snapshot_file: default_snapshot_file(),
        }
    }
}

fn default_snapshot_file() -> String {
    "sessions.json".to_string()
}

/// Standard relative path to the config file (resolved per OS at runtime).
pub const CONFIG_FILE_NAME: &str = "config.toml";

use anyhow::{Context, Result};
use directories::BaseDirs;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Returns the root directory where InterviewBase stores data.
///
/// Order of precedence:
/// 1. `INTERVIEWBASE_HOME` environment variable.
/// 2. OS-specific data directory via `directories::BaseDirs`.
pub fn workspace_root() -> Result<PathBuf> {
    if let Ok(path) = env::var("INTERVIEWBASE_HOME") {
        return Ok(PathBuf::from(path));
    }
    let base_dirs = BaseDirs::new().context("Unable to determine OS data directory")?;
    Ok(base_dirs.data_dir().join("InterviewBase"))
}

pub fn config_dir() -> Result<PathBuf> {
    Ok(workspace_root()?.join("config"))
}

pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Location of the session snapshot inside the workspace.
pub fn snapshot_path(config: &AppConfig) -> Result<PathBuf> {
    Ok(workspace_root()?
        .join("sessions")
        .join(&config.storage.snapshot_file))
}

/// Loads the configuration from disk or returns defaults.
pub fn load_or_default() -> Result<AppConfig> {
    let path = config_file_path()?;
    if path.exists() {
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let cfg: AppConfig = toml::from_str(&data)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(cfg)
    } else {
        Ok(AppConfig::default())
    }
}

/// Persists the configuration to disk.
pub fn save(config: &AppConfig) -> Result<()> {
    let dir = config_dir()?;
    fs::create_dir_all(&dir)?;
    let path = config_file_path()?;
    let data = toml::to_string_pretty(config)?;
    fs::write(&path, data)?;
    Ok(())
}
