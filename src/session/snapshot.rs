//! Optional on-disk copy of the session store, keyed by session id.
//!
//! Sessions are in-memory by default. When snapshots are enabled the store is
//! written verbatim after state changes and read back on startup.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use tokio::task::JoinHandle;

use super::store::SessionStore;

/// Reads a snapshot; a missing file is `None`.
pub fn load(path: &Path) -> Result<Option<SessionStore>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read session snapshot {}", path.display()))?;
    let mut store: SessionStore = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse session snapshot {}", path.display()))?;
    store.repair_indexes();
    Ok(Some(store))
}

/// Writes through a temporary file so a crash never leaves half a file.
fn write_file(path: &Path, data: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data)
        .with_context(|| format!("Failed to write session snapshot {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move session snapshot to {}", path.display()))?;
    Ok(())
}

/// Serializes on the caller's thread and writes on the blocking pool.
///
/// Writes are numbered when issued; a write that reaches the disk after a
/// newer one is dropped.
#[derive(Debug)]
pub struct SnapshotWriter {
    path: PathBuf,
    issued: AtomicU64,
    written: Arc<Mutex<u64>>,
}

impl SnapshotWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            issued: AtomicU64::new(0),
            written: Arc::new(Mutex::new(0)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Must be called from within a tokio runtime.
    pub fn write(&self, store: &SessionStore) -> Result<JoinHandle<()>> {
        let data = serde_json::to_string_pretty(store).context("Failed to serialize sessions")?;
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let path = self.path.clone();
        let written = self.written.clone();
        Ok(tokio::task::spawn_blocking(move || {
            let mut last = written.lock().unwrap_or_else(PoisonError::into_inner);
            if seq <= *last {
                tracing::debug!(seq, last = *last, "skipping superseded session snapshot");
                return;
            }
            match write_file(&path, &data) {
                Ok(()) => *last = seq,
                Err(err) => tracing::warn!(
                    path = %path.display(),
                    error = %format!("{err:#}"),
                    "failed to write session snapshot"
                ),
            }
        }))
    }
}
