//! Saved login for techcarectl.
//!
//! Stored at `$XDG_STATE_HOME/techcare/session.json` (fallback
//! `~/.local/state/techcare/session.json`), or `$TECHCARE_SESSION_FILE`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use techcare_shared::Role;

pub const SESSION_ENV: &str = "TECHCARE_SESSION_FILE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub server: String,
    pub username: String,
    pub role: Role,
    pub access_token: String,
    pub refresh_token: String,
    pub saved_at: DateTime<Utc>,
}

/// Session file location
pub fn session_path() -> PathBuf {
    if let Ok(path) = std::env::var(SESSION_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    let state_dir = dirs::state_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("state")))
        .unwrap_or_else(|| PathBuf::from("."));
    state_dir.join("techcare").join("session.json")
}

impl Session {
    /// `None` when no session was saved
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading session {}", path.display()))?;
        let session = serde_json::from_str(&content)
            .with_context(|| format!("parsing session {}", path.display()))?;
        Ok(Some(session))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self)?;
        write_private(&tmp, json.as_bytes())
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("saving session {}", path.display()))?;
        Ok(())
    }

    /// Remove the session file; true if one existed
    pub fn clear(path: &Path) -> Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
        }
    }
}

/// Create `path` readable only by the owner. A stale file is replaced so
/// the mode is set at creation.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}
