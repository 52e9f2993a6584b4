//! File-backed session store.
//!
//! Persists the last-known session as JSON under the platform config dir
//! (`~/.config/parley/session.json` on Linux). The store is best-effort
//! convenience state: every IO or parse failure is logged and swallowed,
//! and a malformed record reads as no record at all.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use parley_core::session::{Session, SessionStore};

const SESSION_FILE: &str = "session.json";

/// Session store writing a single JSON record to disk.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Creates a store at the default platform location, or `None` when no
    /// config directory can be resolved.
    pub fn new() -> Option<Self> {
        let path = dirs::config_dir()?.join("parley").join(SESSION_FILE);
        Some(Self { path })
    }

    /// Creates a store at an explicit path.
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Option<Session> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) => {
                debug!(path = %self.path.display(), error = %err, "no session record");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(session) => Some(session),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "ignoring malformed session record");
                None
            }
        }
    }

    async fn save(&self, session: &Session) {
        let json = match serde_json::to_string_pretty(session) {
            Ok(json) => json,
            Err(err) => {
                warn!(error = %err, "failed to serialize session record");
                return;
            }
        };
        if let Some(parent) = self.path.parent() {
            if let Err(err) = fs::create_dir_all(parent).await {
                warn!(path = %parent.display(), error = %err, "failed to create session directory");
                return;
            }
        }
        if let Err(err) = fs::write(&self.path, json).await {
            warn!(path = %self.path.display(), error = %err, "failed to write session record");
        }
    }

    async fn clear(&self) {
        if let Err(err) = fs::remove_file(&self.path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %err, "failed to remove session record");
            }
        }
    }
}
