//! Session store — in-memory per-job records.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::model::{Session, SessionPatch};

/// Owns every session record, keyed by job id.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a session. An existing record with the same id is replaced;
    /// keeping ids unique is the caller's job.
    pub async fn create(&self, session: Session) {
        let id = session.id.clone();
        if self.sessions.write().await.insert(id.clone(), session).is_some() {
            debug!(job_id = %id, "Session replaced by create");
        }
    }

    /// Get a snapshot of a session.
    pub async fn get(&self, id: &str) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Merge `patch` into an existing session. Returns `false` (and changes
    /// nothing) if there is no session for `id`.
    pub async fn merge(&self, id: &str, patch: SessionPatch) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(id) {
            Some(session) => {
                session.apply(patch);
                true
            }
            None => false,
        }
    }

    /// Remove a session and delete its stored source file.
    ///
    /// File deletion is best-effort: failures are logged and swallowed.
    pub async fn remove(&self, id: &str) -> Option<Session> {
        let removed = self.sessions.write().await.remove(id)?;

        if let Some(path) = &removed.results.source_reference {
            match tokio::fs::remove_file(path).await {
                Ok(()) => debug!(job_id = %id, path = %path.display(), "Source file deleted"),
                Err(e) => warn!(
                    job_id = %id,
                    path = %path.display(),
                    error = %e,
                    "Failed to delete source file"
                ),
            }
        }

        Some(removed)
    }

    /// Number of stored sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
