//! Progress orchestrator — records every state change of a job and pushes it
//! to the job's observer.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::error::SessionError;
use crate::observer::{ObserverChannel, ObserverRegistry, ObserverToken};
use crate::session::{
    ProcessingStatus, ProgressEvent, Session, SessionPatch, SessionResult, SessionResults,
    SessionStore,
};

/// Message pushed to a freshly attached observer.
pub const CONNECTED_MESSAGE: &str = "Connected";

/// Facade over the session store and observer registry.
///
/// [`ProgressOrchestrator::update`] is the only path that changes a session's
/// status, progress, message or results, and the only trigger for observer
/// notification.
pub struct ProgressOrchestrator {
    sessions: SessionStore,
    observers: ObserverRegistry,
    /// Serializes merge+push pairs per job id. Entries live as long as the
    /// session does.
    update_locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl ProgressOrchestrator {
    /// Create a new orchestrator with empty state.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sessions: SessionStore::new(),
            observers: ObserverRegistry::new(),
            update_locks: RwLock::new(HashMap::new()),
        })
    }

    async fn update_lock(&self, id: &str) -> Option<Arc<Mutex<()>>> {
        self.update_locks.read().await.get(id).cloned()
    }

    /// Store a new session, replacing any existing one with the same id.
    pub async fn create_session(&self, session: Session) {
        let id = session.id.clone();
        self.update_locks
            .write()
            .await
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())));
        self.sessions.create(session).await;
        info!(job_id = %id, "Session created");
    }

    /// Snapshot of a session, if it exists.
    pub async fn get_session(&self, id: &str) -> Option<Session> {
        self.sessions.get(id).await
    }

    /// Result view of a session.
    pub async fn get_result(&self, id: &str) -> Result<SessionResult, SessionError> {
        self.sessions
            .get(id)
            .await
            .map(|session| SessionResult::from(&session))
            .ok_or_else(|| SessionError::NotFound { id: id.to_string() })
    }

    /// Record a progress change and push it to the observer, if any.
    ///
    /// The session merge is skipped when no session exists for `id`, but the
    /// event is still pushed. Never fails.
    pub async fn update(
        &self,
        id: &str,
        status: ProcessingStatus,
        progress: u8,
        message: impl Into<String>,
        data: Option<SessionResults>,
    ) {
        let progress = progress.min(100);
        let message = message.into();
        let event = ProgressEvent {
            job_id: id.to_string(),
            status,
            progress_percentage: progress,
            message: message.clone(),
            data: data.clone(),
        };
        let patch = SessionPatch::progress(status, progress, message)
            .with_results(data.unwrap_or_default());

        let lock = self.update_lock(id).await;
        let _guard = match &lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        if !self.sessions.merge(id, patch).await {
            warn!(job_id = %id, status = %status, "Progress update for unknown session");
        }
        self.observers.push(id, &event).await;
    }

    /// Attach `channel` as the observer for `id`.
    ///
    /// If the session exists the observer immediately receives one event with
    /// the current status at 0% and a connection confirmation. Earlier events
    /// are not replayed.
    pub async fn attach_observer(
        &self,
        id: &str,
        channel: Arc<dyn ObserverChannel>,
    ) -> ObserverToken {
        let lock = self.update_lock(id).await;
        let _guard = match &lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let token = self.observers.attach(id, channel).await;
        if let Some(session) = self.sessions.get(id).await {
            let event = ProgressEvent {
                job_id: id.to_string(),
                status: session.status,
                progress_percentage: 0,
                message: CONNECTED_MESSAGE.to_string(),
                data: None,
            };
            self.observers.push(id, &event).await;
        }
        token
    }

    /// Remove the observer for `id`, whichever one it is.
    pub async fn detach_observer(&self, id: &str) {
        self.observers.detach(id).await;
    }

    /// Remove the observer for `id` only if `token` is still the current
    /// attachment.
    pub async fn detach_observer_if_current(&self, id: &str, token: ObserverToken) -> bool {
        self.observers.detach_if_current(id, token).await
    }

    /// Whether an observer is attached for `id`.
    pub async fn has_observer(&self, id: &str) -> bool {
        self.observers.is_attached(id).await
    }

    /// Drop the session, its stored source file and its observer.
    /// Safe to call repeatedly.
    pub async fn cleanup_session(&self, id: &str) {
        if self.sessions.remove(id).await.is_some() {
            info!(job_id = %id, "Session cleaned up");
        }
        self.observers.detach(id).await;
        self.update_locks.write().await.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::QueueChannel;

    async fn next_event(rx: &mut tokio::sync::mpsc::UnboundedReceiver<String>) -> ProgressEvent {
        serde_json::from_str(&rx.recv().await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn last_update_wins() {
        let orchestrator = ProgressOrchestrator::new();
        orchestrator.create_session(Session::new("A", "Paper")).await;

        orchestrator
            .update("A", ProcessingStatus::Transcribing, 10, "x", None)
            .await;
        orchestrator
            .update("A", ProcessingStatus::Completed, 100, "done", None)
            .await;

        let session = orchestrator.get_session("A").await.unwrap();
        assert_eq!(session.status, ProcessingStatus::Completed);
        assert_eq!(session.progress, 100);
        assert_eq!(session.message, "done");
    }

    #[tokio::test]
    async fn update_merges_results_and_pushes_data() {
        let orchestrator = ProgressOrchestrator::new();
        orchestrator.create_session(Session::new("A", "Paper")).await;
        let (channel, mut rx) = QueueChannel::new();
        orchestrator.attach_observer("A", channel).await;
        let _connected = next_event(&mut rx).await;

        orchestrator
            .update(
                "A",
                ProcessingStatus::Transcribing,
                25,
                "Transcription complete",
                Some(SessionResults::transcript("hello world")),
            )
            .await;

        let event = next_event(&mut rx).await;
        assert_eq!(event.progress_percentage, 25);
        assert_eq!(
            event.data.unwrap().transcript.as_deref(),
            Some("hello world")
        );
        let session = orchestrator.get_session("A").await.unwrap();
        assert_eq!(session.results.transcript.as_deref(), Some("hello world"));
    }

    #[tokio::test]
    async fn late_attach_gets_single_confirmation() {
        let orchestrator = ProgressOrchestrator::new();
        orchestrator.create_session(Session::new("A", "Paper")).await;
        for progress in [10, 25, 30] {
            orchestrator
                .update("A", ProcessingStatus::Summarizing, progress, "step", None)
                .await;
        }

        let (channel, mut rx) = QueueChannel::new();
        orchestrator.attach_observer("A", channel).await;

        let event = next_event(&mut rx).await;
        assert_eq!(event.status, ProcessingStatus::Summarizing);
        assert_eq!(event.progress_percentage, 0);
        assert_eq!(event.message, CONNECTED_MESSAGE);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn attach_without_session_sends_nothing() {
        let orchestrator = ProgressOrchestrator::new();
        let (channel, mut rx) = QueueChannel::new();
        orchestrator.attach_observer("ghost", channel).await;

        assert!(rx.try_recv().is_err());
        assert!(orchestrator.has_observer("ghost").await);
    }

    #[tokio::test]
    async fn update_without_session_still_pushes() {
        let orchestrator = ProgressOrchestrator::new();
        let (channel, mut rx) = QueueChannel::new();
        orchestrator.attach_observer("B", channel).await;

        orchestrator
            .update("B", ProcessingStatus::Transcribing, 10, "standalone", None)
            .await;

        assert_eq!(next_event(&mut rx).await.message, "standalone");
        assert!(orchestrator.get_session("B").await.is_none());
    }

    #[tokio::test]
    async fn push_failure_detaches_but_keeps_session() {
        let orchestrator = ProgressOrchestrator::new();
        orchestrator.create_session(Session::new("A", "Paper")).await;
        let (channel, rx) = QueueChannel::new();
        orchestrator.attach_observer("A", channel).await;
        drop(rx);

        orchestrator
            .update("A", ProcessingStatus::Transcribing, 10, "x", None)
            .await;

        assert!(!orchestrator.has_observer("A").await);
        let session = orchestrator.get_session("A").await.unwrap();
        assert_eq!(session.status, ProcessingStatus::Transcribing);
        assert_eq!(session.progress, 10);
    }

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let orchestrator = ProgressOrchestrator::new();
        orchestrator.create_session(Session::new("A", "Paper")).await;
        let (channel, _rx) = QueueChannel::new();
        orchestrator.attach_observer("A", channel).await;

        orchestrator.cleanup_session("A").await;
        orchestrator.cleanup_session("A").await;

        assert!(orchestrator.get_session("A").await.is_none());
        assert!(!orchestrator.has_observer("A").await);
    }

    #[tokio::test]
    async fn get_result_unknown_is_not_found() {
        let orchestrator = ProgressOrchestrator::new();
        let err = orchestrator.get_result("nope").await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound { id } if id == "nope"));
    }

    #[tokio::test]
    async fn concurrent_updates_on_separate_jobs() {
        let orchestrator = ProgressOrchestrator::new();
        for id in ["x", "y", "z"] {
            orchestrator.create_session(Session::new(id, id)).await;
        }

        let mut handles = Vec::new();
        for id in ["x", "y", "z"] {
            let orchestrator = Arc::clone(&orchestrator);
            handles.push(tokio::spawn(async move {
                for progress in 0..=100u8 {
                    orchestrator
                        .update(id, ProcessingStatus::Transcribing, progress, "tick", None)
                        .await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for id in ["x", "y", "z"] {
            assert_eq!(orchestrator.get_session(id).await.unwrap().progress, 100);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_updates_on_one_job_stay_consistent() {
        let orchestrator = ProgressOrchestrator::new();
        orchestrator.create_session(Session::new("A", "Paper")).await;
        let (channel, mut rx) = QueueChannel::new();
        orchestrator.attach_observer("A", channel).await;
        let _connected = next_event(&mut rx).await;

        let mut handles = Vec::new();
        for (status, prefix) in [
            (ProcessingStatus::Transcribing, "t"),
            (ProcessingStatus::Summarizing, "s"),
        ] {
            let orchestrator = Arc::clone(&orchestrator);
            handles.push(tokio::spawn(async move {
                for progress in 0..=100u8 {
                    orchestrator
                        .update("A", status, progress, format!("{prefix}{progress}"), None)
                        .await;
                    tokio::task::yield_now().await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut events = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            events.push(serde_json::from_str::<ProgressEvent>(&frame).unwrap());
        }
        assert_eq!(events.len(), 202);

        let last = events.last().unwrap();
        let session = orchestrator.get_session("A").await.unwrap();
        assert_eq!(last.status, session.status);
        assert_eq!(last.progress_percentage, session.progress);
        assert_eq!(last.message, session.message);
    }
}
