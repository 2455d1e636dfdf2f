//! Session data model — processing status, accumulated results, and the
//! progress event pushed to observers.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stage of a job's pipeline.
///
/// `Pending → Uploading → Transcribing → Summarizing → Exporting → Completed`,
/// with `Error` reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Uploading,
    Transcribing,
    Summarizing,
    Exporting,
    Completed,
    Error,
}

impl Default for ProcessingStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl ProcessingStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Uploading => 1,
            Self::Transcribing => 2,
            Self::Summarizing => 3,
            Self::Exporting => 4,
            Self::Completed => 5,
            Self::Error => 6,
        }
    }

    /// Check if this state allows transitioning to another state.
    ///
    /// Staying in the same state is allowed (progress updates within a stage).
    pub fn can_transition_to(&self, target: ProcessingStatus) -> bool {
        if self.is_terminal() {
            return *self == target;
        }
        target == Self::Error || target.rank() >= self.rank()
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Transcribing => "transcribing",
            Self::Summarizing => "summarizing",
            Self::Exporting => "exporting",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Outputs accumulated across pipeline stages.
///
/// Every field is optional; [`SessionResults::merge`] only overwrites fields
/// that are set on the incoming value, so partial results from successive
/// stages accumulate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResults {
    /// Stored source audio file. Deleted when the session is cleaned up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_reference: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Locator of the exported note (an `obsidian://` URI).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_locator: Option<String>,
}

impl SessionResults {
    pub fn transcript(text: impl Into<String>) -> Self {
        Self {
            transcript: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn summary(text: impl Into<String>) -> Self {
        Self {
            summary: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn export_locator(locator: impl Into<String>) -> Self {
        Self {
            export_locator: Some(locator.into()),
            ..Default::default()
        }
    }

    /// Shallow merge: fields set on `other` replace ours.
    pub fn merge(&mut self, other: SessionResults) {
        if other.source_reference.is_some() {
            self.source_reference = other.source_reference;
        }
        if other.transcript.is_some() {
            self.transcript = other.transcript;
        }
        if other.summary.is_some() {
            self.summary = other.summary;
        }
        if other.export_locator.is_some() {
            self.export_locator = other.export_locator;
        }
    }
}

/// The durable record of one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub status: ProcessingStatus,
    /// 0–100.
    pub progress: u8,
    /// Latest stage description.
    pub message: String,
    /// Paper title used as summarization and export context.
    pub title: String,
    /// Name of the uploaded file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub results: SessionResults,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a pending session.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: ProcessingStatus::Pending,
            progress: 0,
            message: String::new(),
            title: title.into(),
            file_name: None,
            results: SessionResults::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach the stored source file the pipeline will transcribe.
    pub fn with_source(mut self, path: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        self.results.source_reference = Some(path.into());
        self.file_name = Some(file_name.into());
        self
    }

    /// Apply a partial update.
    pub fn apply(&mut self, patch: SessionPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(progress) = patch.progress {
            self.progress = progress.min(100);
        }
        if let Some(message) = patch.message {
            self.message = message;
        }
        if let Some(title) = patch.title {
            self.title = title;
        }
        self.results.merge(patch.results);
        self.updated_at = Utc::now();
    }
}

/// Fields to merge into an existing session. Unset fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub status: Option<ProcessingStatus>,
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub title: Option<String>,
    pub results: SessionResults,
}

impl SessionPatch {
    /// The status/progress/message triple written by every progress update.
    pub fn progress(status: ProcessingStatus, progress: u8, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            progress: Some(progress),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_results(mut self, results: SessionResults) -> Self {
        self.results = results;
        self
    }
}

/// Event pushed to an attached observer on every progress update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub job_id: String,
    pub status: ProcessingStatus,
    pub progress_percentage: u8,
    pub message: String,
    #[serde(default)]
    pub data: Option<SessionResults>,
}

/// Result view returned to the request layer.
///
/// Missing pieces of an existing session are reported as empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResult {
    pub session_id: String,
    pub status: ProcessingStatus,
    pub transcript: String,
    pub summary: String,
    pub title: String,
    pub export_locator: String,
}

impl From<&Session> for SessionResult {
    fn from(session: &Session) -> Self {
        let results = &session.results;
        Self {
            session_id: session.id.clone(),
            status: session.status,
            transcript: results.transcript.clone().unwrap_or_default(),
            summary: results.summary.clone().unwrap_or_default(),
            title: session.title.clone(),
            export_locator: results.export_locator.clone().unwrap_or_default(),
        }
    }
}
