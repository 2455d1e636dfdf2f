//! Job driver — runs transcribe → summarize → export for one session.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::collaborators::{
    ChatSummarizer, ExportOptions, NoteExporter, ObsidianExporter, Summarizer, Transcriber,
    WhisperTranscriber,
};
use crate::config::{NotesConfig, PipelineConfig};
use crate::error::{CollaboratorError, SessionError, TranscriptionError};
use crate::orchestrator::ProgressOrchestrator;
use crate::session::{ProcessingStatus, Session, SessionResults};

/// Message recorded when the note has been exported.
pub const EXPORTED_MESSAGE: &str = "Note exported to Obsidian";

/// Everything the driver needs.
pub struct JobDeps {
    pub orchestrator: Arc<ProgressOrchestrator>,
    pub transcriber: Arc<dyn Transcriber>,
    pub summarizer: Arc<dyn Summarizer>,
    pub exporter: Arc<dyn NoteExporter>,
    pub config: PipelineConfig,
}

/// Runs pipeline jobs as background tasks.
pub struct JobDriver {
    deps: JobDeps,
}

impl JobDriver {
    pub fn new(deps: JobDeps) -> Arc<Self> {
        Arc::new(Self { deps })
    }

    /// Wire the HTTP-backed collaborators described by `config`.
    pub fn from_config(
        orchestrator: Arc<ProgressOrchestrator>,
        config: &NotesConfig,
    ) -> crate::error::Result<Arc<Self>> {
        Ok(Self::new(JobDeps {
            orchestrator,
            transcriber: Arc::new(WhisperTranscriber::new(config.transcription.clone())?),
            summarizer: Arc::new(ChatSummarizer::new(config.summarization.clone())?),
            exporter: Arc::new(ObsidianExporter::new(config.export.clone())),
            config: config.pipeline.clone(),
        }))
    }

    pub fn orchestrator(&self) -> &Arc<ProgressOrchestrator> {
        &self.deps.orchestrator
    }

    /// Spawn the pipeline for session `id` and return without waiting for it.
    ///
    /// The returned handle is only needed to await or abort the job; dropping
    /// it leaves the job running.
    pub async fn start_job(self: &Arc<Self>, id: &str) -> Result<JoinHandle<()>, SessionError> {
        if self.deps.orchestrator.get_session(id).await.is_none() {
            return Err(SessionError::NotFound { id: id.to_string() });
        }

        let driver = Arc::clone(self);
        let id = id.to_string();
        Ok(tokio::spawn(async move { driver.run(&id).await }))
    }

    /// Run the whole pipeline for `id` in the current task.
    ///
    /// Transcription and summarization failures end the job in ERROR; an
    /// export failure still completes it with a warning. Nothing is retried.
    pub async fn run(&self, id: &str) {
        let orchestrator = &self.deps.orchestrator;
        let Some(session) = orchestrator.get_session(id).await else {
            warn!(job_id = %id, "Job started for unknown session");
            return;
        };

        info!(job_id = %id, title = %session.title, "Job started");
        match self.run_stages(&session).await {
            Ok(()) => info!(job_id = %id, "Job finished"),
            Err(e) => {
                error!(job_id = %id, error = %e, "Job failed");
                orchestrator
                    .update(
                        id,
                        ProcessingStatus::Error,
                        0,
                        format!("Processing failed: {e}"),
                        None,
                    )
                    .await;
            }
        }
    }

    async fn run_stages(&self, session: &Session) -> Result<(), CollaboratorError> {
        let orchestrator = &self.deps.orchestrator;
        let id = session.id.as_str();
        let source = session.results.source_reference.clone().ok_or_else(|| {
            TranscriptionError::InvalidInput("session has no source file".to_string())
        })?;

        orchestrator
            .update(id, ProcessingStatus::Transcribing, 10, "Starting transcription...", None)
            .await;
        let transcript = self.deps.transcriber.transcribe(&source, None).await?;
        orchestrator
            .update(
                id,
                ProcessingStatus::Transcribing,
                25,
                "Transcription complete",
                Some(SessionResults::transcript(transcript.clone())),
            )
            .await;

        orchestrator
            .update(id, ProcessingStatus::Summarizing, 30, "Generating summary...", None)
            .await;
        let summary = self
            .deps
            .summarizer
            .summarize(&transcript, &session.title)
            .await?;
        orchestrator
            .update(
                id,
                ProcessingStatus::Summarizing,
                50,
                "Summary complete",
                Some(SessionResults::summary(summary.clone())),
            )
            .await;

        orchestrator
            .update(id, ProcessingStatus::Exporting, 75, "Exporting note to Obsidian...", None)
            .await;
        if !self.deps.config.export_pause.is_zero() {
            tokio::time::sleep(self.deps.config.export_pause).await;
        }

        match self.deps.exporter.build_export_target(
            &session.title,
            &summary,
            &ExportOptions::non_blocking(),
        ) {
            Ok(locator) => {
                orchestrator
                    .update(
                        id,
                        ProcessingStatus::Completed,
                        100,
                        EXPORTED_MESSAGE,
                        Some(SessionResults::export_locator(locator)),
                    )
                    .await;
            }
            Err(e) => {
                let e = CollaboratorError::from(e);
                warn!(job_id = %id, error = %e, "Export failed, completing without note");
                orchestrator
                    .update(
                        id,
                        ProcessingStatus::Completed,
                        90,
                        format!("Summary complete, {e}"),
                        None,
                    )
                    .await;
            }
        }

        Ok(())
    }

    /// Build a note locator on demand, with destination validation.
    ///
    /// When the request names a session, the locator is recorded on it and
    /// the session is marked completed.
    pub async fn export_note(&self, request: ExportRequest) -> ExportOutcome {
        let options = ExportOptions {
            vault: request.vault,
            file_path: request.file_path,
            validate: true,
        };

        match self
            .deps
            .exporter
            .build_export_target(&request.title, &request.content, &options)
        {
            Ok(uri) => {
                if let Some(id) = &request.session_id {
                    self.deps
                        .orchestrator
                        .update(
                            id,
                            ProcessingStatus::Completed,
                            100,
                            EXPORTED_MESSAGE,
                            Some(SessionResults::export_locator(uri.clone())),
                        )
                        .await;
                }
                ExportOutcome {
                    uri,
                    success: true,
                    message: "Obsidian URI created".to_string(),
                }
            }
            Err(e) => {
                warn!(error = %e, "On-demand export failed");
                ExportOutcome {
                    uri: String::new(),
                    success: false,
                    message: format!("Export failed: {e}"),
                }
            }
        }
    }
}

/// On-demand export of edited notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub vault: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOutcome {
    pub uri: String,
    pub success: bool,
    pub message: String,
}
