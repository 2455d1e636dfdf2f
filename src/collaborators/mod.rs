//! External pipeline collaborators.
//!
//! The job driver only sees these traits:
//! - `Transcriber` — speech-to-text for a stored audio file
//! - `Summarizer` — transcript → Markdown notes
//! - `NoteExporter` — notes → locator for the exported note
//!
//! Concrete implementations talk to an OpenAI-compatible API (`whisper`,
//! `chat`) and build Obsidian URIs (`obsidian`).

pub mod chat;
pub mod obsidian;
pub mod whisper;

pub use chat::ChatSummarizer;
pub use obsidian::ObsidianExporter;
pub use whisper::WhisperTranscriber;

use std::path::Path;

use async_trait::async_trait;

use crate::error::{ExportError, SummarizationError, TranscriptionError};

/// Speech-to-text service.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the audio file at `source`. `prompt` overrides the
    /// configured vocabulary hint.
    async fn transcribe(
        &self,
        source: &Path,
        prompt: Option<&str>,
    ) -> Result<String, TranscriptionError>;
}

/// Text-generation service producing Markdown notes.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `transcript`, using `title` as context.
    async fn summarize(&self, transcript: &str, title: &str) -> Result<String, SummarizationError>;
}

/// Where and how a note is exported.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Target vault; the configured default when unset.
    pub vault: Option<String>,
    /// Path of the note inside the vault; derived from the title when unset.
    pub file_path: Option<String>,
    /// Check that the destination exists before building the locator.
    pub validate: bool,
}

impl ExportOptions {
    /// Options for use inside a background job: defaults, no validation.
    pub fn non_blocking() -> Self {
        Self::default()
    }
}

/// Note export target.
pub trait NoteExporter: Send + Sync {
    /// Build the locator that creates the note titled `title` holding `content`.
    fn build_export_target(
        &self,
        title: &str,
        content: &str,
        options: &ExportOptions,
    ) -> Result<String, ExportError>;
}
