//! Error types for Paper Notes.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Transcription error: {0}")]
    Transcription(#[from] TranscriptionError),

    #[error("Summarization error: {0}")]
    Summarization(#[from] SummarizationError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Session-scoped errors surfaced to the request layer.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session {id} not found")]
    NotFound { id: String },

    #[error("Session {id} has no source file")]
    MissingSource { id: String },

    #[error("Unsupported file type {extension:?}, allowed: {allowed}")]
    UnsupportedFile { extension: String, allowed: String },

    #[error("Source file {path} is outside the upload directory")]
    OutsideUploadDir { path: String },
}

/// Speech-to-text failures.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("Connection to transcription service failed: {0}")]
    Connectivity(String),

    #[error("Transcription service returned {status}: {body}")]
    RemoteService { status: u16, body: String },

    #[error("Invalid audio input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Summary generation failures.
#[derive(Debug, thiserror::Error)]
pub enum SummarizationError {
    #[error("Connection to summarization service failed: {0}")]
    Connectivity(String),

    #[error("Summarization service returned {status}: {body}")]
    RemoteService { status: u16, body: String },

    #[error("Summarization service returned no content")]
    EmptyResponse,
}

/// Note export failures.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Export destination not found: {0}")]
    DestinationNotFound(String),

    #[error("Invalid export input: {0}")]
    InvalidInput(String),
}

/// Any failure raised by an external pipeline stage.
///
/// The display text names the stage so it can be embedded directly into a
/// session's ERROR message.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("transcription failed: {0}")]
    Transcription(#[from] TranscriptionError),

    #[error("summarization failed: {0}")]
    Summarization(#[from] SummarizationError),

    #[error("export failed: {0}")]
    Export(#[from] ExportError),
}

/// Observer delivery failures. Always recovered inside the registry.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Observer channel closed")]
    Closed,

    #[error("Failed to serialize progress event: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
