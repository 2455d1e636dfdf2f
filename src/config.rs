//! Configuration types.

use std::path::Path;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::error::ConfigError;

/// Default hint given to the speech-to-text model so academic vocabulary is
/// recognised.
pub const DEFAULT_TRANSCRIPTION_PROMPT: &str = "This is a recording of a discussion about an academic paper. \
It may contain technical terms such as deep learning, machine learning, neural networks, \
Transformer, BERT, GPT, data science, artificial intelligence, algorithms, model training \
and natural language processing.";

/// Top-level service configuration.
#[derive(Debug, Clone, Default)]
pub struct NotesConfig {
    pub server: ServerConfig,
    pub transcription: TranscriptionConfig,
    pub summarization: SummarizationConfig,
    pub export: ExportConfig,
    pub uploads: UploadConfig,
    pub pipeline: PipelineConfig,
}

impl NotesConfig {
    /// Build a configuration from environment variables, falling back to
    /// defaults for anything unset.
    ///
    /// `OPENAI_API_KEY` is shared by the transcription and summarization
    /// clients. When `require_api_key` is set a missing key is an error.
    pub fn from_env(require_api_key: bool) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.trim().is_empty() => {
                config.transcription.api_key = SecretString::from(key.clone());
                config.summarization.api_key = SecretString::from(key);
            }
            _ if require_api_key => {
                return Err(ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()));
            }
            _ => {}
        }

        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            config.transcription.base_url = base_url.clone();
            config.summarization.base_url = base_url;
        }
        if let Ok(model) = std::env::var("PAPER_NOTES_WHISPER_MODEL") {
            config.transcription.model = model;
        }
        if let Ok(model) = std::env::var("PAPER_NOTES_CHAT_MODEL") {
            config.summarization.model = model;
        }
        if let Ok(host) = std::env::var("PAPER_NOTES_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("PAPER_NOTES_PORT") {
            config.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PAPER_NOTES_PORT".to_string(),
                message: format!("{port:?} is not a valid port"),
            })?;
        }
        if let Ok(origin) = std::env::var("PAPER_NOTES_CORS_ORIGIN") {
            config.server.cors_origin = origin;
        }
        if let Ok(vault) = std::env::var("DEFAULT_OBSIDIAN_VAULT") {
            config.export.default_vault = vault;
        }
        if let Ok(path) = std::env::var("DEFAULT_PAPER_PATH") {
            config.export.default_path = path;
        }
        if let Ok(dir) = std::env::var("PAPER_NOTES_UPLOAD_DIR") {
            config.uploads.upload_dir = dir;
        }

        Ok(config)
    }

    /// Whether an API key is available to the remote collaborators.
    pub fn api_key_configured(&self) -> bool {
        !self.transcription.api_key.expose_secret().is_empty()
            && !self.summarization.api_key.expose_secret().is_empty()
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Browser origin allowed by CORS (the web client's dev server).
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origin: "http://localhost:3000".to_string(),
        }
    }
}

/// Speech-to-text client settings.
#[derive(Debug, Clone)]
pub struct TranscriptionConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub model: String,
    /// Spoken language hint passed to the service.
    pub language: String,
    pub prompt: String,
    pub timeout: Duration,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            api_key: SecretString::from(String::new()),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "whisper-1".to_string(),
            language: "zh".to_string(),
            prompt: DEFAULT_TRANSCRIPTION_PROMPT.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Chat-completion client settings.
#[derive(Debug, Clone)]
pub struct SummarizationConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Replaces the built-in academic note template when set.
    pub custom_prompt: Option<String>,
    pub timeout: Duration,
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            api_key: SecretString::from(String::new()),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 2000,
            temperature: 0.3,
            custom_prompt: None,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Obsidian export defaults.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub default_vault: String,
    /// Folder inside the vault that notes are written to.
    pub default_path: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_vault: "Paper-Note".to_string(),
            default_path: "Papers/Summaries".to_string(),
        }
    }
}

/// Source file constraints.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub upload_dir: String,
    pub allowed_extensions: Vec<String>,
    pub max_file_size_mb: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            upload_dir: "uploads".to_string(),
            allowed_extensions: [".mp3", ".m4a", ".wav", ".mp4", ".flac", ".ogg"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_file_size_mb: 30,
        }
    }
}

impl UploadConfig {
    /// Lowercased extension of `path` including the leading dot, or an empty
    /// string if it has none.
    pub fn extension_of(path: &Path) -> String {
        path.extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
            .unwrap_or_default()
    }

    /// Whether `path` has one of the allowed audio extensions.
    pub fn is_allowed(&self, path: &Path) -> bool {
        let ext = Self::extension_of(path);
        self.allowed_extensions.iter().any(|allowed| *allowed == ext)
    }
}

/// Job driver tuning.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Pause between entering the export stage and building the note, so the
    /// transition is visible to observers.
    pub export_pause: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            export_pause: Duration::from_millis(500),
        }
    }
}
