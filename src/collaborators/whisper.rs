//! OpenAI-compatible speech-to-text client.

use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart;
use secrecy::ExposeSecret;
use tracing::{debug, info};

use super::Transcriber;
use crate::config::TranscriptionConfig;
use crate::error::TranscriptionError;

/// Sends stored audio files to `{base_url}/audio/transcriptions`.
pub struct WhisperTranscriber {
    config: TranscriptionConfig,
    client: reqwest::Client,
}

impl WhisperTranscriber {
    pub fn new(config: TranscriptionConfig) -> Result<Self, TranscriptionError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TranscriptionError::Connectivity(e.to_string()))?;

        info!(model = %config.model, "Transcription client initialized");
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(
        &self,
        source: &Path,
        prompt: Option<&str>,
    ) -> Result<String, TranscriptionError> {
        let bytes = tokio::fs::read(source).await?;
        if bytes.is_empty() {
            return Err(TranscriptionError::InvalidInput(format!(
                "{} is empty",
                source.display()
            )));
        }

        let file_name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        debug!(file = %file_name, bytes = bytes.len(), "Uploading audio for transcription");

        let form = multipart::Form::new()
            .text("model", self.config.model.clone())
            .text("prompt", prompt.unwrap_or(&self.config.prompt).to_string())
            .text("language", self.config.language.clone())
            .text("response_format", "text")
            .part("file", multipart::Part::bytes(bytes).file_name(file_name));

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.config.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::Connectivity(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TranscriptionError::Connectivity(e.to_string()))?;

        if !status.is_success() {
            return Err(TranscriptionError::RemoteService {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body.trim().to_string())
    }
}
