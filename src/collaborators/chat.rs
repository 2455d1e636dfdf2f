//! OpenAI-compatible chat-completions summarizer.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::Summarizer;
use crate::config::SummarizationConfig;
use crate::error::SummarizationError;

const SYSTEM_PROMPT: &str = "You are a professional academic research assistant who analyses \
academic papers and produces structured key-point summaries.";

/// Default note template. The title and transcript are appended by
/// [`build_prompt`].
pub const DEFAULT_ACADEMIC_PROMPT: &str = r#"# Role: Academic research assistant

## Context:
I just listened to a podcast episode discussing an academic paper and transcribed it with a speech-to-text model. The transcript follows.

## Task:
Using the transcript, write clear, well-organised notes on the key points of the paper in Markdown.

## Output Format:
Follow this Markdown structure strictly. If information for a section is missing, leave it empty or write "Unknown":

### Problem Statement
- (The core problem or research goal the paper addresses.)

### Methodology
- (Main methods, experimental design, datasets or theoretical framework.)

### Key Findings
- (2-4 bullet points with the most important results.)

### Conclusion & Future Work
- (Contributions, limitations and future directions mentioned by the authors.)

## Instructions:
1. Keep an objective, neutral academic tone
2. Highlight key information and avoid verbosity
3. Where the transcript is unclear, infer sensibly from context
4. Make sure the Markdown is valid and readable"#;

/// Assemble the user prompt from a template, the paper title and the
/// transcript.
pub fn build_prompt(template: &str, title: &str, transcript: &str) -> String {
    format!(
        "{template}\n\n## Paper title\n{title}\n\n## Transcript:\n\"\"\"\n{transcript}\n\"\"\""
    )
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Summarizes transcripts via `{base_url}/chat/completions`.
pub struct ChatSummarizer {
    config: SummarizationConfig,
    client: reqwest::Client,
}

impl ChatSummarizer {
    pub fn new(config: SummarizationConfig) -> Result<Self, SummarizationError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SummarizationError::Connectivity(e.to_string()))?;

        info!(model = %config.model, "Summarization client initialized");
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Summarizer for ChatSummarizer {
    async fn summarize(&self, transcript: &str, title: &str) -> Result<String, SummarizationError> {
        let template = self
            .config
            .custom_prompt
            .as_deref()
            .unwrap_or(DEFAULT_ACADEMIC_PROMPT);
        let prompt = build_prompt(template, title, transcript);

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        debug!(title = %title, chars = transcript.len(), "Requesting summary");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| SummarizationError::Connectivity(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizationError::RemoteService {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| SummarizationError::Connectivity(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(SummarizationError::EmptyResponse)
    }
}
