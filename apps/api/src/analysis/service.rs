//! Analysis service — the single point of entry for all model calls.
//!
//! The contract takes a document handle plus an instruction payload and
//! returns a raw message whose content is either a plain string or a sequence
//! of text parts. `MessageContent::into_text` is the one adapter that
//! normalizes this ambiguity; nothing downstream sees both shapes.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::analysis::instructions::ANALYSIS_SYSTEM;
use crate::stores::{DocumentStore, StoreError};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all analysis calls.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 4096;
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("analysis service returned no content")]
    EmptyResponse,

    #[error("document read failed: {0}")]
    Document(#[from] StoreError),

    #[error("document text extraction failed: {0}")]
    Extraction(String),
}

/// Raw reply from the analysis service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisMessage {
    pub message: MessageBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageBody {
    pub content: MessageContent,
}

/// The external service's ambiguous content shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPart {
    pub text: String,
}

impl MessageContent {
    /// Normalizes both content shapes to a single string. For the parts shape
    /// the first element carries the text; an empty sequence yields `None`.
    pub fn into_text(self) -> Option<String> {
        match self {
            MessageContent::Text(text) => Some(text),
            MessageContent::Parts(parts) => parts.into_iter().next().map(|p| p.text),
        }
    }
}

#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Submits the document at `document_path` with the rendered instruction
    /// payload and returns the raw reply.
    async fn feedback(
        &self,
        document_path: &str,
        instructions: &str,
    ) -> Result<AnalysisMessage, AnalysisError>;
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Analysis backend over the Anthropic Messages API. Reads the document back
/// from the store, extracts its text locally, and sends text + instructions.
/// Retries on 429 and 5xx with exponential backoff; the pipeline above never
/// retries a stage.
pub struct ClaudeAnalysisService {
    client: reqwest::Client,
    api_key: String,
    documents: Arc<dyn DocumentStore>,
}

impl ClaudeAnalysisService {
    pub fn new(api_key: String, documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            documents,
        }
    }

    async fn call(&self, prompt: &str) -> Result<AnthropicResponse, AnalysisError> {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system: ANALYSIS_SYSTEM,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let mut last_error: Option<AnalysisError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Analysis call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(AnalysisError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Analysis API returned {}: {}", status, body);
                last_error = Some(AnalysisError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<AnthropicError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(AnalysisError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let api_response: AnthropicResponse = response
                .json()
                .await
                .map_err(AnalysisError::Http)?;

            debug!(
                "Analysis call succeeded: input_tokens={}, output_tokens={}",
                api_response.usage.input_tokens, api_response.usage.output_tokens
            );

            return Ok(api_response);
        }

        Err(last_error.unwrap_or(AnalysisError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl AnalysisService for ClaudeAnalysisService {
    async fn feedback(
        &self,
        document_path: &str,
        instructions: &str,
    ) -> Result<AnalysisMessage, AnalysisError> {
        let bytes = self.documents.read(document_path).await?;
        let resume_text = pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| AnalysisError::Extraction(e.to_string()))?;

        let prompt = format!("{instructions}\n\nRESUME:\n{resume_text}");
        let response = self.call(&prompt).await?;

        let parts: Vec<ContentPart> = response
            .content
            .into_iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text)
            .map(|text| ContentPart { text })
            .collect();

        Ok(AnalysisMessage {
            message: MessageBody {
                content: MessageContent::Parts(parts),
            },
        })
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
