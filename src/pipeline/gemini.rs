//! Gemini `generateContent` client.
//!
//! Speaks the REST API directly with `reqwest` so the credential and an
//! optional gateway base URL come from [`ReconstructionConfig`] instead of
//! the process environment.
//!
//! ## Request layout
//!
//! ```text
//! systemInstruction.parts[0].text   fixed reconstruction rules
//! contents[0] (role = user)
//!   parts[0].inlineData             page image / PDF, base64
//!   parts[1].text                   "RECONSTRUCT PAGE n ..."
//! generationConfig                  temperature, maxOutputTokens
//! ```

use crate::config::ReconstructionConfig;
use crate::error::ModelError;
use crate::pipeline::encode::{encode_asset, InlineAsset};
use crate::pipeline::model::{ModelResponse, PageModel, PageRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Public Gemini endpoint, used when no base URL override is configured.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Error bodies are cut to this many characters before they reach a page error.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// A [`PageModel`] backed by the Gemini `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    name: String,
    timeout_secs: u64,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Create a client for `model` using the public endpoint.
    ///
    /// # Errors
    /// [`ModelError::MissingCredential`] for a blank key;
    /// [`ModelError::Transport`] if the HTTP client cannot be built.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, ModelError> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(ModelError::MissingCredential);
        }
        let model = model.into();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            name: format!("gemini:{model}"),
            model,
            timeout_secs,
        })
    }

    /// Route requests through a gateway or proxy instead of the public endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build a client from the credential, model, endpoint and timeout in `config`.
    pub fn from_config(config: &ReconstructionConfig) -> Result<Self, ModelError> {
        let key = config.credential().ok_or(ModelError::MissingCredential)?;
        let client = Self::new(key, config.model.clone(), config.api_timeout_secs)?;
        Ok(match config.base_url {
            Some(ref url) => client.with_base_url(url.as_str()),
            None => client,
        })
    }

    /// Full `generateContent` URL for the configured model.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn map_send_error(&self, e: reqwest::Error) -> ModelError {
        if e.is_timeout() {
            ModelError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            ModelError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl PageModel for GeminiClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &PageRequest<'_>) -> Result<ModelResponse, ModelError> {
        let inline = encode_asset(request.asset);
        let body = build_request_body(request, &inline);

        debug!(
            "POST {} (page {}, {} bytes inline)",
            self.endpoint(),
            request.page_num,
            inline.data.len()
        );

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), &body));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| self.map_send_error(e))?;

        parse_response(parsed)
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum Part<'a> {
    Text(&'a str),
    InlineData(InlineData<'a>),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

fn build_request_body<'a>(
    request: &'a PageRequest<'_>,
    inline: &'a InlineAsset,
) -> GenerateContentRequest<'a> {
    GenerateContentRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part::Text(request.system_instruction)],
        },
        contents: vec![Content {
            role: Some("user"),
            parts: vec![
                Part::InlineData(InlineData {
                    mime_type: &inline.mime_type,
                    data: &inline.data,
                }),
                Part::Text(&request.instruction),
            ],
        }],
        generation_config: GenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_output_tokens,
        },
    }
}

fn parse_response(response: GenerateContentResponse) -> Result<ModelResponse, ModelError> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|f| f.block_reason)
    {
        return Err(ModelError::Blocked { reason });
    }

    let usage = response.usage_metadata.unwrap_or_default();
    let candidate = response.candidates.into_iter().next();
    let finish_reason = candidate.as_ref().and_then(|c| c.finish_reason.clone());

    // Thought parts are the model's scratchpad, not page markup.
    let text: String = candidate
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter(|p| !p.thought)
                .filter_map(|p| p.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return match finish_reason.as_deref() {
            Some(reason @ ("SAFETY" | "PROHIBITED_CONTENT" | "BLOCKLIST" | "RECITATION")) => {
                Err(ModelError::Blocked {
                    reason: reason.to_string(),
                })
            }
            _ => Err(ModelError::EmptyResponse),
        };
    }

    Ok(ModelResponse {
        text,
        input_tokens: usage.prompt_token_count,
        output_tokens: usage.candidates_token_count,
    })
}

/// Error for a non-2xx answer; the body is trimmed and shortened for logs.
fn status_error(status: u16, body: &str) -> ModelError {
    ModelError::Http {
        status,
        body: truncate_chars(body.trim(), MAX_ERROR_BODY_CHARS),
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
