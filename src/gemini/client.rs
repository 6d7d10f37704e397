use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::chat::{CompletionProvider, CompletionRequest, ProviderError};
use crate::core::AppConfig;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Part {
    pub text: String,
}

#[derive(Clone, Serialize, Debug)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Clone, Serialize, Debug)]
pub struct SystemInstruction {
    pub parts: Vec<Part>,
}

#[derive(Clone, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
}

/// Body of a `models/{model}:generateContent` call.
#[derive(Clone, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub system_instruction: SystemInstruction,
    pub generation_config: GenerationConfig,
}

impl From<&CompletionRequest> for GenerateContentRequest {
    fn from(req: &CompletionRequest) -> Self {
        Self {
            contents: vec![Content {
                role: String::from("user"),
                parts: vec![Part {
                    text: req.question.clone(),
                }],
            }],
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: req.system_instruction.clone(),
                }],
            },
            generation_config: GenerationConfig {
                temperature: req.temperature,
            },
        }
    }
}

// Only the fields needed to pull the reply text out are modeled, the
// rest of the payload (safety ratings, usage, etc.) is ignored.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
pub struct ResponsePart {
    pub text: Option<String>,
    #[serde(default)]
    pub thought: bool,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate. Thought parts
    /// are skipped. Returns `None` when the candidate carries no text
    /// at all.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let texts: Vec<&str> = content
            .parts
            .iter()
            .filter(|p| !p.thought)
            .filter_map(|p| p.text.as_deref())
            .collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }
}

/// Sends a single `generateContent` request and returns the reply
/// text verbatim.
pub async fn generate_content(
    client: &reqwest::Client,
    request: &GenerateContentRequest,
    api_hostname: &str,
    api_key: &str,
    model: &str,
    timeout: Option<Duration>,
) -> Result<String, ProviderError> {
    let url = format!(
        "{}/v1beta/models/{}:generateContent",
        api_hostname.trim_end_matches('/'),
        model
    );

    // The key goes in a header rather than the query string so it
    // never shows up in a logged URL
    let mut builder = client
        .post(url)
        .header("x-goog-api-key", api_key)
        .json(request);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    let response = builder.send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(status_error(status, body));
    }

    let parsed: GenerateContentResponse = serde_json::from_str(&body)
        .map_err(|e| ProviderError::MalformedResponse(format!("{}. Body: {}", e, body)))?;

    if let Some(reason) = parsed
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_ref())
    {
        return Err(ProviderError::MalformedResponse(format!(
            "Prompt blocked: {}",
            reason
        )));
    }

    parsed
        .text()
        .ok_or_else(|| ProviderError::MalformedResponse(format!("No candidate text. Body: {}", body)))
}

fn status_error(status: StatusCode, details: String) -> ProviderError {
    let status = status.as_u16();
    match status {
        401 | 403 => ProviderError::Authentication { status, details },
        429 => ProviderError::RateLimited { details },
        400 | 404 => ProviderError::InvalidRequest { status, details },
        500..=599 => ProviderError::Server { status, details },
        _ => ProviderError::UnexpectedStatus { status, details },
    }
}

/// `CompletionProvider` backed by the Gemini REST API.
pub struct GeminiClient {
    api_hostname: String,
    api_key: String,
    model: String,
    timeout: Option<Duration>,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_hostname: &str, api_key: &str, model: &str) -> Self {
        Self {
            api_hostname: api_hostname.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.gemini_api_hostname,
            &config.gemini_api_key,
            &config.gemini_model,
        )
        .timeout(config.request_timeout)
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionProvider for GeminiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let payload = GenerateContentRequest::from(request);
        generate_content(
            &self.client,
            &payload,
            &self.api_hostname,
            &self.api_key,
            &self.model,
            self.timeout,
        )
        .await
    }
}
