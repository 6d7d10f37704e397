use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::AppConfig;
use crate::gemini::GeminiClient;

/// In-persona reply shown in place of a failed completion.
pub const FALLBACK_REPLY: &str =
    "Lo siento, tuve un problema conectando con el Edge de IA. ¡Pero Cloudflare sigue siendo increíble!";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Authentication failed ({status}): {details}")]
    Authentication { status: u16, details: String },

    #[error("Rate limited: {details}")]
    RateLimited { details: String },

    #[error("Invalid request ({status}): {details}")]
    InvalidRequest { status: u16, details: String },

    #[error("Provider server error ({status}): {details}")]
    Server { status: u16, details: String },

    #[error("Unexpected status ({status}): {details}")]
    UnexpectedStatus { status: u16, details: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Everything a provider needs to answer one question.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub question: String,
    pub system_instruction: String,
    pub temperature: f32,
}

/// Transport to a text completion service.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}

pub type BoxedCompletionProvider = Box<dyn CompletionProvider + 'static>;

/// Turns a user question into a provider request and folds every
/// provider failure into `FALLBACK_REPLY`. Holds no per-question
/// state, so one instance is shared by every session.
pub struct CompletionGateway {
    provider: BoxedCompletionProvider,
    system_instruction: String,
    temperature: f32,
}

impl CompletionGateway {
    pub fn new(provider: BoxedCompletionProvider, system_instruction: &str, temperature: f32) -> Self {
        Self {
            provider,
            system_instruction: system_instruction.to_string(),
            temperature,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            Box::new(GeminiClient::from_config(config)),
            &config.system_instruction,
            config.temperature,
        )
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn request_for(&self, question: &str) -> CompletionRequest {
        CompletionRequest {
            question: question.to_string(),
            system_instruction: self.system_instruction.clone(),
            temperature: self.temperature,
        }
    }

    /// Ask a single question. The caller is responsible for passing a
    /// trimmed, non-empty question. Makes exactly one attempt and never
    /// fails: provider errors are logged and replaced by
    /// `FALLBACK_REPLY`.
    pub async fn ask(&self, question: &str) -> String {
        let request = self.request_for(question);
        match self.provider.complete(&request).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Completion provider call failed: {}", e);
                FALLBACK_REPLY.to_string()
            }
        }
    }
}
