//! Public types for the chat API
use serde::{Deserialize, Serialize};

pub use crate::chat::SessionSnapshot as ChatSessionResponse;

#[derive(Deserialize, Serialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
}

#[derive(Deserialize, Serialize)]
pub struct ChatErrorResponse {
    pub error: String,
}

impl ChatErrorResponse {
    pub fn new(error: &str) -> Self {
        Self {
            error: error.into(),
        }
    }
}
