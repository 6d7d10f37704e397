//! State machine for a single chat: the transcript, the flag that is
//! set while a reply is outstanding, and the unsent draft.
//!
//! ```text
//! Idle --submit(non-blank)--> AwaitingResponse --resolve(reply)--> Idle
//! ```
//!
//! Submitting while `AwaitingResponse` does nothing, which keeps at
//! most one completion call in flight per session.
use serde::Serialize;
use thiserror::Error;

use super::models::{Message, Transcript};

/// Shown as the model message when a completion comes back empty.
pub const EMPTY_REPLY: &str = "Error al procesar";

#[derive(Clone, Copy, Serialize, Debug, PartialEq, Eq)]
pub enum InteractionState {
    Idle,
    AwaitingResponse,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Message is empty")]
    Empty,

    #[error("A reply is still pending")]
    Pending,

    #[error("Too many chats waiting for a reply")]
    Busy,
}

#[derive(Clone, Default, Debug)]
pub struct ChatSession {
    transcript: Transcript,
    pending: bool,
    draft: String,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn state(&self) -> InteractionState {
        if self.pending {
            InteractionState::AwaitingResponse
        } else {
            InteractionState::Idle
        }
    }

    pub fn append(&mut self, msg: Message) {
        self.transcript.push(msg);
    }

    pub fn set_pending(&mut self, pending: bool) {
        self.pending = pending;
    }

    /// Typing is always accepted, even while a reply is pending.
    pub fn set_draft(&mut self, text: &str) {
        self.draft = text.to_string();
    }

    /// Submit the current draft. On success the trimmed question is
    /// returned and must be passed to the gateway, followed by a call
    /// to `resolve` with whatever it returns.
    pub fn submit(&mut self) -> Result<String, SubmitError> {
        let draft = self.draft.clone();
        self.submit_text(&draft)
    }

    /// Submit `text` directly, bypassing the draft. Used when the draft
    /// lives on the client.
    pub fn submit_text(&mut self, text: &str) -> Result<String, SubmitError> {
        if self.pending {
            return Err(SubmitError::Pending);
        }
        let question = text.trim();
        if question.is_empty() {
            return Err(SubmitError::Empty);
        }

        let question = question.to_string();
        self.append(Message::user(&question));
        self.draft.clear();
        self.set_pending(true);

        Ok(question)
    }

    /// Integrate the gateway's reply, success or fallback alike.
    /// Returns `false` and changes nothing if no reply was expected.
    pub fn resolve(&mut self, reply: &str) -> bool {
        if !self.pending {
            tracing::warn!("Ignoring reply received while no question was pending");
            return false;
        }

        let text = if reply.is_empty() { EMPTY_REPLY } else { reply };
        self.append(Message::model(text));
        self.set_pending(false);
        true
    }
}
