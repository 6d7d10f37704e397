//! Test utilities for integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use tokio::sync::Notify;
use tower::util::ServiceExt;

use edge_welcome::api::AppState;
use edge_welcome::api::app;
use edge_welcome::api::public::chat::ChatSessionResponse;
use edge_welcome::chat::{CompletionGateway, CompletionProvider, CompletionRequest, ProviderError};
use edge_welcome::core::AppConfig;
use edge_welcome::core::config::{DEFAULT_SYSTEM_INSTRUCTION, DEFAULT_TEMPERATURE};

pub type SharedState = Arc<RwLock<AppState>>;

/// Provider with a fixed outcome. Optionally waits on a gate before
/// answering so tests can observe the pending state.
pub struct TestProvider {
    reply: Option<String>,
    gate: Option<Arc<Notify>>,
    pub calls: Arc<AtomicUsize>,
}

impl TestProvider {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            gate: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            gate: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl CompletionProvider for TestProvider {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => Err(ProviderError::Server {
                status: 503,
                details: String::from("unavailable"),
            }),
        }
    }
}

pub fn test_config(static_dir: &str) -> AppConfig {
    AppConfig {
        gemini_api_hostname: String::from("http://127.0.0.1:9"),
        gemini_api_key: String::from("test-api-key"),
        gemini_model: String::from("gemini-test"),
        system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        temperature: DEFAULT_TEMPERATURE,
        request_timeout: None,
        static_dir: static_dir.to_string(),
    }
}

/// Path to the page shipped with the crate
pub fn web_ui_dir() -> String {
    format!("{}/web-ui", env!("CARGO_MANIFEST_DIR"))
}

pub fn test_app_with_gateway(config: AppConfig, gateway: CompletionGateway) -> (Router, SharedState) {
    let app_state = AppState::new(config, gateway.shared());
    let shared_state = Arc::new(RwLock::new(app_state));
    let router = app(Arc::clone(&shared_state)).expect("Failed to build app");
    (router, shared_state)
}

/// Creates a test application backed by `provider`, along with its
/// state so tests can drive sessions directly.
pub fn test_app_with_state(provider: TestProvider) -> (Router, SharedState) {
    let config = test_config(&web_ui_dir());
    let gateway = CompletionGateway::new(
        Box::new(provider),
        &config.system_instruction,
        config.temperature,
    );
    test_app_with_gateway(config, gateway)
}

/// Creates a test application router backed by `provider`.
pub fn test_app(provider: TestProvider) -> Router {
    test_app_with_state(provider).0
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
}

pub async fn post_message(app: &Router, session_id: &str, message: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/chat")
                .method("POST")
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "session_id": session_id,
                        "message": message
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_string(response.into_body()).await)
}

pub async fn get_session(app: &Router, session_id: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/chat/{}", session_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_string(response.into_body()).await)
}

/// Poll the session until the reply has landed.
pub async fn wait_for_reply(app: &Router, session_id: &str) -> ChatSessionResponse {
    for _ in 0..200 {
        let (status, body) = get_session(app, session_id).await;
        assert_eq!(status, StatusCode::OK);
        let snapshot: ChatSessionResponse = serde_json::from_str(&body).unwrap();
        if !snapshot.pending {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Session {} never received a reply", session_id);
}
