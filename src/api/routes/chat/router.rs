//! Router for the chat API

use std::sync::{Arc, RwLock};

use anyhow::anyhow;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, sse::Event, sse::KeepAlive, sse::Sse},
    routing::{get, post},
};
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;

use super::public;
use crate::api::public::ApiError;
use crate::api::state::AppState;
use crate::chat::{CompletionGateway, SessionSnapshot, SubmitError};

type SharedState = Arc<RwLock<AppState>>;

const MAX_SESSION_ID_LEN: usize = 128;

/// Submit a question. The reply is fetched in the background and
/// lands in the session once the gateway settles, so this answers
/// right away with the session in its waiting state.
async fn chat_submit(
    State(state): State<SharedState>,
    Json(payload): Json<public::ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.session_id.trim().is_empty() {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(public::ChatErrorResponse::new("Missing session_id")),
        )
            .into_response());
    }
    if payload.session_id.len() > MAX_SESSION_ID_LEN {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(public::ChatErrorResponse::new("Invalid session_id")),
        )
            .into_response());
    }

    let (submitted, gateway) = {
        let mut shared_state = state
            .write()
            .map_err(|e| anyhow!("Unable to write shared state: {}", e))?;
        let submitted = shared_state
            .sessions
            .submit(&payload.session_id, &payload.message);
        (submitted, Arc::clone(&shared_state.gateway))
    };

    match submitted {
        Ok((question, snapshot)) => {
            spawn_reply(Arc::clone(&state), gateway, payload.session_id, question);
            Ok((StatusCode::ACCEPTED, Json(snapshot)).into_response())
        }
        Err(e) => {
            tracing::debug!("Rejected submission for {}: {}", payload.session_id, e);
            let status = match e {
                SubmitError::Empty => StatusCode::BAD_REQUEST,
                SubmitError::Pending => StatusCode::CONFLICT,
                SubmitError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            };
            Ok((status, Json(public::ChatErrorResponse::new(&e.to_string()))).into_response())
        }
    }
}

/// Ask the gateway and apply its reply. Runs to completion even if
/// the browser goes away, there is no cancellation.
fn spawn_reply(
    state: SharedState,
    gateway: Arc<CompletionGateway>,
    session_id: String,
    question: String,
) {
    tokio::spawn(async move {
        let reply = gateway.ask(&question).await;

        match state.write() {
            Ok(mut shared_state) => {
                if shared_state.sessions.resolve(&session_id, &reply).is_none() {
                    tracing::warn!("Session {} was not waiting for a reply", session_id);
                }
            }
            Err(e) => tracing::error!("Unable to write shared state: {}", e),
        }
    });
}

/// Get the current state of a chat session
async fn chat_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state
        .read()
        .map_err(|e| anyhow!("Unable to read shared state: {}", e))?
        .sessions
        .snapshot(&id);

    match snapshot {
        Some(snapshot) => Ok(Json(snapshot).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(public::ChatErrorResponse::new(&format!(
                "Chat session {} not found",
                id
            ))),
        )
            .into_response()),
    }
}

/// Read the session as it is now, outside of any event.
fn latest_snapshot(state: &SharedState, id: &str) -> Option<SessionSnapshot> {
    match state.read() {
        Ok(shared_state) => shared_state.sessions.snapshot(id),
        Err(e) => {
            tracing::error!("Unable to read shared state: {}", e);
            None
        }
    }
}

fn snapshot_event(snapshot: &SessionSnapshot) -> Result<Event, axum::Error> {
    Event::default().event("snapshot").json_data(snapshot)
}

/// Stream a snapshot of the session every time it changes, starting
/// with its current state if it exists yet.
async fn chat_events(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let (mut rx, current) = {
        let shared_state = state
            .read()
            .map_err(|e| anyhow!("Unable to read shared state: {}", e))?;
        (
            shared_state.sessions.subscribe(),
            shared_state.sessions.snapshot(&id),
        )
    };

    let stream = async_stream::stream! {
        if let Some(snapshot) = current {
            yield snapshot_event(&snapshot);
        }
        loop {
            match rx.recv().await {
                Ok(snapshot) if snapshot.session_id == id => {
                    yield snapshot_event(&snapshot);
                }
                Ok(_) => continue,
                // One of the skipped snapshots may have been this
                // session's last, so send the current state instead
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event stream for {} skipped {} snapshots", id, skipped);
                    if let Some(snapshot) = latest_snapshot(&state, &id) {
                        yield snapshot_event(&snapshot);
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Create the chat router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", post(chat_submit))
        .route("/{id}", get(chat_session))
        .route("/{id}/events", get(chat_events))
}
