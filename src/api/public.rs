//! Public API types

use axum::response::{IntoResponse, Response};
use http::StatusCode;

/// Body of every 500. The cause only goes to the log.
pub const INTERNAL_ERROR_MESSAGE: &str = "Something went wrong";

/// Unexpected failure while handling a request, such as a poisoned
/// state lock. Expected outcomes like a rejected submission are
/// answered by the handlers themselves.
pub struct ApiError(anyhow::Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!("Request failed: {:#}", self.0);
        (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE).into_response()
    }
}

/// Lets handlers use `?` on anything that converts into
/// `anyhow::Error`
impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

pub mod chat {
    pub use crate::api::routes::chat::public::*;
}
