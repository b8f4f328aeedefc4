//! Request-level failures and their HTTP rendering.
//!
//! Every `/chat` failure ends up as a `{"error": "..."}` body. Model and
//! internal failures are logged in full here; the caller only sees a fixed text.

use crate::model::ModelError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ChatError {
    /// Body missing, not JSON, or without a string `message`.
    #[error("No message provided")]
    NoMessage,

    #[error("Empty message")]
    EmptyMessage,

    #[error(transparent)]
    Model(#[from] ModelError),

    /// The engine answered with zero candidates.
    #[error("No response generated")]
    EmptyResponse,

    /// Anything else that went wrong while serving the request.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::NoMessage | ChatError::EmptyMessage => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text placed in the `error` field of the response body.
    pub fn client_message(&self) -> &'static str {
        match self {
            ChatError::NoMessage => "No message provided",
            ChatError::EmptyMessage => "Empty message",
            ChatError::Model(ModelError::Runtime(_)) => "Model error",
            ChatError::Model(ModelError::Invalid(_)) => "An unexpected error occurred",
            ChatError::EmptyResponse => "No response generated",
            ChatError::Internal(_) => "Internal server error",
        }
    }

    /// Metrics label.
    pub fn outcome(&self) -> &'static str {
        match self {
            ChatError::NoMessage | ChatError::EmptyMessage => "bad_request",
            ChatError::Model(_) => "model_error",
            ChatError::EmptyResponse => "empty_response",
            ChatError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        match &self {
            ChatError::Model(ModelError::Runtime(e)) => error!(error = %e, "RuntimeError in LLM call"),
            ChatError::Model(ModelError::Invalid(e)) => error!(error = %e, "unexpected error in LLM call"),
            ChatError::EmptyResponse => error!("no choices in completion"),
            ChatError::Internal(e) => error!(error = %e, "request failed"),
            ChatError::NoMessage | ChatError::EmptyMessage => {}
        }
        (self.status(), Json(json!({ "error": self.client_message() }))).into_response()
    }
}
