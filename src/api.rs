use crate::{
    error::ChatError,
    model::{LlmBackend, SamplingParams},
    prompt::build_prompt,
    validate::{trimmed_message, Validator},
};
use axum::{
    extract::{rejection::BytesRejection, State},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::{any::Any, sync::Arc, time::Instant};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    trace::TraceLayer,
};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Clone)]
struct ChatState {
    backend: Arc<dyn LlmBackend>,
    validator: Arc<Validator>,
    params: Arc<SamplingParams>,
}

pub fn routes<B: LlmBackend>(backend: B, validator: Arc<Validator>, params: SamplingParams) -> Router {
    let state = ChatState {
        backend: Arc::new(backend),
        validator,
        params: Arc::new(params),
    };

    Router::new()
        .route("/chat", post(chat))
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(AnyOrigin)
                .allow_methods(AnyOrigin)
                .allow_headers(AnyOrigin),
        )
}

async fn chat(
    State(state): State<ChatState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ChatResponse>, ChatError> {
    let result = match body {
        Ok(body) => respond(&state, &body).await,
        Err(e) => {
            tracing::debug!(error = %e, "unreadable request body");
            Err(ChatError::NoMessage)
        }
    };

    let outcome = match &result {
        Ok(_) => "ok",
        Err(e) => e.outcome(),
    };
    metrics::counter!("chat_requests_total", "outcome" => outcome).increment(1);

    result.map(Json)
}

async fn respond(state: &ChatState, body: &[u8]) -> Result<ChatResponse, ChatError> {
    let req = state.validator.parse_request(body)?;
    let message = trimmed_message(&req)?;

    let prompt = build_prompt(message);
    tracing::debug!(%prompt, "formatted prompt");

    let started = Instant::now();
    let completion = state.backend.complete(prompt, &state.params).await?;
    metrics::histogram!("chat_completion_seconds").record(started.elapsed().as_secs_f64());
    tracing::debug!(?completion, "full response");

    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or(ChatError::EmptyResponse)?;
    let response = choice.text.trim().to_string();
    tracing::debug!(%response, "AI response");

    Ok(ChatResponse { response })
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };
    metrics::counter!("chat_requests_total", "outcome" => "internal").increment(1);
    ChatError::Internal(detail).into_response()
}
