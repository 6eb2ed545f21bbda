//! Wire endpoints: binds each dialect's path to the dispatcher.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use futures_util::StreamExt;
use lmgate_core::access::{AccessOutcome, AccessRequest};
use lmgate_core::{Gateway, GatewayError, Reply};
use lmgate_protocol::Dialect;
use serde_json::{json, Value};
use tokio_stream::wrappers::ReceiverStream;

#[derive(Clone)]
pub struct GatewayState {
    pub gateway: Arc<Gateway>,
}

pub fn proxy_router(gateway: Arc<Gateway>) -> Router {
    let state = GatewayState { gateway };
    Router::new()
        .route("/v1/chat/completions", post(openai_chat_completions))
        .route("/v1/responses", post(openai_responses))
        .route("/v1/messages", post(claude_messages))
        .route("/v1beta/models/{*name}", post(gemini_generate))
        .route("/v1/models", get(list_models))
        .with_state(state)
}

async fn openai_chat_completions(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    dialect_endpoint(state, headers, query, body, Dialect::OpenAiChat, None).await
}

async fn openai_responses(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    dialect_endpoint(state, headers, query, body, Dialect::OpenAiResponses, None).await
}

async fn claude_messages(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    dialect_endpoint(state, headers, query, body, Dialect::ClaudeMessages, None).await
}

/// `{model}:generateContent` / `{model}:streamGenerateContent`, model
/// taken from the path rather than the body.
async fn gemini_generate(
    State(state): State<GatewayState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let Some((model, action)) = name.rsplit_once(':') else {
        let err = GatewayError::invalid_request("expected {model}:{action} in path");
        return error_response(&err, Dialect::GeminiGenerate);
    };
    let stream = match action {
        "generateContent" => false,
        "streamGenerateContent" => true,
        other => {
            let err =
                GatewayError::invalid_request(format!("unsupported action {other:?}"));
            return error_response(&err, Dialect::GeminiGenerate);
        }
    };
    let model = model.to_string();
    dialect_stream_endpoint(
        state,
        headers,
        query,
        body,
        Dialect::GeminiGenerate,
        Some(model),
        stream,
    )
    .await
}

async fn list_models(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    if let Err(response) = authorize(&state, &headers, query.as_deref(), Dialect::OpenAiChat) {
        return response;
    }
    let data: Vec<Value> = state
        .gateway
        .models
        .list()
        .into_iter()
        .map(|model| {
            json!({
                "id": model.id,
                "object": "model",
                "owned_by": model.owned_by,
            })
        })
        .collect();
    axum::Json(json!({"object": "list", "data": data})).into_response()
}

async fn dialect_endpoint(
    state: GatewayState,
    headers: HeaderMap,
    query: Option<String>,
    body: Bytes,
    dialect: Dialect,
    model_override: Option<String>,
) -> Response {
    let stream = serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|value| value.get("stream").and_then(Value::as_bool))
        .unwrap_or(false);
    dialect_stream_endpoint(state, headers, query, body, dialect, model_override, stream).await
}

async fn dialect_stream_endpoint(
    state: GatewayState,
    headers: HeaderMap,
    query: Option<String>,
    body: Bytes,
    dialect: Dialect,
    model_override: Option<String>,
    stream: bool,
) -> Response {
    if let Err(response) = authorize(&state, &headers, query.as_deref(), dialect) {
        return response;
    }

    let config = state.gateway.config();
    let reply = state
        .gateway
        .dispatcher
        .dispatch(&config, dialect, body, model_override.as_deref(), stream)
        .await;

    match reply {
        Ok(Reply::Json { body }) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Ok(Reply::Sse { frames }) => {
            let stream = ReceiverStream::new(frames).map(Ok::<Bytes, Infallible>);
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/event-stream")
                .header(header::CACHE_CONTROL, "no-cache")
                .body(Body::from_stream(stream))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(err) => {
            tracing::debug!(dialect = %dialect, error = %err, "dispatch failed");
            error_response(&err, dialect)
        }
    }
}

fn authorize(
    state: &GatewayState,
    headers: &HeaderMap,
    query: Option<&str>,
    dialect: Dialect,
) -> Result<(), Response> {
    let request = AccessRequest { headers, query };
    match state.gateway.authenticate(&request) {
        AccessOutcome::Ok { provider, .. } => {
            tracing::trace!(provider = %provider, "inbound request authenticated");
            Ok(())
        }
        // No providers configured at all: the gateway runs open.
        AccessOutcome::NotHandled => Ok(()),
        AccessOutcome::InvalidCredential | AccessOutcome::NoCredentials => {
            let err = GatewayError::unauthorized("missing or invalid api key");
            Err(error_response(&err, dialect))
        }
    }
}

fn error_response(err: &GatewayError, dialect: Dialect) -> Response {
    let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, axum::Json(err.body(dialect))).into_response()
}
