//! Axum routes exposing the gateway over HTTP

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use futures_util::StreamExt;
use switchyard_core::HttpError;

use crate::error::LlmError;
use crate::gateway::Gateway;
use crate::types::MessagesRequest;

/// Header naming the provider to use, bypassing model-based selection
pub const PROVIDER_HEADER: &str = "x-switchyard-provider";

/// Build the router serving `POST /v1/messages` and `GET /health`
pub fn llm_router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/v1/messages", routing::post(messages))
        .route("/health", routing::get(health))
        .with_state(gateway)
}

/// Handle `POST /v1/messages`
///
/// The response is always canonical SSE, whatever `stream` says.
async fn messages(
    State(gateway): State<Arc<Gateway>>,
    headers: HeaderMap,
    payload: Result<Json<MessagesRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return error_response(&LlmError::InvalidRequest(rejection.body_text())),
    };

    let Ok(provider) = headers.get(PROVIDER_HEADER).map(HeaderValue::to_str).transpose() else {
        return error_response(&LlmError::InvalidRequest(format!(
            "{PROVIDER_HEADER} must be valid ASCII"
        )));
    };

    match gateway.stream(request, provider).await {
        Ok(stream) => {
            let body = Body::from_stream(stream.map(Ok::<_, Infallible>));
            (
                [
                    (header::CONTENT_TYPE, "text/event-stream"),
                    (header::CACHE_CONTROL, "no-cache"),
                ],
                body,
            )
                .into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "request failed");
            error_response(&e)
        }
    }
}

/// Handle `GET /health`
async fn health(State(gateway): State<Arc<Gateway>>) -> Response {
    let providers: Vec<&str> = gateway.provider_names().collect();
    Json(serde_json::json!({
        "status": "ok",
        "providers": providers,
    }))
    .into_response()
}

/// Anthropic-style JSON error body
fn error_response(error: &LlmError) -> Response {
    let body = serde_json::json!({
        "type": "error",
        "error": {
            "type": error.error_type(),
            "message": error.client_message(),
        }
    });

    (error.status_code(), Json(body)).into_response()
}
