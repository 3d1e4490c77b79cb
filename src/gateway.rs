//! HTTP gateway bridging synchronous callers onto the dispatcher.
//!
//! `GET /data?client_id=<id>&experiment=<handler>&<params...>` dispatches
//! one command to the addressed worker and renders the matched response's
//! payload as the JSON body. The distinction between "unknown client",
//! "timeout" and "internal error" is observable in the status code:
//!
//! - 200: response received (handler failures pass through as payload)
//! - 400: missing `client_id` or `experiment`
//! - 404: no live connection for `client_id`
//! - 504: no response within the configured deadline
//! - 500: write failure or other internal error
//!
//! The gateway never retries: at most one command attempt per inbound
//! request.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::dispatcher::Dispatcher;
use crate::error::{RelayError, Result};
use crate::protocol::Params;

/// Shared state for gateway handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub dispatcher: Arc<Dispatcher>,
    pub request_timeout: Duration,
}

/// Build the gateway router.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/data", get(data))
        .route("/clients", get(clients))
        .with_state(state)
}

/// Bind and serve the gateway until the process exits.
pub async fn serve(addr: SocketAddr, state: GatewayState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "relay HTTP gateway listening");
    axum::serve(listener, router(state))
        .await
        .map_err(RelayError::Io)
}

/// Gateway-level error with its HTTP rendering.
#[derive(Debug)]
enum GatewayError {
    MissingParam(&'static str),
    ClientNotFound(String),
    Timeout,
    Internal(String),
}

impl From<RelayError> for GatewayError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::ClientNotFound(id) => GatewayError::ClientNotFound(id),
            RelayError::ResponseTimeout => GatewayError::Timeout,
            other => GatewayError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> HttpResponse {
        let (status, message) = match self {
            GatewayError::MissingParam(name) => (
                StatusCode::BAD_REQUEST,
                format!("query parameter '{}' is required", name),
            ),
            GatewayError::ClientNotFound(id) => (
                StatusCode::NOT_FOUND,
                format!("no live connection for client '{}'", id),
            ),
            GatewayError::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "client response timed out".to_string(),
            ),
            GatewayError::Internal(detail) => (StatusCode::INTERNAL_SERVER_ERROR, detail),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// `GET /data`: dispatch one command and relay the reply.
async fn data(
    State(state): State<GatewayState>,
    Query(query): Query<HashMap<String, String>>,
) -> std::result::Result<Json<serde_json::Value>, GatewayError> {
    let client_id = query
        .get("client_id")
        .filter(|v| !v.is_empty())
        .ok_or(GatewayError::MissingParam("client_id"))?
        .clone();
    let handler = query
        .get("experiment")
        .filter(|v| !v.is_empty())
        .ok_or(GatewayError::MissingParam("experiment"))?
        .clone();

    // Every remaining query pair becomes a handler parameter.
    let mut params = Params::new();
    for (key, value) in query {
        if key != "client_id" && key != "experiment" {
            params.insert(key, serde_json::Value::String(value));
        }
    }

    let response = state
        .dispatcher
        .send_and_wait(&client_id, &handler, params, state.request_timeout)
        .await?;

    // Handler failures arrive as ordinary responses with a failure status
    // and an error description in the payload; they are the worker's
    // result, not a transport error, and pass through unchanged.
    Ok(Json(response.payload))
}

/// `GET /clients`: ids of currently connected workers.
async fn clients(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    let mut ids = state.dispatcher.registry().client_ids();
    ids.sort();
    Json(json!({ "clients": ids }))
}
