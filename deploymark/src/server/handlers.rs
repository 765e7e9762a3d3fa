//! HTTP request handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::server::state::ServerState;
use crate::slack::interactions::event_to_buttonpress;
use crate::slack::signature::{verify_slack_signature, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::utils::version_info;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "deploymark".to_string(),
        version: version.version,
    })
}

/// Button press handler.
///
/// Slack posts a form whose `payload` field holds the interaction JSON.
/// The raw body is needed to check the request signature.
pub async fn interactions_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    if let Err(e) = verify_slack_signature(
        &state.signing_secret,
        header(TIMESTAMP_HEADER),
        header(SIGNATURE_HEADER),
        &body,
        Utc::now().timestamp(),
    ) {
        warn!("Rejecting interaction: {}", e);
        return StatusCode::UNAUTHORIZED;
    }

    let Some(payload) = url::form_urlencoded::parse(&body)
        .find(|(key, _)| key == "payload")
        .map(|(_, value)| value.into_owned())
    else {
        warn!("Interaction has no payload field");
        return StatusCode::BAD_REQUEST;
    };

    let event: serde_json::Value = match serde_json::from_str(&payload) {
        Ok(event) => event,
        Err(e) => {
            warn!("Interaction payload is not JSON: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };

    let press = match event_to_buttonpress(&event) {
        Ok(press) => press,
        Err(e) => {
            warn!("Ignoring interaction: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };

    info!("{} pressed {}", press.username, press.action);
    if state.button_presses.send(press).await.is_err() {
        // nobody is waiting on the deploy anymore
        warn!("Button press arrived after the deploy finished");
    }
    StatusCode::OK
}
