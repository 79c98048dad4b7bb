//! HTTP request handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use inbound_models::models::{
    HealthResponse, SlackEnvelope, SlackEvent, VersionResponse, WebhookAck,
};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::server::state::ServerState;
use crate::server::verify::{header_str, is_retry, verify_slack_request};
use crate::utils::{generate_request_id, version_info};

pub const GITHUB_SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "deploybot".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Slack Events API handler
pub async fn events_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let now = chrono::Utc::now().timestamp();
    if let Err(e) = verify_slack_request(&headers, &body, &state.slack_signing_secret, now) {
        warn!("Refusing Slack request: {:?}", e);
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let envelope: SlackEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Unreadable Slack event: {}", e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match envelope {
        SlackEnvelope::UrlVerification { challenge } => {
            ([(header::CONTENT_TYPE, "text/plain")], challenge).into_response()
        }
        SlackEnvelope::EventCallback {
            event_id,
            event: SlackEvent::AppMention(mention),
        } => {
            if is_retry(&headers) {
                debug!(event_id = ?event_id, "Skipping redelivered Slack event");
                return StatusCode::OK.into_response();
            }

            let orchestrator = state.orchestrator.clone();
            let span = info_span!("command", request_id = %generate_request_id(), event_id = ?event_id);
            state.tasks.spawn(
                async move {
                    let outcome = orchestrator.handle_command(&mention).await;
                    info!("Command finished: {:?}", outcome);
                }
                .instrument(span),
            );
            StatusCode::OK.into_response()
        }
        SlackEnvelope::EventCallback { .. } | SlackEnvelope::Unsupported => {
            debug!("Ignoring unsupported Slack event");
            StatusCode::OK.into_response()
        }
    }
}

/// GitHub push webhook handler
pub async fn gitshot_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if body.is_empty() {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let signature = header_str(&headers, GITHUB_SIGNATURE_HEADER).map(str::to_string);
    let orchestrator = state.orchestrator.clone();
    let span = info_span!("push", request_id = %generate_request_id());
    state.tasks.spawn(
        async move {
            let outcome = orchestrator.handle_push(&body, signature.as_deref()).await;
            info!("Push finished: {:?}", outcome);
        }
        .instrument(span),
    );

    (
        StatusCode::ACCEPTED,
        Json(WebhookAck {
            status: "accepted".to_string(),
        }),
    )
        .into_response()
}
