//! Webhook HTTP surface.
//!
//! One route receives scanner deliveries, verifies their signature over the
//! raw body, validates the payload, and hands the event to the processor.
//! Each delivery is processed end-to-end before the response is returned;
//! there is no queuing or batching.

use std::sync::Arc;

use alertsync_core::{EventProcessor, Outcome, SignatureGuard};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::error::WebhookError;
use super::payload::WebhookPayload;

/// Header carrying the HMAC signature of the raw body.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct AppState {
    /// Authenticates deliveries before they reach the processor.
    pub guard: Arc<SignatureGuard>,

    /// Dispatches authenticated events.
    pub processor: Arc<EventProcessor>,
}

/// Builds the daemon's router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Webhook success response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Always `true`; errors use the error response path.
    pub success: bool,

    /// The delivered action.
    pub action: String,

    /// What the engine did with the event.
    pub outcome: &'static str,

    /// Ledger entry the event produced or touched, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,

    /// Human-readable detail for skipped events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl WebhookResponse {
    fn from_outcome(action: String, outcome: &Outcome) -> Self {
        let (label, detail) = match outcome {
            Outcome::Created(_) => ("created", None),
            Outcome::Existing(_) => ("already_tracked", None),
            Outcome::Updated(_) => ("updated", None),
            Outcome::Skipped(reason) => ("skipped", Some(reason.to_string())),
        };
        Self {
            success: true,
            action,
            outcome: label,
            entry_id: outcome.entry().map(|entry| entry.id.clone()),
            detail,
        }
    }
}

async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, WebhookError> {
    // Authenticate over the exact delivered bytes before touching them.
    let signature = match headers.get(SIGNATURE_HEADER) {
        None => None,
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| WebhookError::MalformedSignature)?,
        ),
    };
    state.guard.verify(&body, signature)?;

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|err| WebhookError::InvalidPayload(err.to_string()))?;

    let action = payload.action.clone();
    info!(
        action = %action,
        alert_id = payload.alert.id,
        "received code scanning alert webhook"
    );

    let event = payload.into_event();
    let outcome = state.processor.dispatch(&event).await?;
    Ok(Json(WebhookResponse::from_outcome(action, &outcome)))
}

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Fixed `healthy` marker.
    pub status: &'static str,

    /// Server time of the probe.
    pub timestamp: String,

    /// Daemon version.
    pub version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
    })
}
