//! Inbound webhook surface: payload schema, HTTP handler, error mapping.

mod error;
mod handler;
mod payload;

pub use error::WebhookError;
pub use handler::{AppState, HealthResponse, SIGNATURE_HEADER, WebhookResponse, router};
pub use payload::{PayloadAlert, PayloadInstance, PayloadLocation, PayloadRule, WebhookPayload};
