//! Error types for the webhook handler.

use alertsync_core::{DispatchError, LedgerError, SignatureError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors that can occur during webhook processing.
///
/// Each maps to a specific HTTP status. Note the asymmetry required by the
/// engine's error taxonomy: a mutating event with no matching ledger entry
/// is NOT an error (it returns 200 with a skipped outcome); an unsupported
/// action IS one.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The signature header is missing.
    #[error("missing signature header")]
    MissingSignature,

    /// The signature header is present but not `sha256=<hex>`.
    #[error("malformed signature header")]
    MalformedSignature,

    /// HMAC verification failed.
    #[error("invalid signature")]
    InvalidSignature,

    /// The request payload could not be parsed against the schema.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The delivered action is not supported.
    #[error("unsupported action: {0}")]
    UnsupportedAction(String),

    /// The ledger backend failed while applying the transition.
    #[error("ledger failure: {0}")]
    Ledger(#[from] LedgerError),

    /// Internal error (should not occur in normal operation).
    #[error("internal error: {0}")]
    Internal(String),
}

impl WebhookError {
    /// HTTP status for this error.
    ///
    /// - Missing/malformed/invalid signature: 401 Unauthorized
    /// - Invalid payload, unsupported action: 400 Bad Request
    /// - Ledger failure: 502 Bad Gateway (upstream redelivery retries)
    /// - Internal: 500 Internal Server Error
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingSignature | Self::MalformedSignature | Self::InvalidSignature => {
                StatusCode::UNAUTHORIZED
            },
            Self::InvalidPayload(_) | Self::UnsupportedAction(_) => StatusCode::BAD_REQUEST,
            Self::Ledger(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SignatureError> for WebhookError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::MissingSignature => Self::MissingSignature,
            SignatureError::MalformedSignature => Self::MalformedSignature,
            SignatureError::SignatureMismatch => Self::InvalidSignature,
            SignatureError::InvalidSecret(detail) => Self::Internal(detail),
        }
    }
}

impl From<DispatchError> for WebhookError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::UnsupportedAction(action) => Self::UnsupportedAction(action),
            DispatchError::Ledger(err) => Self::Ledger(err),
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        // Responses carry generic messages only; nothing about the secret,
        // the signature bytes, or backend internals leaks to the sender.
        let status = self.status_code();
        let body = match &self {
            Self::MissingSignature => "Missing signature",
            Self::MalformedSignature => "Malformed signature",
            Self::InvalidSignature => "Invalid signature",
            Self::InvalidPayload(_) => "Invalid payload",
            Self::UnsupportedAction(_) => "Unsupported action",
            Self::Ledger(_) => "Ledger unavailable",
            Self::Internal(_) => "Internal server error",
        };

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            WebhookError::MissingSignature.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            WebhookError::MalformedSignature.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            WebhookError::InvalidSignature.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            WebhookError::InvalidPayload("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebhookError::UnsupportedAction("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebhookError::Ledger(LedgerError::Network("x".into())).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            WebhookError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_signature_errors_map_to_unauthorized() {
        for err in [
            SignatureError::MissingSignature,
            SignatureError::MalformedSignature,
            SignatureError::SignatureMismatch,
        ] {
            let mapped = WebhookError::from(err);
            assert_eq!(mapped.status_code(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_responses_do_not_leak_details() {
        let err = WebhookError::Ledger(LedgerError::Api {
            message: "token ghp_secret rejected".to_string(),
            status_code: Some(500),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
