//! Webhook signature verification.
//!
//! Inbound events are authenticated with an HMAC-SHA256 signature over the
//! raw request body, delivered as `sha256=<hex>` in a header. Comparison is
//! constant-time; a missing or mismatched signature rejects the request
//! before it reaches the event processor.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Scheme prefix on the signature header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Reasons a signature check rejects a request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// No signature header was delivered.
    #[error("missing signature header")]
    MissingSignature,

    /// The header is not `sha256=<hex>`.
    #[error("malformed signature header")]
    MalformedSignature,

    /// The signature does not match the body.
    #[error("signature mismatch")]
    SignatureMismatch,

    /// The configured secret could not initialize the MAC.
    #[error("invalid webhook secret: {0}")]
    InvalidSecret(String),
}

/// Authenticates inbound events before they reach the event processor.
pub struct SignatureGuard {
    secret: SecretString,
}

impl SignatureGuard {
    /// Creates a guard over the shared webhook secret.
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Verifies a delivered signature against the raw request body.
    ///
    /// # Errors
    ///
    /// - [`SignatureError::MissingSignature`] when `signature` is `None`
    /// - [`SignatureError::MalformedSignature`] when the header is not
    ///   `sha256=` followed by hex
    /// - [`SignatureError::SignatureMismatch`] when the digest differs
    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<(), SignatureError> {
        let header = signature.ok_or(SignatureError::MissingSignature)?;
        let hex_digest = header
            .strip_prefix(SIGNATURE_PREFIX)
            .ok_or(SignatureError::MalformedSignature)?;
        let provided =
            hex::decode(hex_digest).map_err(|_| SignatureError::MalformedSignature)?;

        let expected = self.digest(body)?;
        if provided.len() != expected.len() {
            return Err(SignatureError::SignatureMismatch);
        }
        if bool::from(provided.ct_eq(&expected)) {
            Ok(())
        } else {
            Err(SignatureError::SignatureMismatch)
        }
    }

    /// Computes the expected header value for a body.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::InvalidSecret`] if the MAC cannot be
    /// initialized.
    pub fn sign(&self, body: &[u8]) -> Result<String, SignatureError> {
        let digest = self.digest(body)?;
        Ok(format!("{SIGNATURE_PREFIX}{}", hex::encode(digest)))
    }

    fn digest(&self, body: &[u8]) -> Result<Vec<u8>, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|err| SignatureError::InvalidSecret(err.to_string()))?;
        mac.update(body);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

impl std::fmt::Debug for SignatureGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the secret.
        f.debug_struct("SignatureGuard").finish_non_exhaustive()
    }
}
