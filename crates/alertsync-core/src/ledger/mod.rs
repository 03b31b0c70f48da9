//! Issue ledger capability trait.
//!
//! The ledger is the external issue tracker this engine keeps synchronized.
//! It is modeled as a capability interface so additional tracker backends
//! can plug in without touching the engine; the daemon crate ships the one
//! concrete GitHub adapter.
//!
//! # Identity contract
//!
//! [`IssueLedger::find_by_identity`] MUST be consistent: given the same
//! (alert id, fingerprint) it returns the same logical entry regardless of
//! which field matched, and never treats more than one match as
//! authoritative. If the backend holds multiple candidates, implementations
//! return the most recently created one and log the ambiguity. This is a
//! backend-quality requirement; the engine cannot enforce it.

pub mod memory;

pub use memory::{InMemoryLedger, LedgerCallCounts};

use async_trait::async_trait;
use thiserror::Error;

use crate::alert::Alert;
use crate::entry::{EntryMetadata, EntryStatus, LedgerEntry};
use crate::fingerprint::Fingerprint;

/// Errors surfaced by a ledger backend.
///
/// The engine never retries on these: the webhook path surfaces them as a
/// failed response (upstream redelivery is the retry mechanism) and the
/// reconciliation sweep counts them per-alert. Transport-level timeouts are
/// enforced by the adapter and reported as [`LedgerError::Network`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LedgerError {
    /// The backend API rejected the request.
    #[error("ledger API error: {message}")]
    Api {
        /// Error message from the backend.
        message: String,
        /// HTTP status code, if available.
        status_code: Option<u16>,
    },

    /// Transport failure (connect, TLS, timeout).
    #[error("ledger network error: {0}")]
    Network(String),

    /// Authentication with the backend failed.
    #[error("ledger authentication error: {0}")]
    Authentication(String),

    /// The backend throttled the request.
    #[error("ledger rate limit exceeded, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds until the limit resets.
        retry_after_secs: u64,
    },

    /// The backend returned a response the adapter could not interpret.
    #[error("invalid ledger response: {0}")]
    InvalidResponse(String),
}

/// Identity lookup for [`IssueLedger::find_by_identity`].
///
/// Either field alone is sufficient to match; transitions supply both so
/// the backend can match whichever it indexed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryLookup {
    /// Scanner-assigned alert id, stringified.
    pub alert_id: Option<String>,

    /// Derived stable identity.
    pub fingerprint: Option<Fingerprint>,
}

impl EntryLookup {
    /// Lookup carrying both identity fields.
    #[must_use]
    pub fn identity(alert_id: impl Into<String>, fingerprint: Fingerprint) -> Self {
        Self {
            alert_id: Some(alert_id.into()),
            fingerprint: Some(fingerprint),
        }
    }
}

/// Mutation request for [`IssueLedger::update`].
#[derive(Debug, Clone, Default)]
pub struct EntryUpdate {
    /// Ledger-assigned entry id.
    pub id: String,

    /// New status, when the transition changes it.
    pub status: Option<EntryStatus>,

    /// Labels to attach (appended to the existing set).
    pub labels: Vec<String>,

    /// Comment to append.
    pub comment: Option<String>,
}

/// Capability interface over the external issue tracker.
///
/// `create` must be used as find-or-create by callers: the at-most-one-entry
/// invariant is enforced by a find-before-create check in the engine, not by
/// a uniqueness constraint in the backend.
#[async_trait]
pub trait IssueLedger: Send + Sync {
    /// Creates a new ledger entry from alert metadata.
    async fn create(&self, metadata: EntryMetadata) -> Result<LedgerEntry, LedgerError>;

    /// Finds an existing entry by alert id and/or fingerprint.
    ///
    /// Returns `None` when no entry matches; this is not an error.
    async fn find_by_identity(
        &self,
        lookup: &EntryLookup,
    ) -> Result<Option<LedgerEntry>, LedgerError>;

    /// Applies a status/label/comment update to an entry.
    async fn update(&self, request: EntryUpdate) -> Result<LedgerEntry, LedgerError>;

    /// Closes an entry, optionally recording a reason.
    async fn close(&self, id: &str, reason: Option<&str>) -> Result<LedgerEntry, LedgerError>;

    /// Reopens an entry, optionally recording a reason.
    async fn reopen(&self, id: &str, reason: Option<&str>) -> Result<LedgerEntry, LedgerError>;

    /// Appends a comment to an entry.
    async fn add_comment(&self, id: &str, comment: &str) -> Result<(), LedgerError>;

    /// Attaches labels to an entry.
    async fn add_labels(&self, id: &str, labels: &[String]) -> Result<(), LedgerError>;

    /// Fetches all alerts currently open at the scanner.
    ///
    /// Consumed by the reconciliation sweep only.
    async fn fetch_open_alerts(&self) -> Result<Vec<Alert>, LedgerError>;
}
