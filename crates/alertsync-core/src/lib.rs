//! alertsync-core — alert-to-ledger synchronization engine.
//!
//! Keeps an external issue tracker (the "ledger") synchronized with the
//! findings ("alerts") of a code scanning tool, through two convergent
//! channels: a push channel (webhook events, near-real-time but droppable)
//! and a pull channel (a periodic full reconciliation sweep, reliable but
//! slow). Both channels drive the same state machine toward the same result.
//!
//! # Invariants
//!
//! - At most one ledger entry exists per (alert id, fingerprint) pair,
//!   enforced by find-before-create — callers treat creation as
//!   find-or-create, never blind insert.
//! - Replayed `created` deliveries are idempotent: the existing entry is
//!   returned unchanged.
//! - Branch filtering is decided by exactly one function,
//!   [`BranchPolicy::should_track`], consulted by both channels.
//! - A mutating event for an untracked alert is a defined no-op, not an
//!   error.
//!
//! # Modules
//!
//! - [`alert`]: immutable scanner finding snapshots and severity mapping
//! - [`policy`]: branch tracking strategy and policy
//! - [`fingerprint`]: stable identity derivation
//! - [`entry`]: ledger entry model and embedded metadata
//! - [`ledger`]: the issue-ledger capability trait and error taxonomy
//! - [`processor`]: per-event state transitions
//! - [`reconcile`]: the reconciliation sweep
//! - [`signature`]: HMAC-SHA256 webhook authentication
//! - [`config`]: engine configuration surface

pub mod alert;
pub mod config;
pub mod entry;
pub mod fingerprint;
pub mod ledger;
pub mod policy;
pub mod processor;
pub mod reconcile;
pub mod signature;

pub use alert::{Alert, AlertLocation, AlertRule, AlertState, ScannerSeverity, branch_from_ref};
pub use config::{SweepConfig, SyncConfig};
pub use entry::{EntryMetadata, EntryStatus, LedgerEntry, Severity};
pub use fingerprint::Fingerprint;
pub use ledger::{EntryLookup, EntryUpdate, IssueLedger, LedgerError};
pub use policy::{BranchPolicy, BranchStrategy};
pub use processor::{AlertEvent, DispatchError, EventProcessor, Outcome, SkipReason, WebhookAction};
pub use reconcile::{ReconciliationSweep, SweepReport};
pub use signature::{SignatureError, SignatureGuard};
