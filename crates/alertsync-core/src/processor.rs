//! Per-event state transitions.
//!
//! [`EventProcessor`] owns one pure transition per webhook action. Every
//! transition except `created` starts with an identity lookup; a missing
//! entry is a defined no-op (e.g. a `fixed` event for an alert that was
//! never tracked because it lived on a non-main branch), never an error.
//!
//! # Idempotency and the create race
//!
//! Creation is find-then-create against an external store with no atomic
//! compare-and-swap, so two concurrent `created` deliveries for the same
//! fingerprint can race and produce two entries. The reconciliation sweep
//! is the de-duplication backstop; identity lookups resolve ambiguity by
//! picking the most recently created entry (see [`crate::ledger`]).
//!
//! Once a transition has issued its first mutating call, it does not roll
//! back on subsequent failure; partial side effects (a label added but a
//! comment failed) are corrected by a later delivery or sweep pass.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::alert::Alert;
use crate::entry::{EntryMetadata, EntryStatus, LedgerEntry};
use crate::fingerprint::Fingerprint;
use crate::ledger::{EntryLookup, EntryUpdate, IssueLedger, LedgerError};
use crate::policy::{BranchPolicy, BranchStrategy};

/// Label attached when a finding appears on an additional branch.
const LABEL_APPEARED_IN_BRANCH: &str = "appeared-in-branch";

/// Label attached when the scanner reports a finding fixed.
const LABEL_FIXED: &str = "fixed";

/// Label attached when a user dismisses an alert.
const LABEL_CLOSED_BY_USER: &str = "closed-by-user";

const COMMENT_FIXED: &str = "✅ Security alert has been fixed!";
const COMMENT_CLOSED_BY_USER: &str = "👤 Security alert closed by user";
const COMMENT_REOPENED: &str = "🔄 Security alert reopened automatically";
const COMMENT_REOPENED_BY_USER: &str = "👤 Security alert reopened by user";

// =============================================================================
// Actions and events
// =============================================================================

/// Webhook actions this engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookAction {
    /// A new alert was created.
    Created,
    /// An existing alert appeared on another branch.
    AppearedInBranch,
    /// The scanner reports the alert fixed.
    Fixed,
    /// A user dismissed the alert.
    ClosedByUser,
    /// The scanner re-detected the alert.
    Reopened,
    /// A user reopened the alert.
    ReopenedByUser,
}

impl WebhookAction {
    /// Parses an action string; `None` for anything unsupported.
    #[must_use]
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "created" => Some(Self::Created),
            "appeared_in_branch" => Some(Self::AppearedInBranch),
            "fixed" => Some(Self::Fixed),
            "closed_by_user" => Some(Self::ClosedByUser),
            "reopened" => Some(Self::Reopened),
            "reopened_by_user" => Some(Self::ReopenedByUser),
            _ => None,
        }
    }
}

/// An authenticated, schema-validated inbound event.
///
/// The action is kept as the raw delivered string so that unsupported
/// values fail dispatch with the exact value in the error, rather than
/// failing schema validation upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEvent {
    /// Delivered action string.
    pub action: String,

    /// The alert snapshot carried by the event. Its `git_ref` is the
    /// event-level ref (the branch the event fired for).
    pub alert: Alert,
}

// =============================================================================
// Outcomes and errors
// =============================================================================

/// Why a transition deliberately did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The branch policy excludes the alert's branch from tracking.
    UntrackedBranch,

    /// Branch update events are disabled under the `main_only` strategy.
    BranchUpdatesDisabled,

    /// No ledger entry exists for the identity; nothing to mutate.
    NoMatchingEntry,
}

impl SkipReason {
    /// Short human-readable description for responses and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UntrackedBranch => "skipped: untracked branch",
            Self::BranchUpdatesDisabled => "skipped: branch updates disabled",
            Self::NoMatchingEntry => "skipped: no matching ledger entry",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of dispatching a single event.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A new ledger entry was created.
    Created(LedgerEntry),

    /// An entry already existed for the identity; returned unchanged
    /// (idempotent replay of `created`).
    Existing(LedgerEntry),

    /// An existing entry was mutated by the transition.
    Updated(LedgerEntry),

    /// The transition was a deliberate no-op.
    Skipped(SkipReason),
}

impl Outcome {
    /// The entry the transition produced or touched, if any.
    #[must_use]
    pub const fn entry(&self) -> Option<&LedgerEntry> {
        match self {
            Self::Created(entry) | Self::Existing(entry) | Self::Updated(entry) => Some(entry),
            Self::Skipped(_) => None,
        }
    }
}

/// Errors surfaced by [`EventProcessor::dispatch`].
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The delivered action is not one this engine supports. This is the
    /// one webhook-path case that should produce an error response rather
    /// than a 200.
    #[error("unsupported action: {0}")]
    UnsupportedAction(String),

    /// The ledger backend failed mid-transition.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

// =============================================================================
// EventProcessor
// =============================================================================

/// Dispatches webhook events to per-action transitions.
///
/// Holds the ledger capability and the immutable branch policy; both
/// channels (webhook and reconciliation sweep) create entries through
/// [`EventProcessor::create_tracked`], so there is exactly one creation
/// rule in the system.
pub struct EventProcessor {
    ledger: Arc<dyn IssueLedger>,
    policy: BranchPolicy,
}

impl EventProcessor {
    /// Creates a processor over a ledger and branch policy.
    #[must_use]
    pub fn new(ledger: Arc<dyn IssueLedger>, policy: BranchPolicy) -> Self {
        Self { ledger, policy }
    }

    /// The ledger this processor mutates.
    #[must_use]
    pub fn ledger(&self) -> &Arc<dyn IssueLedger> {
        &self.ledger
    }

    /// The branch policy in force.
    #[must_use]
    pub const fn policy(&self) -> &BranchPolicy {
        &self.policy
    }

    /// Dispatches one event to its transition.
    ///
    /// # Errors
    ///
    /// [`DispatchError::UnsupportedAction`] for unknown action strings;
    /// [`DispatchError::Ledger`] when the backend fails mid-transition.
    pub async fn dispatch(&self, event: &AlertEvent) -> Result<Outcome, DispatchError> {
        let action = WebhookAction::parse(&event.action)
            .ok_or_else(|| DispatchError::UnsupportedAction(event.action.clone()))?;

        let alert_id = event.alert.id.to_string();
        let fingerprint =
            Fingerprint::derive(&event.alert.rule.id, &event.alert.location.path);

        debug!(
            action = %event.action,
            alert_id = %alert_id,
            fingerprint = %fingerprint,
            "dispatching alert event"
        );

        let outcome = match action {
            WebhookAction::Created => {
                self.create_tracked(EntryMetadata::from_alert(&event.alert))
                    .await?
            },
            WebhookAction::AppearedInBranch => {
                self.appeared_in_branch(&alert_id, &fingerprint, event.alert.branch())
                    .await?
            },
            WebhookAction::Fixed => self.fixed(&alert_id, &fingerprint).await?,
            WebhookAction::ClosedByUser => self.closed_by_user(&alert_id, &fingerprint).await?,
            WebhookAction::Reopened => self.reopened(&alert_id, &fingerprint, false).await?,
            WebhookAction::ReopenedByUser => self.reopened(&alert_id, &fingerprint, true).await?,
        };
        Ok(outcome)
    }

    /// The `created` transition, shared with the reconciliation sweep.
    ///
    /// Policy check first (an untracked branch makes no ledger calls at
    /// all), then find-before-create: an existing entry is returned
    /// unchanged so replayed deliveries stay idempotent.
    ///
    /// # Errors
    ///
    /// Propagates ledger failures from the find or create call.
    pub async fn create_tracked(
        &self,
        metadata: EntryMetadata,
    ) -> Result<Outcome, LedgerError> {
        if !self.policy.should_track(&metadata.branch) {
            warn!(
                alert_id = %metadata.alert_id,
                branch = %metadata.branch,
                main_branch = %self.policy.main_branch(),
                "entry creation skipped for untracked branch"
            );
            return Ok(Outcome::Skipped(SkipReason::UntrackedBranch));
        }

        let lookup =
            EntryLookup::identity(metadata.alert_id.clone(), metadata.fingerprint.clone());
        if let Some(existing) = self.ledger.find_by_identity(&lookup).await? {
            debug!(
                alert_id = %metadata.alert_id,
                entry_id = %existing.id,
                "entry already exists, returning it unchanged"
            );
            return Ok(Outcome::Existing(existing));
        }

        let entry = self.ledger.create(metadata).await?;
        Ok(Outcome::Created(entry))
    }

    /// The `appeared_in_branch` transition.
    ///
    /// Under `main_only` this is a no-op before any ledger call; the
    /// strategy alone decides, not [`BranchPolicy::should_track`] (which
    /// governs creation, not updates).
    async fn appeared_in_branch(
        &self,
        alert_id: &str,
        fingerprint: &Fingerprint,
        branch: &str,
    ) -> Result<Outcome, LedgerError> {
        if self.policy.strategy() == BranchStrategy::MainOnly {
            warn!(
                alert_id = %alert_id,
                branch = %branch,
                "branch alert tracking disabled (main_only strategy), ignoring event"
            );
            return Ok(Outcome::Skipped(SkipReason::BranchUpdatesDisabled));
        }

        let Some(existing) = self
            .ledger
            .find_by_identity(&EntryLookup::identity(alert_id, fingerprint.clone()))
            .await?
        else {
            return Ok(Outcome::Skipped(SkipReason::NoMatchingEntry));
        };

        let comment = format!("🌿 Alert appeared in branch: `{branch}`");
        self.ledger.add_comment(&existing.id, &comment).await?;
        self.ledger
            .add_labels(&existing.id, &[LABEL_APPEARED_IN_BRANCH.to_string()])
            .await?;

        let entry = self
            .ledger
            .update(EntryUpdate {
                id: existing.id,
                status: Some(EntryStatus::AppearedInBranch),
                ..EntryUpdate::default()
            })
            .await?;
        Ok(Outcome::Updated(entry))
    }

    /// The `fixed` transition: label, comment, close with reason `fixed`.
    async fn fixed(
        &self,
        alert_id: &str,
        fingerprint: &Fingerprint,
    ) -> Result<Outcome, LedgerError> {
        let Some(existing) = self
            .ledger
            .find_by_identity(&EntryLookup::identity(alert_id, fingerprint.clone()))
            .await?
        else {
            return Ok(Outcome::Skipped(SkipReason::NoMatchingEntry));
        };

        self.ledger
            .add_labels(&existing.id, &[LABEL_FIXED.to_string()])
            .await?;
        self.ledger.add_comment(&existing.id, COMMENT_FIXED).await?;

        let entry = self
            .ledger
            .close(&existing.id, Some(EntryStatus::Fixed.as_str()))
            .await?;
        Ok(Outcome::Updated(entry))
    }

    /// The `closed_by_user` transition.
    async fn closed_by_user(
        &self,
        alert_id: &str,
        fingerprint: &Fingerprint,
    ) -> Result<Outcome, LedgerError> {
        let Some(existing) = self
            .ledger
            .find_by_identity(&EntryLookup::identity(alert_id, fingerprint.clone()))
            .await?
        else {
            return Ok(Outcome::Skipped(SkipReason::NoMatchingEntry));
        };

        self.ledger
            .add_labels(&existing.id, &[LABEL_CLOSED_BY_USER.to_string()])
            .await?;
        self.ledger
            .add_comment(&existing.id, COMMENT_CLOSED_BY_USER)
            .await?;

        let entry = self
            .ledger
            .close(&existing.id, Some(EntryStatus::ClosedByUser.as_str()))
            .await?;
        Ok(Outcome::Updated(entry))
    }

    /// The `reopened` / `reopened_by_user` transitions.
    async fn reopened(
        &self,
        alert_id: &str,
        fingerprint: &Fingerprint,
        by_user: bool,
    ) -> Result<Outcome, LedgerError> {
        let Some(existing) = self
            .ledger
            .find_by_identity(&EntryLookup::identity(alert_id, fingerprint.clone()))
            .await?
        else {
            return Ok(Outcome::Skipped(SkipReason::NoMatchingEntry));
        };

        let status = if by_user {
            EntryStatus::ReopenedByUser
        } else {
            EntryStatus::Reopened
        };
        let comment = if by_user {
            COMMENT_REOPENED_BY_USER
        } else {
            COMMENT_REOPENED
        };

        self.ledger
            .add_labels(&existing.id, &[status.as_str().to_string()])
            .await?;
        self.ledger.add_comment(&existing.id, comment).await?;

        let entry = self
            .ledger
            .reopen(&existing.id, Some(status.as_str()))
            .await?;
        Ok(Outcome::Updated(entry))
    }
}

impl std::fmt::Debug for EventProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventProcessor")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
