//! Alert domain model.
//!
//! An [`Alert`] is an immutable snapshot of a finding as reported by the
//! scanning tool. The numeric id is assigned by the scanner and is NOT
//! stable across re-scans of the same logical issue; stable identity is
//! derived separately (see [`crate::fingerprint`]).

use serde::{Deserialize, Serialize};

use crate::entry::Severity;

/// Ref prefix stripped when deriving a branch name from a git ref.
pub const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// Severity as reported by the scanner.
///
/// Unrecognized values deserialize to [`ScannerSeverity::Unknown`] rather
/// than failing; the mapping to an internal [`Severity`] treats them as
/// `medium` (fail-safe default, never an error).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScannerSeverity {
    /// The scanner flagged this as an error-level finding.
    Error,
    /// Warning-level finding.
    Warning,
    /// Informational note.
    Note,
    /// Any value this version does not recognize.
    #[serde(other)]
    Unknown,
}

impl ScannerSeverity {
    /// Maps the scanner severity to the internal severity scale.
    ///
    /// `error → high`, `warning → medium`, `note → low`; anything
    /// unrecognized maps to `medium`. Used only at entry creation.
    #[must_use]
    pub const fn to_internal(self) -> Severity {
        match self {
            Self::Error => Severity::High,
            Self::Warning => Severity::Medium,
            Self::Note => Severity::Low,
            Self::Unknown => Severity::Medium,
        }
    }
}

/// Lifecycle state of an alert at the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    /// The finding is currently open.
    Open,
    /// A user dismissed the finding.
    Dismissed,
    /// The finding no longer appears in the latest analysis.
    Fixed,
    /// Any state this version does not recognize; treated as not-open.
    #[serde(other)]
    Unknown,
}

impl AlertState {
    /// Returns `true` if the alert is in the `open` state.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

/// The rule that produced an alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRule {
    /// Scanner-assigned rule identifier (stable across scans).
    pub id: String,

    /// Human-readable rule name.
    pub name: String,

    /// Human-readable description of the finding class.
    pub description: String,

    /// Severity as reported by the scanner.
    pub severity: ScannerSeverity,
}

/// Source location of the most recent instance of an alert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertLocation {
    /// Repository-relative file path.
    pub path: String,

    /// 1-based start line, when the scanner reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,

    /// 1-based start column, when the scanner reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_column: Option<u32>,
}

/// An immutable snapshot of a scanner finding.
///
/// Alerts are delivered by the scanner (webhook payload or reconciliation
/// fetch); the engine never mutates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Scanner-assigned numeric id. Not stable across re-scans.
    pub id: u64,

    /// API URL of the alert.
    pub url: String,

    /// Human-facing permalink of the alert.
    pub html_url: String,

    /// Current state at the scanner.
    pub state: AlertState,

    /// The rule that produced this finding.
    pub rule: AlertRule,

    /// Git ref the finding manifests on, `refs/heads/<branch>` form.
    pub git_ref: String,

    /// Source location of the finding.
    pub location: AlertLocation,
}

impl Alert {
    /// The branch this alert manifests on, with any `refs/heads/` prefix
    /// stripped. Refs that do not carry the prefix are returned verbatim.
    #[must_use]
    pub fn branch(&self) -> &str {
        branch_from_ref(&self.git_ref)
    }
}

/// Strips the `refs/heads/` prefix from a git ref, yielding the branch name.
#[must_use]
pub fn branch_from_ref(git_ref: &str) -> &str {
    git_ref.strip_prefix(BRANCH_REF_PREFIX).unwrap_or(git_ref)
}
