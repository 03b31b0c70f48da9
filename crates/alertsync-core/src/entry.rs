//! Ledger entry model.
//!
//! A [`LedgerEntry`] is the externally persisted record for a tracked
//! finding. The ledger backend assigns the id; the engine owns the status
//! machine and the embedded [`EntryMetadata`]. Entries are never deleted by
//! this system — "closed" is a status, not a deletion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::Alert;
use crate::fingerprint::Fingerprint;

/// Internal severity scale for ledger entries.
///
/// Wider than the scanner's three levels so a different scanner (or a
/// different ledger backend) can participate without remapping the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Immediately exploitable or equivalent.
    Critical,
    /// Serious finding; the default mapping for scanner `error`.
    High,
    /// Default mapping for scanner `warning` and unrecognized severities.
    Medium,
    /// Default mapping for scanner `note`.
    Low,
    /// Advisory warning.
    Warning,
    /// Informational note.
    Note,
}

impl Severity {
    /// Canonical snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Warning => "warning",
            Self::Note => "note",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = ();

    /// Case-insensitive parse of the canonical names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            "warning" => Ok(Self::Warning),
            "note" => Ok(Self::Note),
            _ => Err(()),
        }
    }
}

/// Status of a ledger entry, set by the transition that last touched it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Entry was created for a newly observed alert.
    Created,
    /// The finding appeared on an additional branch.
    AppearedInBranch,
    /// The scanner reported the finding fixed; entry closed.
    Fixed,
    /// A user dismissed the alert; entry closed.
    ClosedByUser,
    /// The scanner re-detected the finding; entry reopened.
    Reopened,
    /// A user reopened the alert; entry reopened.
    ReopenedByUser,
}

impl EntryStatus {
    /// Canonical snake_case name, used for close/reopen reasons.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::AppearedInBranch => "appeared_in_branch",
            Self::Fixed => "fixed",
            Self::ClosedByUser => "closed_by_user",
            Self::Reopened => "reopened",
            Self::ReopenedByUser => "reopened_by_user",
        }
    }

    /// Parses a canonical status name; `None` for anything else.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
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

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert metadata embedded in a ledger entry at creation time.
///
/// Both channels (webhook `created` transition and reconciliation sweep)
/// build this through [`EntryMetadata::from_alert`], which is what keeps the
/// field mapping and severity mapping identical between them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Scanner-assigned alert id, stringified (ledger-agnostic).
    pub alert_id: String,

    /// Derived stable identity.
    pub fingerprint: Fingerprint,

    /// Rule identifier.
    pub rule_id: String,

    /// Human-readable rule name.
    pub rule_name: String,

    /// Mapped internal severity.
    pub severity: Severity,

    /// Human description of the finding.
    pub description: String,

    /// Repository-relative path of the affected file.
    pub affected_file: String,

    /// Branch the alert was first observed on.
    pub branch: String,

    /// 1-based line, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,

    /// 1-based column, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,

    /// Permalink to the alert at the scanner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl EntryMetadata {
    /// Builds entry metadata from an alert snapshot.
    ///
    /// This is the single field-mapping rule shared by the webhook path and
    /// the reconciliation sweep: fingerprint derivation, severity mapping,
    /// and branch-ref stripping all happen here and nowhere else.
    #[must_use]
    pub fn from_alert(alert: &Alert) -> Self {
        Self {
            alert_id: alert.id.to_string(),
            fingerprint: Fingerprint::derive(&alert.rule.id, &alert.location.path),
            rule_id: alert.rule.id.clone(),
            rule_name: alert.rule.name.clone(),
            severity: alert.rule.severity.to_internal(),
            description: alert.rule.description.clone(),
            affected_file: alert.location.path.clone(),
            branch: alert.branch().to_string(),
            line: alert.location.start_line,
            column: alert.location.start_column,
            url: Some(alert.html_url.clone()),
        }
    }
}

/// The externally persisted issue record for a tracked finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Ledger-assigned id (e.g. an issue number), stringified.
    pub id: String,

    /// Alert metadata embedded at creation.
    pub metadata: EntryMetadata,

    /// Status set by the most recent transition.
    pub status: EntryStatus,

    /// Creation timestamp at the ledger.
    pub created_at: DateTime<Utc>,

    /// Last-update timestamp at the ledger.
    pub updated_at: DateTime<Utc>,

    /// Labels currently attached to the entry.
    pub labels: Vec<String>,

    /// Comment history appended by transitions.
    pub comments: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{AlertLocation, AlertRule, AlertState, ScannerSeverity};

    fn sample_alert() -> Alert {
        Alert {
            id: 42,
            url: "https://scanner.example/alerts/42".to_string(),
            html_url: "https://scanner.example/alerts/42/view".to_string(),
            state: AlertState::Open,
            rule: AlertRule {
                id: "js/sql-injection".to_string(),
                name: "SQL injection".to_string(),
                description: "Unsanitized input flows into a query".to_string(),
                severity: ScannerSeverity::Error,
            },
            git_ref: "refs/heads/main".to_string(),
            location: AlertLocation {
                path: "src/db/query.ts".to_string(),
                start_line: Some(17),
                start_column: Some(5),
            },
        }
    }

    #[test]
    fn test_metadata_from_alert_maps_every_field() {
        let alert = sample_alert();
        let metadata = EntryMetadata::from_alert(&alert);

        assert_eq!(metadata.alert_id, "42");
        assert_eq!(
            metadata.fingerprint,
            Fingerprint::derive("js/sql-injection", "src/db/query.ts")
        );
        assert_eq!(metadata.rule_id, "js/sql-injection");
        assert_eq!(metadata.rule_name, "SQL injection");
        assert_eq!(metadata.severity, Severity::High);
        assert_eq!(metadata.affected_file, "src/db/query.ts");
        assert_eq!(metadata.branch, "main");
        assert_eq!(metadata.line, Some(17));
        assert_eq!(metadata.column, Some(5));
        assert_eq!(
            metadata.url.as_deref(),
            Some("https://scanner.example/alerts/42/view")
        );
    }

    #[test]
    fn test_metadata_from_alert_without_location_details() {
        let mut alert = sample_alert();
        alert.location.start_line = None;
        alert.location.start_column = None;
        alert.rule.severity = ScannerSeverity::Note;

        let metadata = EntryMetadata::from_alert(&alert);
        assert_eq!(metadata.line, None);
        assert_eq!(metadata.column, None);
        assert_eq!(metadata.severity, Severity::Low);
    }

    #[test]
    fn test_status_reason_strings() {
        assert_eq!(EntryStatus::Fixed.as_str(), "fixed");
        assert_eq!(EntryStatus::ClosedByUser.as_str(), "closed_by_user");
        assert_eq!(EntryStatus::Reopened.as_str(), "reopened");
        assert_eq!(EntryStatus::ReopenedByUser.as_str(), "reopened_by_user");
        assert_eq!(EntryStatus::AppearedInBranch.as_str(), "appeared_in_branch");
    }

    #[test]
    fn test_status_parse_round_trips() {
        for status in [
            EntryStatus::Created,
            EntryStatus::AppearedInBranch,
            EntryStatus::Fixed,
            EntryStatus::ClosedByUser,
            EntryStatus::Reopened,
            EntryStatus::ReopenedByUser,
        ] {
            assert_eq!(EntryStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(EntryStatus::parse("deleted"), None);
    }

    #[test]
    fn test_severity_from_str_is_case_insensitive() {
        use std::str::FromStr;

        assert_eq!(Severity::from_str("HIGH"), Ok(Severity::High));
        assert_eq!(Severity::from_str("medium"), Ok(Severity::Medium));
        assert_eq!(Severity::from_str("Critical"), Ok(Severity::Critical));
        assert!(Severity::from_str("catastrophic").is_err());
    }
}
