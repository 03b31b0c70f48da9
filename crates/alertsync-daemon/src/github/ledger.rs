//! GitHub-backed issue ledger.
//!
//! Projects ledger entries onto GitHub issues. Entry metadata is embedded
//! in the issue body inside an HTML-comment marker block so that identity
//! lookups can run over the issue search API and recover the metadata from
//! whatever they find.
//!
//! GitHub cannot represent the full entry status machine (an issue is only
//! open or closed), so mapping an issue back to an entry yields `created`
//! for open and `fixed` for closed; mutating operations overlay the status
//! the caller asked for. The engine tracks status through its own updates
//! and never reads it back from here as truth.

use std::str::FromStr;
use std::sync::LazyLock;

use alertsync_core::{
    Alert, AlertLocation, AlertRule, AlertState, EntryLookup, EntryMetadata, EntryStatus,
    EntryUpdate, Fingerprint, IssueLedger, LedgerEntry, LedgerError, ScannerSeverity, Severity,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::Method;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::client::{GitHubClient, encode_query};

/// Label attached to every entry at creation.
const LABEL_SECURITY_ALERT: &str = "security-alert";

/// Page size for the code-scanning alert listing.
const ALERTS_PER_PAGE: u32 = 100;

static RE_ALERT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Alert ID: (.+)").expect("alert id regex is valid"));
static RE_FINGERPRINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Fingerprint: (.+)").expect("fingerprint regex is valid"));
static RE_RULE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Rule ID: (.+)").expect("rule id regex is valid"));
static RE_DESCRIPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Description:\*\* (.+)").expect("description regex is valid"));
static RE_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*File:\*\* `(.+)`").expect("file regex is valid"));
static RE_BRANCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Branch:\*\* `(.+)`").expect("branch regex is valid"));
static RE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Line:\*\* (\d+)").expect("line regex is valid"));
static RE_COLUMN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Column:\*\* (\d+)").expect("column regex is valid"));
static RE_SEVERITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Severity:\*\* (.+)").expect("severity regex is valid"));
static RE_RULE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Rule:\*\* (.+)").expect("rule name regex is valid"));
static RE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[View Alert\]\((.+)\)").expect("url regex is valid"));

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct WireIssue {
    number: u64,
    state: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    labels: Vec<WireLabel>,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, Deserialize)]
struct WireLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WireSearchResults {
    #[serde(default)]
    items: Vec<WireSearchItem>,
}

#[derive(Debug, Deserialize)]
struct WireSearchItem {
    number: u64,
    created_at: String,
}

#[derive(Debug, Deserialize)]
struct WireScanAlert {
    number: u64,
    #[serde(default)]
    url: String,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    rule: WireScanRule,
    #[serde(default)]
    most_recent_instance: Option<WireScanInstance>,
}

#[derive(Debug, Default, Deserialize)]
struct WireScanRule {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    severity: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireScanInstance {
    #[serde(default, rename = "ref")]
    git_ref: Option<String>,
    #[serde(default)]
    location: Option<WireScanLocation>,
}

#[derive(Debug, Deserialize)]
struct WireScanLocation {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    start_line: Option<u32>,
    #[serde(default)]
    start_column: Option<u32>,
}

// =============================================================================
// GitHubLedger
// =============================================================================

/// [`IssueLedger`] backed by GitHub issues and code-scanning alerts.
#[derive(Debug)]
pub struct GitHubLedger {
    client: GitHubClient,
    owner: String,
    repo: String,
}

impl GitHubLedger {
    /// Creates a ledger over one repository.
    #[must_use]
    pub fn new(client: GitHubClient, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            client,
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    fn issues_path(&self, rest: &str) -> String {
        format!("/repos/{}/{}/issues{rest}", self.owner, self.repo)
    }

    async fn fetch_issue(&self, number: u64) -> Result<LedgerEntry, LedgerError> {
        let value = self
            .client
            .request_json(Method::GET, &self.issues_path(&format!("/{number}")), None)
            .await?;
        let issue: WireIssue = parse_wire(value)?;
        let metadata = extract_metadata(issue.body.as_deref().unwrap_or_default());
        map_issue(&issue, metadata)
    }
}

#[async_trait]
impl IssueLedger for GitHubLedger {
    async fn create(&self, metadata: EntryMetadata) -> Result<LedgerEntry, LedgerError> {
        let body = json!({
            "title": entry_title(&metadata),
            "body": build_entry_body(&metadata),
            "labels": creation_labels(&metadata),
        });

        let value = self
            .client
            .request_json(Method::POST, &self.issues_path(""), Some(&body))
            .await?;
        let issue: WireIssue = parse_wire(value)?;
        map_issue(&issue, metadata)
    }

    async fn find_by_identity(
        &self,
        lookup: &EntryLookup,
    ) -> Result<Option<LedgerEntry>, LedgerError> {
        let mut terms = Vec::new();
        if let Some(alert_id) = &lookup.alert_id {
            terms.push(format!("\"Alert ID: {alert_id}\""));
        }
        if let Some(fingerprint) = &lookup.fingerprint {
            terms.push(format!("\"Fingerprint: {fingerprint}\""));
        }
        if terms.is_empty() {
            return Ok(None);
        }

        let query = format!(
            "repo:{}/{} is:issue {}",
            self.owner,
            self.repo,
            terms.join(" OR ")
        );
        let value = self
            .client
            .request_json(
                Method::GET,
                &format!("/search/issues?q={}", encode_query(&query)),
                None,
            )
            .await?;
        let results: WireSearchResults = parse_wire(value)?;

        if results.items.is_empty() {
            return Ok(None);
        }
        if results.items.len() > 1 {
            warn!(
                candidates = results.items.len(),
                "ambiguous identity lookup, using most recently created issue"
            );
        }

        // The identity contract picks the most recently created candidate.
        let newest = results
            .items
            .iter()
            .max_by_key(|item| parse_timestamp(&item.created_at).unwrap_or(DateTime::UNIX_EPOCH))
            .map(|item| item.number);

        match newest {
            Some(number) => Ok(Some(self.fetch_issue(number).await?)),
            None => Ok(None),
        }
    }

    async fn update(&self, request: EntryUpdate) -> Result<LedgerEntry, LedgerError> {
        if !request.labels.is_empty() {
            self.add_labels(&request.id, &request.labels).await?;
        }
        if let Some(comment) = &request.comment {
            self.add_comment(&request.id, comment).await?;
        }

        let number = parse_entry_id(&request.id)?;
        let mut entry = self.fetch_issue(number).await?;
        if let Some(status) = request.status {
            entry.status = status;
        }
        Ok(entry)
    }

    async fn close(&self, id: &str, reason: Option<&str>) -> Result<LedgerEntry, LedgerError> {
        let number = parse_entry_id(id)?;

        if let Some(reason) = reason {
            self.add_comment(id, &format!("Closed: {reason}")).await?;
        }

        let value = self
            .client
            .request_json(
                Method::PATCH,
                &self.issues_path(&format!("/{number}")),
                Some(&json!({ "state": "closed" })),
            )
            .await?;
        let issue: WireIssue = parse_wire(value)?;
        let metadata = extract_metadata(issue.body.as_deref().unwrap_or_default());
        let mut entry = map_issue(&issue, metadata)?;
        entry.status = reason
            .and_then(EntryStatus::parse)
            .unwrap_or(EntryStatus::Fixed);
        Ok(entry)
    }

    async fn reopen(&self, id: &str, reason: Option<&str>) -> Result<LedgerEntry, LedgerError> {
        let number = parse_entry_id(id)?;

        if let Some(reason) = reason {
            self.add_comment(id, &format!("Reopened: {reason}")).await?;
        }

        let value = self
            .client
            .request_json(
                Method::PATCH,
                &self.issues_path(&format!("/{number}")),
                Some(&json!({ "state": "open" })),
            )
            .await?;
        let issue: WireIssue = parse_wire(value)?;
        let metadata = extract_metadata(issue.body.as_deref().unwrap_or_default());
        let mut entry = map_issue(&issue, metadata)?;
        entry.status = reason
            .and_then(EntryStatus::parse)
            .unwrap_or(EntryStatus::Reopened);
        Ok(entry)
    }

    async fn add_comment(&self, id: &str, comment: &str) -> Result<(), LedgerError> {
        let number = parse_entry_id(id)?;
        self.client
            .request(
                Method::POST,
                &self.issues_path(&format!("/{number}/comments")),
                Some(&json!({ "body": comment })),
            )
            .await?;
        Ok(())
    }

    async fn add_labels(&self, id: &str, labels: &[String]) -> Result<(), LedgerError> {
        let number = parse_entry_id(id)?;
        self.client
            .request(
                Method::POST,
                &self.issues_path(&format!("/{number}/labels")),
                Some(&json!({ "labels": labels })),
            )
            .await?;
        Ok(())
    }

    async fn fetch_open_alerts(&self) -> Result<Vec<Alert>, LedgerError> {
        let value = self
            .client
            .request_json(
                Method::GET,
                &format!(
                    "/repos/{}/{}/code-scanning/alerts?state=open&per_page={ALERTS_PER_PAGE}",
                    self.owner, self.repo
                ),
                None,
            )
            .await?;
        let wire: Vec<WireScanAlert> = parse_wire(value)?;

        // Defensive filtering: records missing identity-relevant fields are
        // dropped rather than fabricated.
        Ok(wire.into_iter().filter_map(map_scan_alert).collect())
    }
}

// =============================================================================
// Mapping helpers
// =============================================================================

fn parse_wire<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, LedgerError> {
    serde_json::from_value(value).map_err(|e| LedgerError::InvalidResponse(e.to_string()))
}

fn parse_entry_id(id: &str) -> Result<u64, LedgerError> {
    id.parse()
        .map_err(|_| LedgerError::InvalidResponse(format!("entry id is not an issue number: {id}")))
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Issue title for a new entry.
fn entry_title(metadata: &EntryMetadata) -> String {
    format!(
        "🚨 {}: {}",
        metadata.severity.as_str().to_uppercase(),
        metadata.rule_name
    )
}

/// Labels attached to a new entry.
fn creation_labels(metadata: &EntryMetadata) -> Vec<String> {
    vec![
        LABEL_SECURITY_ALERT.to_string(),
        format!("severity:{}", metadata.severity),
        format!("rule:{}", metadata.rule_id),
    ]
}

/// Renders the issue body, including the machine-readable metadata block.
fn build_entry_body(metadata: &EntryMetadata) -> String {
    let mut body = String::new();
    body.push_str("## Security Alert Details\n\n");
    body.push_str(&format!("**Description:** {}\n\n", metadata.description));
    body.push_str(&format!("**File:** `{}`\n", metadata.affected_file));
    body.push_str(&format!("**Branch:** `{}`\n", metadata.branch));
    if let Some(line) = metadata.line {
        body.push_str(&format!("**Line:** {line}\n"));
    }
    if let Some(column) = metadata.column {
        body.push_str(&format!("**Column:** {column}\n"));
    }
    body.push_str(&format!(
        "**Severity:** {}\n",
        metadata.severity.as_str().to_uppercase()
    ));
    body.push_str(&format!("**Rule:** {}\n", metadata.rule_name));
    if let Some(url) = &metadata.url {
        body.push_str(&format!("\n[View Alert]({url})\n"));
    }
    body.push_str("\n---\n<!-- METADATA -->\n");
    body.push_str(&format!("Alert ID: {}\n", metadata.alert_id));
    body.push_str(&format!("Fingerprint: {}\n", metadata.fingerprint));
    body.push_str(&format!("Rule ID: {}\n", metadata.rule_id));
    body.push_str("<!-- /METADATA -->");
    body
}

/// Recovers entry metadata from an issue body.
///
/// Missing fields fall back to empty strings (or `medium` severity) so a
/// hand-edited issue degrades instead of failing the lookup.
fn extract_metadata(body: &str) -> EntryMetadata {
    let capture = |re: &Regex| {
        re.captures(body)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default()
    };

    let severity = RE_SEVERITY
        .captures(body)
        .and_then(|c| c.get(1))
        .and_then(|m| Severity::from_str(m.as_str().trim()).ok())
        .unwrap_or(Severity::Medium);

    EntryMetadata {
        alert_id: capture(&RE_ALERT_ID),
        fingerprint: Fingerprint::from(capture(&RE_FINGERPRINT)),
        rule_id: capture(&RE_RULE_ID),
        rule_name: capture(&RE_RULE_NAME),
        severity,
        description: capture(&RE_DESCRIPTION),
        affected_file: capture(&RE_FILE),
        branch: capture(&RE_BRANCH),
        line: RE_LINE
            .captures(body)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok()),
        column: RE_COLUMN
            .captures(body)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok()),
        url: RE_URL
            .captures(body)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string()),
    }
}

/// Maps a GitHub issue to a ledger entry.
fn map_issue(issue: &WireIssue, metadata: EntryMetadata) -> Result<LedgerEntry, LedgerError> {
    let created_at = parse_timestamp(&issue.created_at).ok_or_else(|| {
        LedgerError::InvalidResponse(format!("bad created_at timestamp: {}", issue.created_at))
    })?;
    let updated_at = parse_timestamp(&issue.updated_at).ok_or_else(|| {
        LedgerError::InvalidResponse(format!("bad updated_at timestamp: {}", issue.updated_at))
    })?;

    Ok(LedgerEntry {
        id: issue.number.to_string(),
        metadata,
        // The issue state only distinguishes open/closed; the engine
        // overlays the real status on mutating calls.
        status: if issue.state == "open" {
            EntryStatus::Created
        } else {
            EntryStatus::Fixed
        },
        created_at,
        updated_at,
        labels: issue.labels.iter().map(|l| l.name.clone()).collect(),
        comments: Vec::new(),
    })
}

/// Maps a code-scanning alert record to the domain model.
///
/// Returns `None` (and logs) when identity-relevant fields are missing.
fn map_scan_alert(wire: WireScanAlert) -> Option<Alert> {
    let Some(rule_id) = wire.rule.id.clone() else {
        debug!(alert = wire.number, "dropping alert without rule id");
        return None;
    };
    let instance = wire.most_recent_instance?;
    let Some(git_ref) = instance.git_ref else {
        debug!(alert = wire.number, "dropping alert without instance ref");
        return None;
    };
    let Some(location) = instance.location else {
        debug!(alert = wire.number, "dropping alert without location");
        return None;
    };
    let Some(path) = location.path else {
        debug!(alert = wire.number, "dropping alert without file path");
        return None;
    };

    let severity = match wire.rule.severity.as_deref() {
        Some("error") => ScannerSeverity::Error,
        Some("warning") => ScannerSeverity::Warning,
        Some("note") => ScannerSeverity::Note,
        _ => ScannerSeverity::Unknown,
    };
    let state = match wire.state.as_str() {
        "open" => AlertState::Open,
        "dismissed" => AlertState::Dismissed,
        "fixed" => AlertState::Fixed,
        _ => AlertState::Unknown,
    };

    Some(Alert {
        id: wire.number,
        url: wire.url,
        html_url: wire.html_url,
        state,
        rule: AlertRule {
            name: wire.rule.name.unwrap_or_else(|| rule_id.clone()),
            description: wire
                .rule
                .description
                .unwrap_or_else(|| "No description available".to_string()),
            severity,
            id: rule_id,
        },
        git_ref,
        location: AlertLocation {
            path,
            start_line: location.start_line,
            start_column: location.start_column,
        },
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn metadata() -> EntryMetadata {
        EntryMetadata {
            alert_id: "42".to_string(),
            fingerprint: Fingerprint::derive("js/sql-injection", "src/db/query.ts"),
            rule_id: "js/sql-injection".to_string(),
            rule_name: "SQL injection".to_string(),
            severity: Severity::High,
            description: "Unsanitized input flows into a query".to_string(),
            affected_file: "src/db/query.ts".to_string(),
            branch: "main".to_string(),
            line: Some(17),
            column: Some(5),
            url: Some("https://github.com/acme/widgets/security/code-scanning/42".to_string()),
        }
    }

    #[test]
    fn test_entry_title() {
        assert_eq!(entry_title(&metadata()), "🚨 HIGH: SQL injection");
    }

    #[test]
    fn test_creation_labels() {
        let labels = creation_labels(&metadata());
        assert_eq!(
            labels,
            vec![
                "security-alert".to_string(),
                "severity:high".to_string(),
                "rule:js/sql-injection".to_string(),
            ]
        );
    }

    #[test]
    fn test_body_metadata_round_trip() {
        let original = metadata();
        let body = build_entry_body(&original);
        let recovered = extract_metadata(&body);
        assert_eq!(recovered, original);
    }

    #[test]
    fn test_body_round_trip_without_optional_fields() {
        let mut original = metadata();
        original.line = None;
        original.column = None;
        original.url = None;

        let body = build_entry_body(&original);
        assert!(!body.contains("**Line:**"));
        assert!(!body.contains("**Column:**"));
        assert!(!body.contains("[View Alert]"));

        let recovered = extract_metadata(&body);
        assert_eq!(recovered, original);
    }

    #[test]
    fn test_extract_metadata_from_unrelated_body_degrades() {
        let recovered = extract_metadata("Just a hand-written issue.");
        assert_eq!(recovered.alert_id, "");
        assert_eq!(recovered.severity, Severity::Medium);
        assert_eq!(recovered.line, None);
    }

    #[test]
    fn test_map_issue_states() {
        let issue: WireIssue = serde_json::from_value(json!({
            "number": 7,
            "state": "open",
            "body": null,
            "labels": [{"name": "security-alert"}],
            "created_at": "2026-07-01T10:00:00Z",
            "updated_at": "2026-07-02T11:30:00Z",
        }))
        .unwrap();

        let entry = map_issue(&issue, metadata()).unwrap();
        assert_eq!(entry.id, "7");
        assert_eq!(entry.status, EntryStatus::Created);
        assert_eq!(entry.labels, vec!["security-alert".to_string()]);
        assert_eq!(entry.created_at.to_rfc3339(), "2026-07-01T10:00:00+00:00");

        let closed: WireIssue = serde_json::from_value(json!({
            "number": 7,
            "state": "closed",
            "created_at": "2026-07-01T10:00:00Z",
            "updated_at": "2026-07-02T11:30:00Z",
        }))
        .unwrap();
        let entry = map_issue(&closed, metadata()).unwrap();
        assert_eq!(entry.status, EntryStatus::Fixed);
    }

    #[test]
    fn test_map_issue_rejects_bad_timestamp() {
        let issue: WireIssue = serde_json::from_value(json!({
            "number": 7,
            "state": "open",
            "created_at": "yesterday",
            "updated_at": "2026-07-02T11:30:00Z",
        }))
        .unwrap();
        let err = map_issue(&issue, metadata()).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidResponse(_)));
    }

    fn wire_alert(value: serde_json::Value) -> WireScanAlert {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_map_scan_alert_complete_record() {
        let alert = map_scan_alert(wire_alert(json!({
            "number": 3,
            "url": "https://api.github.com/repos/acme/widgets/code-scanning/alerts/3",
            "html_url": "https://github.com/acme/widgets/security/code-scanning/3",
            "state": "open",
            "rule": {
                "id": "py/clear-text-logging",
                "name": "Clear-text logging",
                "description": "Sensitive data is logged in clear text",
                "severity": "warning",
            },
            "most_recent_instance": {
                "ref": "refs/heads/main",
                "location": {"path": "app/log.py", "start_line": 12},
            },
        })))
        .unwrap();

        assert_eq!(alert.id, 3);
        assert_eq!(alert.state, AlertState::Open);
        assert_eq!(alert.rule.severity, ScannerSeverity::Warning);
        assert_eq!(alert.branch(), "main");
        assert_eq!(alert.location.path, "app/log.py");
        assert_eq!(alert.location.start_line, Some(12));
        assert_eq!(alert.location.start_column, None);
    }

    #[test]
    fn test_map_scan_alert_fills_rule_defaults() {
        let alert = map_scan_alert(wire_alert(json!({
            "number": 3,
            "state": "open",
            "rule": {"id": "py/x"},
            "most_recent_instance": {
                "ref": "refs/heads/main",
                "location": {"path": "a.py"},
            },
        })))
        .unwrap();

        assert_eq!(alert.rule.name, "py/x");
        assert_eq!(alert.rule.description, "No description available");
        assert_eq!(alert.rule.severity, ScannerSeverity::Unknown);
        assert_eq!(alert.rule.severity.to_internal(), Severity::Medium);
    }

    #[test]
    fn test_map_scan_alert_drops_incomplete_records() {
        // No rule id.
        assert!(map_scan_alert(wire_alert(json!({
            "number": 1,
            "state": "open",
            "rule": {},
            "most_recent_instance": {
                "ref": "refs/heads/main",
                "location": {"path": "a.py"},
            },
        })))
        .is_none());

        // No instance.
        assert!(map_scan_alert(wire_alert(json!({
            "number": 2,
            "state": "open",
            "rule": {"id": "py/x"},
        })))
        .is_none());

        // No ref.
        assert!(map_scan_alert(wire_alert(json!({
            "number": 3,
            "state": "open",
            "rule": {"id": "py/x"},
            "most_recent_instance": {"location": {"path": "a.py"}},
        })))
        .is_none());

        // No path.
        assert!(map_scan_alert(wire_alert(json!({
            "number": 4,
            "state": "open",
            "rule": {"id": "py/x"},
            "most_recent_instance": {"ref": "refs/heads/main", "location": {}},
        })))
        .is_none());
    }

    #[test]
    fn test_parse_entry_id() {
        assert_eq!(parse_entry_id("17").unwrap(), 17);
        assert!(parse_entry_id("seventeen").is_err());
    }
}
