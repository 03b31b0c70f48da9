//! Webhook payload schema.
//!
//! Typed view of the scanner's `code_scanning_alert` webhook delivery. The
//! `action` field is kept as a raw string: schema validation accepts any
//! action, and the dispatcher is the one that rejects unsupported values
//! (that distinction is what lets an unknown action produce an
//! "unsupported action" error instead of a generic payload error).

use alertsync_core::{
    Alert, AlertEvent, AlertLocation, AlertRule, AlertState, ScannerSeverity,
};
use serde::Deserialize;

/// A `code_scanning_alert` webhook delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    /// Delivered action string.
    pub action: String,

    /// The alert the event concerns.
    pub alert: PayloadAlert,

    /// Event-level git ref, `refs/heads/<branch>` form.
    #[serde(rename = "ref")]
    pub git_ref: String,
}

/// Alert object inside a webhook delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct PayloadAlert {
    /// Scanner-assigned numeric id.
    pub id: u64,

    /// API URL of the alert.
    pub url: String,

    /// Human-facing permalink; falls back to `url` when absent.
    #[serde(default)]
    pub html_url: Option<String>,

    /// Alert state at delivery time.
    pub state: AlertState,

    /// The rule that produced the alert.
    pub rule: PayloadRule,

    /// Where the alert most recently manifested.
    pub most_recent_instance: PayloadInstance,
}

/// Rule object inside a webhook delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct PayloadRule {
    /// Rule identifier.
    pub id: String,

    /// Rule name; falls back to the id when absent.
    #[serde(default)]
    pub name: Option<String>,

    /// Rule description.
    #[serde(default)]
    pub description: Option<String>,

    /// Scanner severity.
    pub severity: ScannerSeverity,
}

/// Most-recent-instance object inside a webhook delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct PayloadInstance {
    /// Source location of the finding.
    pub location: PayloadLocation,
}

/// Location object inside a webhook delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct PayloadLocation {
    /// Repository-relative file path.
    pub path: String,

    /// 1-based start line.
    #[serde(default)]
    pub start_line: Option<u32>,

    /// 1-based start column.
    #[serde(default)]
    pub start_column: Option<u32>,
}

impl WebhookPayload {
    /// Converts the wire payload into an engine event.
    ///
    /// The event-level `ref` (not the instance ref) decides which branch
    /// the event fired for.
    #[must_use]
    pub fn into_event(self) -> AlertEvent {
        let html_url = self.alert.html_url.unwrap_or_else(|| self.alert.url.clone());
        AlertEvent {
            action: self.action,
            alert: Alert {
                id: self.alert.id,
                url: self.alert.url,
                html_url,
                state: self.alert.state,
                rule: AlertRule {
                    name: self
                        .alert
                        .rule
                        .name
                        .unwrap_or_else(|| self.alert.rule.id.clone()),
                    description: self.alert.rule.description.unwrap_or_default(),
                    severity: self.alert.rule.severity,
                    id: self.alert.rule.id,
                },
                git_ref: self.git_ref,
                location: AlertLocation {
                    path: self.alert.most_recent_instance.location.path,
                    start_line: self.alert.most_recent_instance.location.start_line,
                    start_column: self.alert.most_recent_instance.location.start_column,
                },
            },
        }
    }
}
