//! In-memory ledger backend.
//!
//! Backs the test suite and local development. Records per-operation call
//! counts so tests can assert exactly which ledger calls a transition made,
//! and supports injecting per-alert create failures for sweep error-isolation
//! tests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use super::{EntryLookup, EntryUpdate, IssueLedger, LedgerError};
use crate::alert::Alert;
use crate::entry::{EntryMetadata, EntryStatus, LedgerEntry};

/// Per-operation call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerCallCounts {
    /// Calls to `create`.
    pub create: usize,
    /// Calls to `find_by_identity`.
    pub find_by_identity: usize,
    /// Calls to `update`.
    pub update: usize,
    /// Calls to `close`.
    pub close: usize,
    /// Calls to `reopen`.
    pub reopen: usize,
    /// Calls to `add_comment`.
    pub add_comment: usize,
    /// Calls to `add_labels`.
    pub add_labels: usize,
    /// Calls to `fetch_open_alerts`.
    pub fetch_open_alerts: usize,
}

impl LedgerCallCounts {
    /// Total number of mutating calls (everything except finds/fetches).
    #[must_use]
    pub const fn mutations(&self) -> usize {
        self.create + self.update + self.close + self.reopen + self.add_comment + self.add_labels
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<LedgerEntry>,
    open_alerts: Vec<Alert>,
    next_id: u64,
    counts: LedgerCallCounts,
    fail_create_for: HashSet<String>,
}

/// An [`IssueLedger`] held entirely in process memory.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    inner: Mutex<Inner>,
}

impl InMemoryLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the set of alerts returned by `fetch_open_alerts`.
    pub fn set_open_alerts(&self, alerts: Vec<Alert>) {
        self.inner.lock().unwrap().open_alerts = alerts;
    }

    /// Makes `create` fail with a network error for the given alert id.
    pub fn fail_create_for(&self, alert_id: impl Into<String>) {
        self.inner
            .lock()
            .unwrap()
            .fail_create_for
            .insert(alert_id.into());
    }

    /// Snapshot of the call counters.
    #[must_use]
    pub fn counts(&self) -> LedgerCallCounts {
        self.inner.lock().unwrap().counts
    }

    /// Snapshot of all stored entries, in creation order.
    #[must_use]
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.inner.lock().unwrap().entries.clone()
    }

    /// Looks up a stored entry by ledger id.
    #[must_use]
    pub fn entry(&self, id: &str) -> Option<LedgerEntry> {
        self.inner
            .lock()
            .unwrap()
            .entries
            .iter()
            .find(|entry| entry.id == id)
            .cloned()
    }

    fn not_found(id: &str) -> LedgerError {
        LedgerError::Api {
            message: format!("entry {id} not found"),
            status_code: Some(404),
        }
    }

    fn status_for_reason(reason: Option<&str>, fallback: EntryStatus) -> EntryStatus {
        reason.and_then(EntryStatus::parse).unwrap_or(fallback)
    }
}

#[async_trait]
impl IssueLedger for InMemoryLedger {
    async fn create(&self, metadata: EntryMetadata) -> Result<LedgerEntry, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        inner.counts.create += 1;

        if inner.fail_create_for.contains(&metadata.alert_id) {
            return Err(LedgerError::Network(format!(
                "injected create failure for alert {}",
                metadata.alert_id
            )));
        }

        inner.next_id += 1;
        let now = Utc::now();
        let entry = LedgerEntry {
            id: inner.next_id.to_string(),
            labels: vec![
                "security-alert".to_string(),
                format!("severity:{}", metadata.severity),
                format!("rule:{}", metadata.rule_id),
            ],
            metadata,
            status: EntryStatus::Created,
            created_at: now,
            updated_at: now,
            comments: Vec::new(),
        };
        inner.entries.push(entry.clone());
        Ok(entry)
    }

    async fn find_by_identity(
        &self,
        lookup: &EntryLookup,
    ) -> Result<Option<LedgerEntry>, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        inner.counts.find_by_identity += 1;

        let matches: Vec<&LedgerEntry> = inner
            .entries
            .iter()
            .filter(|entry| {
                let alert_match = lookup
                    .alert_id
                    .as_ref()
                    .is_some_and(|id| *id == entry.metadata.alert_id);
                let fingerprint_match = lookup
                    .fingerprint
                    .as_ref()
                    .is_some_and(|fp| *fp == entry.metadata.fingerprint);
                alert_match || fingerprint_match
            })
            .collect();

        if matches.len() > 1 {
            warn!(
                candidates = matches.len(),
                "ambiguous identity lookup, returning most recently created entry"
            );
        }

        // Entries are stored in creation order; the last match is the most
        // recently created one.
        Ok(matches.last().map(|entry| (*entry).clone()))
    }

    async fn update(&self, request: EntryUpdate) -> Result<LedgerEntry, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        inner.counts.update += 1;

        let entry = inner
            .entries
            .iter_mut()
            .find(|entry| entry.id == request.id)
            .ok_or_else(|| Self::not_found(&request.id))?;

        if let Some(status) = request.status {
            entry.status = status;
        }
        for label in request.labels {
            if !entry.labels.contains(&label) {
                entry.labels.push(label);
            }
        }
        if let Some(comment) = request.comment {
            entry.comments.push(comment);
        }
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn close(&self, id: &str, reason: Option<&str>) -> Result<LedgerEntry, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        inner.counts.close += 1;

        let entry = inner
            .entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or_else(|| Self::not_found(id))?;

        if let Some(reason) = reason {
            entry.comments.push(format!("Closed: {reason}"));
        }
        entry.status = Self::status_for_reason(reason, EntryStatus::Fixed);
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn reopen(&self, id: &str, reason: Option<&str>) -> Result<LedgerEntry, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        inner.counts.reopen += 1;

        let entry = inner
            .entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or_else(|| Self::not_found(id))?;

        if let Some(reason) = reason {
            entry.comments.push(format!("Reopened: {reason}"));
        }
        entry.status = Self::status_for_reason(reason, EntryStatus::Reopened);
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn add_comment(&self, id: &str, comment: &str) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        inner.counts.add_comment += 1;

        let entry = inner
            .entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or_else(|| Self::not_found(id))?;
        entry.comments.push(comment.to_string());
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn add_labels(&self, id: &str, labels: &[String]) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        inner.counts.add_labels += 1;

        let entry = inner
            .entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or_else(|| Self::not_found(id))?;
        for label in labels {
            if !entry.labels.contains(label) {
                entry.labels.push(label.clone());
            }
        }
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn fetch_open_alerts(&self) -> Result<Vec<Alert>, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        inner.counts.fetch_open_alerts += 1;
        Ok(inner.open_alerts.clone())
    }
}
