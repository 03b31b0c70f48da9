//! Stable alert identity.
//!
//! Scanner-assigned alert ids are not stable across re-scans, so the engine
//! derives its own identity key from the pair that IS stable for a logical
//! finding: the rule id and the file path. Both the webhook path and the
//! reconciliation sweep derive fingerprints through this module, which is
//! what lets the two channels agree on identity.

use serde::{Deserialize, Serialize};

/// Separator between the rule id and file path components.
const SEPARATOR: char = '-';

/// A derived, stable identity for a logical finding.
///
/// Two alerts with the same fingerprint are treated as the same logical
/// finding regardless of numeric id or branch. Branch is tracked separately
/// as an attribute of where the finding currently manifests, not of what it
/// is.
///
/// No escaping is performed: a rule id or path containing the separator can
/// collide with a distinct finding. Accepted limitation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Derives the fingerprint for a (rule id, file path) pair.
    ///
    /// Deterministic and total.
    #[must_use]
    pub fn derive(rule_id: &str, file_path: &str) -> Self {
        Self(format!("{rule_id}{SEPARATOR}{file_path}"))
    }

    /// Returns the fingerprint as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
