//! Branch tracking policy.
//!
//! [`BranchPolicy`] is the single decision point for whether an alert on a
//! given branch produces (or updates) a ledger entry. It is an explicitly
//! constructed, immutable value passed into every component that needs it;
//! nothing in this crate reads policy from the process environment.

use serde::{Deserialize, Serialize};

/// Strategy for handling alerts across branches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchStrategy {
    /// Only alerts on the main branch produce ledger entries.
    #[default]
    MainOnly,

    /// Alerts on the main branch produce entries; alerts appearing on other
    /// branches may update an existing entry but never create one.
    MainWithBranchUpdates,

    /// Alerts on any branch produce ledger entries.
    AllBranches,
}

impl BranchStrategy {
    /// Canonical snake_case name, matching the configuration encoding.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MainOnly => "main_only",
            Self::MainWithBranchUpdates => "main_with_branch_updates",
            Self::AllBranches => "all_branches",
        }
    }
}

impl std::fmt::Display for BranchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable branch-tracking policy: a strategy plus the main branch name.
///
/// Governs whether a `created` event or a reconciliation-discovered alert
/// produces a new entry. It does NOT govern whether an `appeared_in_branch`
/// event may update an existing entry; that check lives in the event
/// processor and looks at the strategy alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchPolicy {
    strategy: BranchStrategy,
    main_branch: String,
}

impl BranchPolicy {
    /// Creates a policy from a strategy and the tracked main branch name.
    pub fn new(strategy: BranchStrategy, main_branch: impl Into<String>) -> Self {
        Self {
            strategy,
            main_branch: main_branch.into(),
        }
    }

    /// Returns the configured strategy.
    #[must_use]
    pub const fn strategy(&self) -> BranchStrategy {
        self.strategy
    }

    /// Returns the configured main branch name.
    #[must_use]
    pub fn main_branch(&self) -> &str {
        &self.main_branch
    }

    /// Decides whether an alert on `branch` should produce a ledger entry.
    ///
    /// Total over strings; no failure modes.
    #[must_use]
    pub fn should_track(&self, branch: &str) -> bool {
        match self.strategy {
            BranchStrategy::AllBranches => true,
            BranchStrategy::MainOnly | BranchStrategy::MainWithBranchUpdates => {
                branch == self.main_branch
            },
        }
    }
}
