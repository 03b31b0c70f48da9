//! Engine configuration.
//!
//! The configuration surface consumed by the branch policy and the
//! reconciliation sweep. Values are deserialized once at bootstrap and
//! passed into component constructors; no ambient lookups happen inside
//! engine logic.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::policy::{BranchPolicy, BranchStrategy};

/// Reconciliation sweep knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SweepConfig {
    /// Whether the startup sweep runs at all.
    #[serde(default = "default_sweep_enabled")]
    pub enabled: bool,

    /// Delay before the startup sweep, so the server is up first.
    #[serde(default = "default_sweep_startup_delay_secs")]
    pub startup_delay_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: default_sweep_enabled(),
            startup_delay_secs: default_sweep_startup_delay_secs(),
        }
    }
}

impl SweepConfig {
    /// Startup delay as a [`Duration`].
    #[must_use]
    pub const fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }
}

/// Synchronization engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncConfig {
    /// Branch tracking strategy.
    #[serde(default)]
    pub strategy: BranchStrategy,

    /// Name of the main branch to track.
    #[serde(default = "default_main_branch")]
    pub main_branch: String,

    /// Reconciliation sweep knobs.
    #[serde(default)]
    pub sweep: SweepConfig,
}

impl SyncConfig {
    /// Builds the immutable branch policy from this configuration.
    #[must_use]
    pub fn policy(&self) -> BranchPolicy {
        let main_branch = if self.main_branch.is_empty() {
            default_main_branch()
        } else {
            self.main_branch.clone()
        };
        BranchPolicy::new(self.strategy, main_branch)
    }
}

const fn default_sweep_enabled() -> bool {
    true
}

const fn default_sweep_startup_delay_secs() -> u64 {
    1
}

fn default_main_branch() -> String {
    "main".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: SyncConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.strategy, BranchStrategy::MainOnly);
        assert_eq!(config.main_branch, "main");
        assert!(config.sweep.enabled);
        assert_eq!(config.sweep.startup_delay_secs, 1);
    }

    #[test]
    fn test_policy_from_config() {
        let config: SyncConfig = serde_json::from_str(
            r#"{"strategy": "all_branches", "main_branch": "trunk"}"#,
        )
        .unwrap();
        let policy = config.policy();
        assert_eq!(policy.strategy(), BranchStrategy::AllBranches);
        assert_eq!(policy.main_branch(), "trunk");
    }

    #[test]
    fn test_empty_main_branch_falls_back_to_default() {
        let config: SyncConfig = serde_json::from_str(r#"{"main_branch": ""}"#).unwrap();
        assert_eq!(config.policy().main_branch(), "main");
    }

    #[test]
    fn test_sweep_can_be_disabled() {
        let config: SyncConfig = serde_json::from_str(
            r#"{"sweep": {"enabled": false, "startup_delay_secs": 30}}"#,
        )
        .unwrap();
        assert!(!config.sweep.enabled);
        assert_eq!(config.sweep.startup_delay(), Duration::from_secs(30));
    }
}
