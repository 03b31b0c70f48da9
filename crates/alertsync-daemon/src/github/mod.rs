//! GitHub ledger backend.
//!
//! The one concrete [`alertsync_core::IssueLedger`] adapter in this
//! repository: ledger entries are GitHub issues, open alerts come from the
//! code-scanning API. Other trackers plug in behind the same trait without
//! touching the engine.

mod client;
mod ledger;

pub use client::GitHubClient;
pub use ledger::GitHubLedger;
