//! alertsync-daemon — webhook daemon synchronizing code scanning alerts to
//! a GitHub issue ledger.
//!
//! The daemon wires the [`alertsync_core`] engine to its collaborators:
//!
//! - [`webhook`]: the axum HTTP surface (`POST /webhook`, `GET /health`)
//! - [`github`]: the concrete GitHub issue-ledger adapter
//! - [`sweep`]: the startup reconciliation task
//! - [`config`]: TOML configuration with env-var secret indirection
//!
//! The webhook path and the reconciliation sweep run as independent tokio
//! tasks sharing only the immutable branch policy and the ledger handle.

pub mod config;
pub mod github;
pub mod sweep;
pub mod webhook;

pub use config::{ConfigError, DaemonConfig, GitHubConfig, ServerConfig};
pub use github::{GitHubClient, GitHubLedger};
pub use sweep::spawn_startup_sweep;
pub use webhook::{AppState, WebhookError, router};
