//! # Revive Effects - production effect handlers
//!
//! Implementations of the `revive-core` effect traits against real systems:
//!
//! - [`RealTimeHandler`]: system clock and tokio timers
//! - [`HttpNodeClient`] / [`HttpLedgerClient`]: node endpoints and the ledger
//!   backend over `reqwest`
//! - [`SshCommandHandler`]: fire-and-forget command batches over `ssh`
//! - [`FileSecretStore`]: secrets as files under a root directory
//! - [`FileRecordStore`]: restart records as JSON files with atomic
//!   conditional create
//! - [`OpsgenieAlertHandler`] / [`LoggingAlertHandler`]: alert sinks
//!
//! [`ProductionEffects`] composes one of each for the binary.

#![forbid(unsafe_code)]

pub mod alerts;
pub mod http;
pub mod records;
pub mod remote;
pub mod secrets;
pub mod system;
pub mod time;

pub use alerts::{LoggingAlertHandler, OpsgenieAlertHandler};
pub use http::{network_error, HttpLedgerClient, HttpNodeClient};
pub use records::FileRecordStore;
pub use remote::SshCommandHandler;
pub use secrets::FileSecretStore;
pub use system::ProductionEffects;
pub use time::RealTimeHandler;
