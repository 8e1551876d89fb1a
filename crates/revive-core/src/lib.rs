//! Revive Core - foundation of the metagraph restart controller
//!
//! Pure types and interfaces shared by every other crate. Nothing in here
//! talks to the outside world; handlers live in `revive-effects` and the
//! restart engine lives in `revive-recovery`.
//!
//! # Contents
//!
//! - `errors`: the unified [`ReviveError`] and [`ReviveResult`]
//! - `types`: layers, nodes, snapshots, topology and the persisted
//!   [`RestartRecord`] with its closed state enums
//! - `effects`: async traits for time, node HTTP, ledger backend, remote
//!   commands, secrets, record storage and alerting
//! - `config`: the TOML-backed [`ControllerConfig`] and its validation
//! - `retry`: fixed-delay [`RetryPolicy`] driven by the time effect

#![forbid(unsafe_code)]

/// Controller configuration and validation
pub mod config;

/// Effect traits for external collaborators
pub mod effects;

/// Unified error handling
pub mod errors;

/// Fixed-delay retry budgets
pub mod retry;

/// Domain types
pub mod types;

pub use config::{ControllerConfig, LayerConfig, NetworkName, PolicyConfig, ReferenceNode};
pub use errors::{ReviveError, ReviveResult};
pub use retry::RetryPolicy;
pub use types::{
    ClusterTopology, Layer, NodeAddress, NodeHealth, NodeHealthRecord, NodeIdentity,
    RestartReason, RestartRecord, RestartState, RestartType,
};
