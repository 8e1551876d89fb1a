//! Revive Recovery - restart engine for metagraph clusters
//!
//! Each invocation of [`RestartController::run`] is short-lived and
//! independent. It either moves an open restart episode forward or decides
//! whether a new one is needed, using the persisted [`RestartRecord`] as the
//! only cross-invocation state and mutual exclusion flag.
//!
//! # Architecture
//!
//! - `health`: node readiness probes, unreachable kept apart from not-ready
//! - `snapshots`: stall detection and reference source node selection
//! - `conditions`: prioritized restart decision (force, stall, unhealthy,
//!   data transactions)
//! - `full_cluster`: rollback and join phases of a full cluster restart
//! - `individual`: per-node and per-layer restarts
//! - `reconcile`: progress checks and timeout abandonment of an open episode
//! - `controller`: one invocation end to end
//! - `commands` / `alerts`: shell command and alert payload builders
//!
//! [`RestartRecord`]: revive_core::RestartRecord

#![forbid(unsafe_code)]

pub mod alerts;
pub mod commands;
pub mod conditions;
pub mod context;
pub mod controller;
pub mod effects;
pub mod full_cluster;
pub mod health;
pub mod individual;
pub mod reconcile;
pub mod records;
pub mod snapshots;

pub use conditions::{decide, ConditionEvaluator, ConditionSignals, IndividualPlan, RestartCondition};
pub use context::RestartContext;
pub use controller::{ControllerOutcome, ControllerResponse, RestartController};
pub use effects::RestartEffects;
pub use full_cluster::FullClusterOrchestrator;
pub use health::{HealthProber, ProbeOutcome, UnhealthyNodes};
pub use individual::IndividualOrchestrator;
pub use reconcile::{ReconcileOutcome, Reconciler};
pub use records::RecordStore;
pub use snapshots::SnapshotMonitor;
