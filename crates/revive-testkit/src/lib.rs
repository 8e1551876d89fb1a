//! Revive Testing Infrastructure
//!
//! Deterministic in-memory effects and cluster fixtures for exercising the
//! restart engine without network, SSH or disk access.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! revive-testkit = { path = "../revive-testkit" }
//! ```
//!
//! ```rust,no_run
//! use revive_testkit::*;
//!
//! let config = sample_config();
//! let effects = healthy_cluster(&config);
//! effects.set_snapshot_age_minutes(10);
//! ```

pub mod fixtures;
pub mod mock;

pub use fixtures::*;
pub use mock::{DispatchedCommand, MockEffects, NodeResponse};

/// Route `tracing` output through the test harness. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
