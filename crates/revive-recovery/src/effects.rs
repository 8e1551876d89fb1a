//! Effect composition for restart operations.
//!
//! The restart engine touches every external collaborator: the clock for
//! polling and timeouts, node and ledger HTTP for observation, the remote
//! channel for actions, secrets for node keys, the record store for
//! cross-invocation state and the alert sink. `RestartEffects` bundles them
//! so engine code carries a single bound.
//!
//! ```ignore
//! use revive_recovery::effects::RestartEffects;
//!
//! async fn probe<E: RestartEffects>(effects: &E) {
//!     let now = effects.now().await;
//!     // ...
//! }
//! ```

use revive_core::effects::{
    AlertEffects, CredentialEffects, LedgerEffects, NodeHttpEffects, PhysicalTimeEffects,
    RemoteCommandEffects, RestartRecordEffects,
};

/// Composed effects required by the restart engine.
pub trait RestartEffects:
    PhysicalTimeEffects
    + NodeHttpEffects
    + LedgerEffects
    + RemoteCommandEffects
    + CredentialEffects
    + RestartRecordEffects
    + AlertEffects
    + Send
    + Sync
{
}

/// Blanket implementation for any type that implements all required traits.
impl<T> RestartEffects for T where
    T: PhysicalTimeEffects
        + NodeHttpEffects
        + LedgerEffects
        + RemoteCommandEffects
        + CredentialEffects
        + RestartRecordEffects
        + AlertEffects
        + Send
        + Sync
{
}
