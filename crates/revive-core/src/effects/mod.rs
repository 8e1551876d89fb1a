//! Effect traits for every external collaborator of the restart engine.
//!
//! These traits say **what** the engine may do to the outside world;
//! `revive-effects` implements them against real systems and
//! `revive-testkit` implements them in memory.
//!
//! | Trait | Collaborator |
//! |---|---|
//! | [`PhysicalTimeEffects`] | wall clock |
//! | [`NodeHttpEffects`] | node `/node/info`, `/cluster/info`, snapshots |
//! | [`LedgerEffects`] | ledger backend |
//! | [`RemoteCommandEffects`] | remote shell channel |
//! | [`CredentialEffects`] | secret store |
//! | [`RestartRecordEffects`] | durable record store |
//! | [`AlertEffects`] | paging service |

pub mod alerts;
pub mod credentials;
pub mod ledger;
pub mod node;
pub mod records;
pub mod remote;
pub mod time;

pub use alerts::{AlertEffects, AlertPayload, AlertPriority};
pub use credentials::{credential_path, CredentialEffects, NodeCredentials};
pub use ledger::LedgerEffects;
pub use node::NodeHttpEffects;
pub use records::RestartRecordEffects;
pub use remote::{CommandReceipt, RemoteCommandEffects};
pub use time::PhysicalTimeEffects;
