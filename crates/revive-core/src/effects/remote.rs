//! Remote shell command channel.

use crate::errors::ReviveResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Acknowledgment that a command batch was submitted.
///
/// Carries no completion information: whether the commands actually ran is
/// only ever learned through later health probes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandReceipt {
    /// Channel-assigned command id
    pub id: String,
}

/// Fire-and-forget execution of shell commands on fleet members.
#[async_trait]
pub trait RemoteCommandEffects: Send + Sync {
    /// Submit `commands` to run, in order, as one script on every target
    /// instance. Returns once the submission is accepted.
    async fn dispatch(&self, targets: &[String], commands: &[String])
        -> ReviveResult<CommandReceipt>;
}
