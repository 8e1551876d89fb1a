//! Node key material retrieval.

use crate::errors::ReviveResult;
use crate::types::Layer;
use async_trait::async_trait;
use std::fmt;

/// Keystore, alias and password a node process is started with.
#[derive(Clone, PartialEq, Eq)]
pub struct NodeCredentials {
    /// Keystore file name or content
    pub keystore: String,
    /// Key alias inside the keystore
    pub alias: String,
    /// Keystore password
    pub password: String,
}

impl fmt::Debug for NodeCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeCredentials")
            .field("keystore", &self.keystore)
            .field("alias", &self.alias)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Path of one node secret.
pub fn credential_path(node_id: &str, layer: Layer, name: &str) -> String {
    format!("/metagraph-nodes/{node_id}/{}/{name}", layer.key_segment())
}

/// Secret store lookups.
#[async_trait]
pub trait CredentialEffects: Send + Sync {
    /// Fetch the secret stored at `path`.
    async fn secret(&self, path: &str) -> ReviveResult<String>;

    /// Fetch the three secrets of `node_id` on `layer`.
    async fn node_credentials(&self, node_id: &str, layer: Layer) -> ReviveResult<NodeCredentials> {
        Ok(NodeCredentials {
            keystore: self.secret(&credential_path(node_id, layer, "keystore")).await?,
            alias: self.secret(&credential_path(node_id, layer, "keyalias")).await?,
            password: self.secret(&credential_path(node_id, layer, "password")).await?,
        })
    }
}
