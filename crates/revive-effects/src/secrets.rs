//! File-backed secret store.

use async_trait::async_trait;
use revive_core::effects::CredentialEffects;
use revive_core::{ReviveError, ReviveResult};
use std::path::{Component, Path, PathBuf};

/// Reads secrets from files under a root directory.
///
/// The secret path `/metagraph-nodes/i-1/l0/keystore` maps to
/// `<root>/metagraph-nodes/i-1/l0/keystore`. Trailing newlines are stripped.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    root: PathBuf,
}

impl FileSecretStore {
    /// Create a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> ReviveResult<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if path.trim().is_empty() || escapes {
            return Err(ReviveError::invalid(format!("invalid secret path: {path}")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl CredentialEffects for FileSecretStore {
    async fn secret(&self, path: &str) -> ReviveResult<String> {
        let file = self.resolve(path)?;
        match tokio::fs::read_to_string(&file).await {
            Ok(content) => Ok(content.trim_end_matches(['\r', '\n']).to_string()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(ReviveError::not_found(format!("secret {path} not found")))
            }
            Err(err) => Err(ReviveError::storage(format!(
                "failed to read secret {path}: {err}"
            ))),
        }
    }
}
