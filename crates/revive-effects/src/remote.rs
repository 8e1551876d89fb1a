//! SSH-based remote command dispatch.

use async_trait::async_trait;
use revive_core::config::RemoteConfig;
use revive_core::effects::{CommandReceipt, RemoteCommandEffects};
use revive_core::types::ClusterTopology;
use revive_core::{ReviveError, ReviveResult};
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use uuid::Uuid;

/// Join a command batch into one script, one command per line.
pub fn render_script(commands: &[String]) -> String {
    let mut script = String::new();
    for command in commands {
        script.push_str(command);
        script.push('\n');
    }
    script
}

/// Dispatches command batches over `ssh`, piping the script into a remote
/// `bash -s`.
///
/// Submission is complete once the script has been handed to `ssh`; the
/// remote exit status is only logged by a detached task.
#[derive(Debug, Clone)]
pub struct SshCommandHandler {
    hosts: HashMap<String, String>,
    user: String,
    options: Vec<String>,
    timeout: Duration,
}

impl SshCommandHandler {
    /// Create a handler addressing the nodes of `topology` by instance id.
    pub fn new(topology: &ClusterTopology, config: &RemoteConfig) -> Self {
        let hosts = topology
            .nodes()
            .map(|node| (node.id.clone(), node.ip.clone()))
            .collect();
        Self {
            hosts,
            user: config.ssh_user.clone(),
            options: config.ssh_options.clone(),
            timeout: Duration::from_secs(config.command_timeout_secs),
        }
    }

    /// SSH arguments for one host.
    pub fn ssh_args(&self, host: &str) -> Vec<String> {
        let mut args = self.options.clone();
        args.push(format!("{}@{}", self.user, host));
        args.push("bash".to_string());
        args.push("-s".to_string());
        args
    }

    async fn submit(&self, command_id: &str, target: &str, host: &str, script: &str) -> ReviveResult<()> {
        let mut child = Command::new("ssh")
            .args(self.ssh_args(host))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ReviveError::network(format!("failed to spawn ssh to {host}: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(script.as_bytes())
                .await
                .map_err(|e| ReviveError::network(format!("failed to send script to {host}: {e}")))?;
        }

        let timeout = self.timeout;
        let command_id = command_id.to_string();
        let target = target.to_string();
        tokio::spawn(async move {
            match tokio::time::timeout(timeout, child.wait()).await {
                Ok(Ok(status)) if status.success() => {
                    tracing::debug!(%command_id, %target, "remote command finished");
                }
                Ok(Ok(status)) => {
                    tracing::warn!(%command_id, %target, %status, "remote command exited with failure");
                }
                Ok(Err(err)) => {
                    tracing::warn!(%command_id, %target, error = %err, "remote command wait failed");
                }
                Err(_) => {
                    let _ = child.start_kill();
                    tracing::warn!(%command_id, %target, "remote command timed out");
                }
            }
        });

        Ok(())
    }
}

#[async_trait]
impl RemoteCommandEffects for SshCommandHandler {
    async fn dispatch(
        &self,
        targets: &[String],
        commands: &[String],
    ) -> ReviveResult<CommandReceipt> {
        let command_id = Uuid::new_v4().to_string();
        let script = render_script(commands);

        let mut submitted = 0usize;
        let mut last_error = None;
        for target in targets {
            let Some(host) = self.hosts.get(target) else {
                tracing::warn!(%target, "no host known for instance, skipping");
                continue;
            };
            match self.submit(&command_id, target, host, &script).await {
                Ok(()) => submitted += 1,
                Err(err) => {
                    tracing::warn!(%target, error = %err, "command submission failed");
                    last_error = Some(err);
                }
            }
        }

        if submitted == 0 {
            return Err(last_error.unwrap_or_else(|| {
                ReviveError::invalid(format!("no known host among targets {targets:?}"))
            }));
        }

        Ok(CommandReceipt { id: command_id })
    }
}
