//! Shell-backed command execution and governor wiring.

use async_trait::async_trait;
use process_utils::tokio_shell_command;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::traits::{CommandError, CommandExecutor, CommandOutput, GovernedCommands};
use crate::pipeline::worker_pool::{ResourceGovernor, ResourcePool};

/// Runs commands through the platform shell (`sh -c` / `cmd /C`).
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellCommandExecutor;

impl ShellCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandExecutor for ShellCommandExecutor {
    async fn run(&self, command: &str) -> Result<CommandOutput, CommandError> {
        let start = Instant::now();
        debug!(command = %command, "Running command");

        let output = tokio_shell_command(command)
            .output()
            .await
            .map_err(|source| CommandError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            warn!(
                command = %command,
                code = ?output.status.code(),
                "Command failed"
            );
            return Err(CommandError::NonZeroExit {
                command: command.to_string(),
                code: output.status.code(),
                stderr,
            });
        }

        debug!(
            command = %command,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Command finished"
        );
        Ok(CommandOutput { stdout, stderr })
    }
}

/// A [`CommandExecutor`] that takes a permit from the governor for every command.
#[derive(Clone)]
pub struct GovernedExecutor {
    executor: Arc<dyn CommandExecutor>,
    governor: Arc<ResourceGovernor>,
}

impl GovernedExecutor {
    pub fn new(executor: Arc<dyn CommandExecutor>, governor: Arc<ResourceGovernor>) -> Self {
        Self { executor, governor }
    }
}

#[async_trait]
impl GovernedCommands for GovernedExecutor {
    async fn run_in(
        &self,
        pool: ResourcePool,
        command: &str,
    ) -> Result<CommandOutput, CommandError> {
        let executor = self.executor.clone();
        self.governor
            .with_permit(pool, || async move { executor.run(command).await })
            .await
    }
}
