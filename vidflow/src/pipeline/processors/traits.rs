//! Command executor trait and related types.

use async_trait::async_trait;
use thiserror::Error;

use crate::pipeline::worker_pool::{GovernorError, ResourcePool};

/// Captured output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Failure running an external command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with code {code:?}: {stderr}")]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error(transparent)]
    Governor(#[from] GovernorError),
}

/// How many stderr lines a persisted failure message keeps.
pub const STDERR_TAIL_LINES: usize = 5;

impl CommandError {
    /// One-line description for persisted errors: the exit code and only the
    /// tail of stderr.
    pub fn summary(&self) -> String {
        match (self, self.stderr_tail(STDERR_TAIL_LINES)) {
            (CommandError::NonZeroExit { command, code, .. }, Some(tail)) => {
                format!("`{command}` exited with code {code:?}: {tail}")
            }
            _ => self.to_string(),
        }
    }

    /// Last lines of stderr, which is where ffmpeg and friends explain themselves.
    pub fn stderr_tail(&self, lines: usize) -> Option<String> {
        match self {
            CommandError::NonZeroExit { stderr, .. } => {
                let all: Vec<&str> = stderr.lines().collect();
                let start = all.len().saturating_sub(lines);
                Some(all[start..].join("\n"))
            }
            _ => None,
        }
    }
}

/// Runs one shell command and captures its stdio.
///
/// The engine never looks inside the process beyond stdout/stderr, which
/// keeps every workflow testable against a scripted fake.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, command: &str) -> Result<CommandOutput, CommandError>;
}

/// Something that runs commands under a resource pool.
///
/// Workflows talk to this rather than to [`CommandExecutor`] directly so that
/// no command can bypass the governor.
#[async_trait]
pub trait GovernedCommands: Send + Sync {
    async fn run_in(&self, pool: ResourcePool, command: &str)
    -> Result<CommandOutput, CommandError>;
}
