//! Exit classification shared by the blocking and async entry points

use serde::Serialize;

use super::error::GitError;
use crate::subprocess::{CollectedOutput, ExitStatus, ProcessError};

/// Subcommand that creates a repository from a path argument, so it runs
/// from the caller's directory instead of the wrapper's
pub const CLONE: &str = "clone";

/// Lines a successful command produced, per stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl CommandOutput {
    pub fn into_parts(self) -> (Vec<String>, Vec<String>) {
        (self.stdout, self.stderr)
    }

    pub fn first_line(&self) -> Option<&str> {
        self.stdout.first().map(String::as_str)
    }
}

impl From<CollectedOutput> for CommandOutput {
    fn from(collected: CollectedOutput) -> Self {
        Self {
            stdout: collected.stdout,
            stderr: collected.stderr,
        }
    }
}

/// `git status` can exit non-zero while still printing a valid listing;
/// that only counts as success when nothing went to stderr.
fn is_benign_status(subcommand: &str, collected: &CollectedOutput) -> bool {
    subcommand == "status" && !collected.stdout.is_empty() && collected.stderr.is_empty()
}

/// Decide the outcome of one invocation from how the process ended and what it printed
pub fn classify(
    subcommand: &str,
    command_line: &str,
    result: Result<ExitStatus, ProcessError>,
    collected: CollectedOutput,
) -> Result<CommandOutput, GitError> {
    let status = match result {
        Ok(status) => status,
        Err(e) => {
            return Err(GitError::Launch {
                command: command_line.to_string(),
                message: e.to_string(),
                stdout: collected.stdout,
                stderr: collected.stderr,
            });
        }
    };

    if !status.success() {
        if !is_benign_status(subcommand, &collected) {
            return Err(GitError::ProcessFailure {
                command: command_line.to_string(),
                code: status.code(),
                signal: status.signal(),
                stdout: collected.stdout,
                stderr: collected.stderr,
            });
        }

        tracing::warn!(
            "Treating {:?} from `{}` as success: output present and stderr empty",
            status,
            command_line
        );
    }

    Ok(collected.into())
}
