//! Git operation error types

use thiserror::Error;

/// Exit status reported for a command that never ran to completion
pub const LAUNCH_FAILURE_STATUS: i32 = -1;

/// Output that did not have the structure a parser expected
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unhandled line in log output: {line:?}")]
    UnhandledLogLine { line: String },

    #[error("No blank line separating commit header from message: {line:?}")]
    MissingSeparator { line: String },

    #[error("Malformed porcelain status line: {line:?}")]
    MalformedStatusLine { line: String },

    #[error("Unrecognized version output: {line:?}")]
    UnrecognizedVersion { line: String },
}

/// Failure of a git invocation. Cloneable so every reader of a shared
/// future receives the same error.
#[derive(Debug, Error, Clone)]
pub enum GitError {
    #[error("Failed to launch `{command}`: {message}")]
    Launch {
        command: String,
        message: String,
        stdout: Vec<String>,
        stderr: Vec<String>,
    },

    #[error("`{command}` {}", failure_summary(.code, .signal, .stderr))]
    ProcessFailure {
        command: String,
        code: Option<i32>,
        signal: Option<i32>,
        stdout: Vec<String>,
        stderr: Vec<String>,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Operation was dropped before it completed")]
    Abandoned,
}

fn failure_summary(code: &Option<i32>, signal: &Option<i32>, stderr: &[String]) -> String {
    let mut summary = match (code, signal) {
        (_, Some(signal)) => format!("terminated by signal {signal}"),
        (Some(code), None) => format!("exited with status {code}"),
        (None, None) => "failed".to_string(),
    };
    if let Some(first) = stderr.iter().find(|line| !line.trim().is_empty()) {
        summary.push_str(": ");
        summary.push_str(first.trim());
    }
    summary
}

impl GitError {
    /// Numeric exit status: the exit code, 128 + signal for signal deaths,
    /// -1 when the process could not be launched.
    pub fn status(&self) -> Option<i32> {
        match self {
            GitError::Launch { .. } => Some(LAUNCH_FAILURE_STATUS),
            GitError::ProcessFailure { code, signal, .. } => {
                code.or_else(|| signal.map(|s| 128 + s))
            }
            GitError::Parse(_) | GitError::Abandoned => None,
        }
    }

    /// Stdout collected before the failure, if any process output exists
    pub fn stdout(&self) -> &[String] {
        match self {
            GitError::Launch { stdout, .. } | GitError::ProcessFailure { stdout, .. } => stdout,
            _ => &[],
        }
    }

    pub fn stderr(&self) -> &[String] {
        match self {
            GitError::Launch { stderr, .. } | GitError::ProcessFailure { stderr, .. } => stderr,
            _ => &[],
        }
    }

    pub fn is_launch_failure(&self) -> bool {
        matches!(self, GitError::Launch { .. })
    }

    pub fn is_parse_error(&self) -> bool {
        matches!(self, GitError::Parse(_))
    }
}
