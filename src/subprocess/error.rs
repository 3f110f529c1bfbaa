#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Failed to spawn `{command}`: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {message}")]
    InternalError { message: String },

    #[error("Mock expectation not met: {0}")]
    MockExpectationNotMet(String),
}

impl ProcessError {
    /// True when the process never started, as opposed to failing mid-stream
    pub fn is_spawn_failure(&self) -> bool {
        matches!(
            self,
            ProcessError::CommandNotFound(_) | ProcessError::SpawnFailed { .. }
        )
    }
}
