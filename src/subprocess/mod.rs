pub mod blocking;
pub mod builder;
pub mod error;
pub mod mock;
pub mod runner;


pub use blocking::{BlockingRunner, StdProcessRunner};
pub use builder::ProcessCommandBuilder;
pub use error::ProcessError;
pub use mock::{MockCommandConfig, MockProcessRunner};
pub use runner::{
    CollectedOutput, ExitStatus, LineSink, ProcessCommand, ProcessOutput, ProcessRunner,
    StreamSource, TokioProcessRunner,
};

use std::path::Path;
use std::sync::Arc;

use crate::config::GitConfig;
use crate::git::Git;

/// The pair of executors a [`Git`] wrapper runs through
#[derive(Clone)]
pub struct SubprocessManager {
    runner: Arc<dyn ProcessRunner>,
    blocking: Arc<dyn BlockingRunner>,
}

impl SubprocessManager {
    pub fn new(runner: Arc<dyn ProcessRunner>, blocking: Arc<dyn BlockingRunner>) -> Self {
        Self { runner, blocking }
    }

    pub fn production() -> Self {
        Self::new(Arc::new(TokioProcessRunner), Arc::new(StdProcessRunner))
    }

    /// Both seams backed by the same scripted runner
    pub fn mock() -> (Self, MockProcessRunner) {
        let mock = MockProcessRunner::new();
        let runner = Arc::new(mock.clone());
        (Self::new(runner.clone(), runner), mock)
    }

    pub fn runner(&self) -> Arc<dyn ProcessRunner> {
        Arc::clone(&self.runner)
    }

    pub fn blocking(&self) -> Arc<dyn BlockingRunner> {
        Arc::clone(&self.blocking)
    }

    pub fn git(&self, dir: impl AsRef<Path>, config: GitConfig) -> Git {
        Git::with_manager(dir, config, self.clone())
    }
}
