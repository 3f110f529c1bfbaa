use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::blocking::BlockingRunner;
use super::error::ProcessError;
use super::runner::{
    CollectedOutput, ExitStatus, LineSink, ProcessCommand, ProcessOutput, ProcessRunner,
    StreamSource,
};

/// Scripted process runner for tests; serves both the async and blocking seams
#[derive(Clone)]
pub struct MockProcessRunner {
    expectations: Arc<Mutex<Vec<MockExpectation>>>,
    call_history: Arc<Mutex<Vec<ProcessCommand>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MockFailure {
    /// Fail before any output, like a missing executable
    Spawn,
    /// Fail with an IO error after streaming the scripted output
    Io,
}

#[derive(Clone)]
struct MockResponse {
    status: ExitStatus,
    stdout: String,
    stderr: String,
    failure: Option<MockFailure>,
    delay: Option<Duration>,
}

struct MockExpectation {
    program: String,
    #[allow(clippy::type_complexity)]
    args_matcher: Option<Box<dyn Fn(&[String]) -> bool + Send + Sync>>,
    response: MockResponse,
    times_called: usize,
    expected_times: Option<usize>,
}

pub struct MockCommandConfig {
    runner: MockProcessRunner,
    expectation: MockExpectation,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn lines(text: &str) -> impl Iterator<Item = String> + '_ {
    text.lines().map(str::to_string)
}

impl MockProcessRunner {
    pub fn new() -> Self {
        Self {
            expectations: Arc::new(Mutex::new(Vec::new())),
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn expect_command(&mut self, program: &str) -> MockCommandConfig {
        MockCommandConfig {
            runner: self.clone(),
            expectation: MockExpectation {
                program: program.to_string(),
                args_matcher: None,
                response: MockResponse {
                    status: ExitStatus::Success,
                    stdout: String::new(),
                    stderr: String::new(),
                    failure: None,
                    delay: None,
                },
                times_called: 0,
                expected_times: None,
            },
        }
    }

    pub fn verify_called(&self, program: &str, times: usize) -> bool {
        let history = lock(&self.call_history);
        let count = history.iter().filter(|cmd| cmd.program == program).count();
        count == times
    }

    pub fn get_call_history(&self) -> Vec<ProcessCommand> {
        lock(&self.call_history).clone()
    }

    pub fn reset(&mut self) {
        lock(&self.expectations).clear();
        lock(&self.call_history).clear();
    }

    fn respond(&self, command: &ProcessCommand) -> Result<MockResponse, ProcessError> {
        lock(&self.call_history).push(command.clone());

        let mut expectations = lock(&self.expectations);

        for expectation in expectations.iter_mut() {
            if expectation.program != command.program {
                continue;
            }

            if let Some(ref args_matcher) = expectation.args_matcher {
                if !(args_matcher)(&command.args) {
                    continue;
                }
            }

            expectation.times_called += 1;

            if let Some(expected) = expectation.expected_times {
                if expectation.times_called > expected {
                    return Err(ProcessError::MockExpectationNotMet(format!(
                        "Command '{}' called {} times, expected {}",
                        command.program, expectation.times_called, expected
                    )));
                }
            }

            return Ok(expectation.response.clone());
        }

        Err(ProcessError::MockExpectationNotMet(format!(
            "No expectation found for command: {} {:?}",
            command.program, command.args
        )))
    }

    fn replay(
        response: MockResponse,
        command: &ProcessCommand,
        sink: &mut dyn LineSink,
    ) -> Result<ExitStatus, ProcessError> {
        if response.failure == Some(MockFailure::Spawn) {
            return Err(ProcessError::CommandNotFound(command.program.clone()));
        }

        for line in lines(&response.stdout) {
            sink.on_line(StreamSource::Stdout, line);
        }
        for line in lines(&response.stderr) {
            sink.on_line(StreamSource::Stderr, line);
        }

        if response.failure == Some(MockFailure::Io) {
            return Err(ProcessError::Io(std::io::Error::other(
                "mock stream interrupted",
            )));
        }

        Ok(response.status)
    }
}

#[async_trait]
impl ProcessRunner for MockProcessRunner {
    async fn run_streaming(
        &self,
        command: ProcessCommand,
        sink: &mut dyn LineSink,
    ) -> Result<ExitStatus, ProcessError> {
        let response = self.respond(&command)?;

        if let Some(delay) = response.delay {
            tokio::time::sleep(delay).await;
        }

        Self::replay(response, &command, sink)
    }
}

impl BlockingRunner for MockProcessRunner {
    fn run_blocking(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        let response = self.respond(&command)?;
        let mut collected = CollectedOutput::default();
        let status = Self::replay(response, &command, &mut collected)?;

        Ok(ProcessOutput {
            status,
            stdout: collected.stdout,
            stderr: collected.stderr,
        })
    }
}

impl MockCommandConfig {
    pub fn with_args<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&[String]) -> bool + Send + Sync + 'static,
    {
        self.expectation.args_matcher = Some(Box::new(matcher));
        self
    }

    pub fn returns_stdout(mut self, stdout: &str) -> Self {
        self.expectation.response.stdout = stdout.to_string();
        self
    }

    pub fn returns_stderr(mut self, stderr: &str) -> Self {
        self.expectation.response.stderr = stderr.to_string();
        self
    }

    pub fn returns_exit_code(mut self, code: i32) -> Self {
        self.expectation.response.status = if code == 0 {
            ExitStatus::Success
        } else {
            ExitStatus::Error(code)
        };
        self
    }

    pub fn returns_signal(mut self, signal: i32) -> Self {
        self.expectation.response.status = ExitStatus::Signal(signal);
        self
    }

    pub fn returns_success(mut self) -> Self {
        self.expectation.response.status = ExitStatus::Success;
        self
    }

    pub fn fails_to_spawn(mut self) -> Self {
        self.expectation.response.failure = Some(MockFailure::Spawn);
        self
    }

    pub fn fails_mid_stream(mut self) -> Self {
        self.expectation.response.failure = Some(MockFailure::Io);
        self
    }

    /// Hold the async response back; only honoured by the async runner
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.expectation.response.delay = Some(delay);
        self
    }

    pub fn times(mut self, n: usize) -> Self {
        self.expectation.expected_times = Some(n);
        self
    }

    pub fn finish(self) {
        lock(&self.runner.expectations).push(self.expectation);
    }
}

impl Default for MockProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}
