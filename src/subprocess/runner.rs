use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};

use super::error::ProcessError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub working_dir: Option<PathBuf>,
    pub stdin: Option<String>,
}

impl ProcessCommand {
    /// Command line rendered for logs and error messages
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    /// Build the std command shared by the async and blocking runners
    pub(crate) fn to_std_command(&self) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(&self.args);

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        if self.stdin.is_some() {
            cmd.stdin(Stdio::piped());
        } else {
            cmd.stdin(Stdio::null());
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }
}

/// Stream source identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSource {
    Stdout,
    Stderr,
}

/// Receives output lines as the process produces them
pub trait LineSink: Send {
    fn on_line(&mut self, source: StreamSource, line: String);
}

/// Sink that keeps every line, split by stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedOutput {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl LineSink for CollectedOutput {
    fn on_line(&mut self, source: StreamSource, line: String) {
        tracing::trace!("{:?}: {}", source, line);
        match source {
            StreamSource::Stdout => self.stdout.push(line),
            StreamSource::Stderr => self.stderr.push(line),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Error(i32),
    Signal(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Success => Some(0),
            ExitStatus::Error(code) => Some(*code),
            ExitStatus::Signal(_) => None,
        }
    }

    pub fn signal(&self) -> Option<i32> {
        match self {
            ExitStatus::Signal(signal) => Some(*signal),
            _ => None,
        }
    }

    /// Convert a std exit status, keeping the terminating signal on unix
    pub(crate) fn from_std(status: std::process::ExitStatus) -> Self {
        if status.success() {
            ExitStatus::Success
        } else if let Some(code) = status.code() {
            ExitStatus::Error(code)
        } else {
            Self::from_signal(status)
        }
    }

    #[cfg(unix)]
    fn from_signal(status: std::process::ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;
        match status.signal() {
            Some(signal) => ExitStatus::Signal(signal),
            None => ExitStatus::Error(1),
        }
    }

    #[cfg(not(unix))]
    fn from_signal(_status: std::process::ExitStatus) -> Self {
        ExitStatus::Error(1)
    }
}

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to completion, handing each output line to `sink` as it arrives.
    /// Lines delivered before an error stay with the sink.
    async fn run_streaming(
        &self,
        command: ProcessCommand,
        sink: &mut dyn LineSink,
    ) -> Result<ExitStatus, ProcessError>;

    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        let mut collected = CollectedOutput::default();
        let status = self.run_streaming(command, &mut collected).await?;

        Ok(ProcessOutput {
            status,
            stdout: collected.stdout,
            stderr: collected.stderr,
        })
    }
}

/// Strip the line terminator and decode lossily; git paths need not be UTF-8
pub(crate) fn normalize_line(mut line: Vec<u8>) -> String {
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    String::from_utf8_lossy(&line).into_owned()
}

/// Split captured output into lines the same way the streaming reader does
pub(crate) fn split_lines(bytes: &[u8]) -> Vec<String> {
    bytes
        .split_inclusive(|b| *b == b'\n')
        .map(|line| normalize_line(line.to_vec()))
        .collect()
}

pub(crate) fn log_command_start(command: &ProcessCommand) {
    tracing::debug!("Executing subprocess: {}", command.display());

    if !command.env.is_empty() {
        tracing::trace!("Environment overrides: {:?}", command.env);
    }

    if let Some(ref dir) = command.working_dir {
        tracing::trace!("Working directory: {:?}", dir);
    }

    if let Some(ref stdin) = command.stdin {
        tracing::trace!("Stdin provided: {} bytes", stdin.len());
    }
}

pub(crate) fn log_result(status: &ExitStatus, duration: Duration, command: &ProcessCommand) {
    let command_str = command.display();

    match status {
        ExitStatus::Success => {
            tracing::debug!(
                "Subprocess completed successfully in {:?}: {}",
                duration,
                command_str
            );
        }
        ExitStatus::Error(code) => {
            tracing::debug!(
                "Subprocess failed with exit code {} in {:?}: {}",
                code,
                duration,
                command_str
            );
        }
        ExitStatus::Signal(signal) => {
            tracing::warn!(
                "Subprocess terminated by signal {} in {:?}: {}",
                signal,
                duration,
                command_str
            );
        }
    }
}

/// Map spawn error to ProcessError
pub(crate) fn map_spawn_error(error: std::io::Error, command: &ProcessCommand) -> ProcessError {
    tracing::error!(
        "Failed to spawn '{}': {:?} (kind: {:?})",
        command.program,
        error,
        error.kind()
    );

    if error.kind() == std::io::ErrorKind::NotFound {
        ProcessError::CommandNotFound(command.program.clone())
    } else {
        ProcessError::SpawnFailed {
            command: command.display(),
            source: error,
        }
    }
}

/// A child that exits without draining stdin is not an error
pub(crate) fn ignore_broken_pipe(result: std::io::Result<()>) -> Result<(), ProcessError> {
    match result {
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
            tracing::trace!("Child closed stdin before all input was written");
            Ok(())
        }
        other => other.map_err(ProcessError::Io),
    }
}

pub struct TokioProcessRunner;

impl TokioProcessRunner {
    /// Extract a stream from a child process, converting None to error
    fn extract_stream<T>(stream: Option<T>, stream_name: &str) -> Result<T, ProcessError> {
        stream.ok_or_else(|| ProcessError::InternalError {
            message: format!("Failed to capture {}", stream_name),
        })
    }

    /// Write the input payload and close stdin so the child sees EOF
    async fn write_stdin(
        stdin: Option<tokio::process::ChildStdin>,
        data: Option<&str>,
    ) -> Result<(), ProcessError> {
        let (Some(mut stdin), Some(data)) = (stdin, data) else {
            return Ok(());
        };

        ignore_broken_pipe(stdin.write_all(data.as_bytes()).await)?;
        ignore_broken_pipe(stdin.shutdown().await)
    }

    /// Read both pipes to EOF, forwarding lines in arrival order per stream.
    /// Draining them together keeps a chatty stderr from blocking stdout.
    async fn pump_lines<O, E>(
        stdout: O,
        stderr: E,
        sink: &mut dyn LineSink,
    ) -> Result<(), ProcessError>
    where
        O: AsyncRead + Unpin,
        E: AsyncRead + Unpin,
    {
        let mut out_lines = BufReader::new(stdout).split(b'\n');
        let mut err_lines = BufReader::new(stderr).split(b'\n');
        let mut out_open = true;
        let mut err_open = true;

        while out_open || err_open {
            tokio::select! {
                line = out_lines.next_segment(), if out_open => {
                    match line.map_err(ProcessError::Io)? {
                        Some(line) => sink.on_line(StreamSource::Stdout, normalize_line(line)),
                        None => out_open = false,
                    }
                }
                line = err_lines.next_segment(), if err_open => {
                    match line.map_err(ProcessError::Io)? {
                        Some(line) => sink.on_line(StreamSource::Stderr, normalize_line(line)),
                        None => err_open = false,
                    }
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run_streaming(
        &self,
        command: ProcessCommand,
        sink: &mut dyn LineSink,
    ) -> Result<ExitStatus, ProcessError> {
        let start = Instant::now();
        log_command_start(&command);

        let mut cmd = tokio::process::Command::from(command.to_std_command());
        let mut child = cmd
            .spawn()
            .map_err(|e| map_spawn_error(e, &command))?;

        let stdout = Self::extract_stream(child.stdout.take(), "stdout")?;
        let stderr = Self::extract_stream(child.stderr.take(), "stderr")?;
        let stdin = child.stdin.take();

        let (fed, pumped) = tokio::join!(
            Self::write_stdin(stdin, command.stdin.as_deref()),
            Self::pump_lines(stdout, stderr, sink),
        );
        fed?;
        pumped?;

        let status = child.wait().await.map_err(ProcessError::Io)?;
        let status = ExitStatus::from_std(status);
        log_result(&status, start.elapsed(), &command);

        Ok(status)
    }
}
