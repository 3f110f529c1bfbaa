//! Blocking execution used by the synchronous API

use std::io::Write;
use std::time::Instant;

use super::error::ProcessError;
use super::runner::{
    ignore_broken_pipe, log_command_start, log_result, map_spawn_error, split_lines, ExitStatus,
    ProcessCommand, ProcessOutput,
};

pub trait BlockingRunner: Send + Sync {
    fn run_blocking(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError>;
}

/// Runs commands on the calling thread with `std::process`
pub struct StdProcessRunner;

impl BlockingRunner for StdProcessRunner {
    fn run_blocking(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        let start = Instant::now();
        log_command_start(&command);

        let mut child = command
            .to_std_command()
            .spawn()
            .map_err(|e| map_spawn_error(e, &command))?;

        // Feed stdin from a helper thread while wait_with_output drains the pipes
        let writer = match (child.stdin.take(), command.stdin.clone()) {
            (Some(mut stdin), Some(data)) => Some(std::thread::spawn(move || {
                stdin.write_all(data.as_bytes())
            })),
            _ => None,
        };

        let output = child.wait_with_output().map_err(ProcessError::Io)?;

        if let Some(writer) = writer {
            let written = writer.join().map_err(|_| ProcessError::InternalError {
                message: "stdin writer thread panicked".to_string(),
            })?;
            ignore_broken_pipe(written)?;
        }

        let status = ExitStatus::from_std(output.status);
        log_result(&status, start.elapsed(), &command);

        Ok(ProcessOutput {
            status,
            stdout: split_lines(&output.stdout),
            stderr: split_lines(&output.stderr),
        })
    }
}
