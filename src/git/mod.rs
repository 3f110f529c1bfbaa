//! Git wrapper with blocking and non-blocking entry points
//!
//! Every operation exists twice: a blocking form (`status`, `log`, ...) that
//! runs through a [`BlockingRunner`] and returns its result at the call site,
//! and an `_async` form that returns a [`GitFuture`] immediately and reports
//! every failure through it. Both share argument serialization, exit
//! classification and the output parsers.

pub mod command;
pub mod error;
pub mod log;
pub mod options;
pub mod status;
pub mod version;

pub use command::{classify, CommandOutput};
pub use error::{GitError, ParseError};
pub use log::{parse_log, LogEntry, RawModification};
pub use options::{GitOptions, OptionValue};
pub use status::{parse_status, StatusCategory, StatusCollection, StatusEntry};
pub use version::{parse_version_line, GitVersion};

use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::GitConfig;
use crate::future::{GitFuture, GitResult};
use crate::subprocess::{
    BlockingRunner, CollectedOutput, ProcessCommand, ProcessCommandBuilder, ProcessRunner,
    SubprocessManager,
};

/// Options for `log`; pretty format, colour and decoration are always forced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// Also parse the `--raw` file modifications of each commit
    pub raw: bool,
    pub max_count: Option<usize>,
    /// Passed through ahead of the forced options
    pub extra: GitOptions,
    /// Revision ranges and `--` path limiters
    pub revisions: Vec<String>,
}

impl LogOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    pub fn max_count(mut self, count: usize) -> Self {
        self.max_count = Some(count);
        self
    }

    pub fn revision(mut self, revision: impl Into<String>) -> Self {
        self.revisions.push(revision.into());
        self
    }

    pub fn extra(mut self, extra: GitOptions) -> Self {
        self.extra = extra;
        self
    }

    fn to_git_options(&self, no_abbrev_commit: bool) -> GitOptions {
        let mut opts = self.extra.clone();
        opts.set("no_decorate", OptionValue::Flag(true));
        opts.set("no_color", OptionValue::Flag(true));
        opts.set("pretty", OptionValue::Value("medium".to_string()));
        if no_abbrev_commit {
            opts.set("no_abbrev_commit", OptionValue::Flag(true));
        }
        if self.raw {
            opts.set("raw", OptionValue::Flag(true));
        }
        if let Some(count) = self.max_count {
            opts.set("max_count", OptionValue::Value(count.to_string()));
        }
        opts
    }

    fn revision_args(&self) -> Vec<&str> {
        self.revisions.iter().map(String::as_str).collect()
    }
}

/// Whether `log` may pass `--no-abbrev-commit`. A version string that does not
/// parse counts as too old; a failed `git version` still fails the caller.
fn no_abbrev_commit_support(version: GitResult<GitVersion>) -> GitResult<bool> {
    match version {
        Ok(version) => Ok(version.supports_log_no_abbrev_commit()),
        Err(GitError::Parse(e)) => {
            tracing::debug!("Treating unrecognized git version as old: {}", e);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

fn status_options(options: &GitOptions) -> GitOptions {
    let mut opts = options.clone();
    opts.set("porcelain", OptionValue::Flag(true));
    opts
}

fn version_from_output(output: &CommandOutput) -> Result<String, ParseError> {
    output
        .first_line()
        .map(parse_version_line)
        .ok_or_else(|| ParseError::UnrecognizedVersion {
            line: String::new(),
        })
}

/// Handle on one repository directory.
///
/// Clones share the executors, the last-output cache and the cached version.
#[derive(Clone)]
pub struct Git {
    dir: PathBuf,
    config: GitConfig,
    runner: Arc<dyn ProcessRunner>,
    blocking: Arc<dyn BlockingRunner>,
    last: Arc<Mutex<CommandOutput>>,
    version: Arc<OnceCell<GitVersion>>,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("dir", &self.dir)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Git {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self::with_config(dir, GitConfig::default())
    }

    pub fn with_config(dir: impl AsRef<Path>, config: GitConfig) -> Self {
        Self::with_manager(dir, config, SubprocessManager::production())
    }

    pub fn with_manager(
        dir: impl AsRef<Path>,
        config: GitConfig,
        manager: SubprocessManager,
    ) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            config,
            runner: manager.runner(),
            blocking: manager.blocking(),
            last: Arc::new(Mutex::new(CommandOutput::default())),
            version: Arc::new(OnceCell::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> &GitConfig {
        &self.config
    }

    fn last(&self) -> MutexGuard<'_, CommandOutput> {
        self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stdout of the most recent successful command. Overlapping async calls
    /// race on this; read the future's own value instead when they can overlap.
    pub fn last_output(&self) -> Vec<String> {
        self.last().stdout.clone()
    }

    /// Stderr of the most recent successful command
    pub fn last_error(&self) -> Vec<String> {
        self.last().stderr.clone()
    }

    fn remember(&self, output: &CommandOutput) {
        *self.last() = output.clone();
    }

    fn cache_version(&self, version: &str) {
        match GitVersion::parse(version) {
            Ok(parsed) => {
                let _ = self.version.set(parsed);
            }
            Err(e) => tracing::debug!("Not caching git version: {}", e),
        }
    }

    fn prepare(&self, subcommand: &str, options: &GitOptions, args: &[&str]) -> ProcessCommand {
        ProcessCommandBuilder::for_git(&self.config)
            .subcommand(subcommand, options, args)
            .repository(&self.dir)
            .build()
    }

    /// Run any subcommand and wait for it
    pub fn run(
        &self,
        subcommand: &str,
        options: &GitOptions,
        args: &[&str],
    ) -> GitResult<CommandOutput> {
        let command = self.prepare(subcommand, options, args);
        let command_line = command.display();

        let (result, collected) = match self.blocking.run_blocking(command) {
            Ok(output) => (
                Ok(output.status),
                CollectedOutput {
                    stdout: output.stdout,
                    stderr: output.stderr,
                },
            ),
            Err(e) => (Err(e), CollectedOutput::default()),
        };

        let outcome = classify(subcommand, &command_line, result, collected);
        if let Ok(output) = &outcome {
            self.remember(output);
        }
        outcome
    }

    /// Start any subcommand; the future resolves with its output lines.
    ///
    /// Must be called from within a tokio runtime.
    pub fn run_async(
        &self,
        subcommand: &str,
        options: &GitOptions,
        args: &[&str],
    ) -> GitFuture<CommandOutput> {
        let command = self.prepare(subcommand, options, args);
        let subcommand = subcommand.to_string();
        let git = self.clone();

        GitFuture::spawn(async move {
            let command_line = command.display();
            let mut collected = CollectedOutput::default();
            let result = git.runner.run_streaming(command, &mut collected).await;

            let outcome = classify(&subcommand, &command_line, result, collected);
            if let Ok(output) = &outcome {
                git.remember(output);
            }
            outcome
        })
    }

    pub fn status(&self, options: &GitOptions) -> GitResult<StatusCollection> {
        let output = self.run("status", &status_options(options), &[])?;
        Ok(parse_status(&output.stdout)?)
    }

    pub fn status_async(&self, options: &GitOptions) -> GitFuture<StatusCollection> {
        self.run_async("status", &status_options(options), &[])
            .map_ok(|output| Ok(parse_status(&output.stdout)?))
    }

    pub fn log(&self, options: &LogOptions) -> GitResult<Vec<LogEntry>> {
        let no_abbrev_commit = no_abbrev_commit_support(self.git_version())?;
        let output = self.run(
            "log",
            &options.to_git_options(no_abbrev_commit),
            &options.revision_args(),
        )?;
        Ok(parse_log(&output.stdout, options.raw)?)
    }

    /// Log entries in git's output order (newest first unless told otherwise)
    pub fn log_async(&self, options: &LogOptions) -> GitFuture<Vec<LogEntry>> {
        let git = self.clone();
        let options = options.clone();

        GitFuture::spawn(async move {
            let no_abbrev_commit = no_abbrev_commit_support(git.git_version_async().await)?;
            let output = git
                .run_async(
                    "log",
                    &options.to_git_options(no_abbrev_commit),
                    &options.revision_args(),
                )
                .await?;
            Ok(parse_log(&output.stdout, options.raw)?)
        })
    }

    /// Version number with the `git version ` prefix removed
    pub fn version(&self) -> GitResult<String> {
        let output = self.run("version", &GitOptions::new(), &[])?;
        let version = version_from_output(&output)?;
        self.cache_version(&version);
        Ok(version)
    }

    pub fn version_async(&self) -> GitFuture<String> {
        let git = self.clone();
        self.run_async("version", &GitOptions::new(), &[])
            .map_ok(move |output| {
                let version = version_from_output(&output)?;
                git.cache_version(&version);
                Ok(version)
            })
    }

    /// Parsed version, queried once per wrapper
    pub fn git_version(&self) -> GitResult<GitVersion> {
        if let Some(version) = self.version.get() {
            return Ok(version.clone());
        }
        let raw = self.version()?;
        Ok(GitVersion::parse(&raw)?)
    }

    pub fn git_version_async(&self) -> GitFuture<GitVersion> {
        match self.version.get() {
            Some(version) => GitFuture::ready(Ok(version.clone())),
            None => self
                .version_async()
                .map_ok(|raw| Ok(GitVersion::parse(&raw)?)),
        }
    }

    pub fn supports_status_porcelain(&self) -> GitResult<bool> {
        Ok(self.git_version()?.supports_status_porcelain())
    }

    pub fn supports_log_no_abbrev_commit(&self) -> GitResult<bool> {
        Ok(self.git_version()?.supports_log_no_abbrev_commit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::future::Completion;
    use crate::subprocess::MockProcessRunner;
    use tokio::sync::oneshot;

    const LOG_OUTPUT: &str = concat!(
        "commit 0123456789abcdef0123456789abcdef01234567\n",
        "Author: Test User <test@example.com>\n",
        "Date:   Mon Jan 6 12:00:00 2025 +0000\n",
        "\n",
        "    Add feature\n",
        "    \n",
        "    Longer description.\n",
        "\n",
        "commit 89abcdef0123456789abcdef0123456789abcdef\n",
        "Author: Test User <test@example.com>\n",
        "Date:   Sun Jan 5 12:00:00 2025 +0000\n",
        "\n",
        "    Initial commit\n",
    );

    fn mock_git() -> (Git, MockProcessRunner) {
        let (manager, mock) = SubprocessManager::mock();
        (manager.git("/repo", GitConfig::default()), mock)
    }

    fn expect_version(mock: &mut MockProcessRunner, version: &str) {
        mock.expect_command("git")
            .with_args(|args| args == ["version"])
            .returns_stdout(&format!("git version {version}\n"))
            .finish();
    }

    #[tokio::test]
    async fn test_status_async_forces_porcelain() {
        let (git, mut mock) = mock_git();
        mock.expect_command("git")
            .with_args(|args| args == ["status", "--untracked-files=all", "--porcelain"])
            .returns_stdout("AM path.txt\n?? new.txt\n")
            .finish();

        let opts = GitOptions::new()
            .value("untracked_files", "all")
            .flag("porcelain", false);
        let status = git.status_async(&opts).await.unwrap();

        assert_eq!(status.get(StatusCategory::Indexed).len(), 1);
        assert_eq!(status.get(StatusCategory::Changed).len(), 1);
        assert_eq!(status.get(StatusCategory::Unknown).len(), 1);

        let call = &mock.get_call_history()[0];
        assert_eq!(call.working_dir.as_deref(), Some(Path::new("/repo")));
        assert_eq!(call.env.get("GIT_EDITOR").map(String::as_str), Some(""));
    }

    #[tokio::test]
    async fn test_async_call_returns_pending_future() {
        let (git, mut mock) = mock_git();
        mock.expect_command("git").returns_stdout("?? a\n").finish();

        let future = git.status_async(&GitOptions::new());
        assert!(!future.is_resolved());
        assert!(future.clone().await.is_ok());
        assert!(future.is_resolved());
    }

    #[tokio::test]
    async fn test_benign_status_exit() {
        let (git, mut mock) = mock_git();
        mock.expect_command("git")
            .returns_stdout(" M a.rs\n")
            .returns_exit_code(1)
            .finish();

        let status = git.status_async(&GitOptions::new()).await.unwrap();
        assert_eq!(status.len(), 1);
        assert_eq!(git.last_output(), vec![" M a.rs"]);
    }

    #[tokio::test]
    async fn test_status_exit_with_stderr_fails() {
        let (git, mut mock) = mock_git();
        mock.expect_command("git")
            .returns_stdout(" M a.rs\n")
            .returns_stderr("warning: could not open directory\n")
            .returns_exit_code(1)
            .finish();

        let err = git.status_async(&GitOptions::new()).await.unwrap_err();
        assert_eq!(err.status(), Some(1));
        assert!(git.last_output().is_empty());
    }

    #[tokio::test]
    async fn test_launch_failure_resolves_with_minus_one() {
        let (git, mut mock) = mock_git();
        mock.expect_command("git").fails_to_spawn().finish();

        let err = git
            .run_async("status", &GitOptions::new(), &[])
            .await
            .unwrap_err();
        assert!(err.is_launch_failure());
        assert_eq!(err.status(), Some(-1));
    }

    #[tokio::test]
    async fn test_stream_failure_keeps_partial_output() {
        let (git, mut mock) = mock_git();
        mock.expect_command("git")
            .returns_stdout("?? a\n?? b\n")
            .fails_mid_stream()
            .finish();

        let err = git.status_async(&GitOptions::new()).await.unwrap_err();
        assert_eq!(err.status(), Some(-1));
        assert_eq!(err.stdout(), &["?? a".to_string(), "?? b".to_string()]);
    }

    #[tokio::test]
    async fn test_clone_runs_outside_repository() {
        let (git, mut mock) = mock_git();
        mock.expect_command("git").finish();

        git.run_async("clone", &GitOptions::new(), &["https://example.com/r.git", "/repo"])
            .await
            .unwrap();
        git.run_async("fetch", &GitOptions::new(), &[]).await.unwrap();

        let history = mock.get_call_history();
        assert_eq!(history[0].working_dir, None);
        assert_eq!(history[1].working_dir.as_deref(), Some(Path::new("/repo")));
    }

    #[tokio::test]
    async fn test_editor_override_beats_config_env() {
        let (manager, mut mock) = SubprocessManager::mock();
        let mut config = GitConfig::default();
        config.env.insert("GIT_EDITOR".to_string(), "vim".to_string());
        config
            .env
            .insert("GIT_TERMINAL_PROMPT".to_string(), "0".to_string());
        let git = manager.git("/repo", config);
        mock.expect_command("git").finish();

        git.run_async("commit", &GitOptions::new().value("m", "msg"), &[])
            .await
            .unwrap();

        let call = &mock.get_call_history()[0];
        assert_eq!(call.args, vec!["commit", "-m", "msg"]);
        assert_eq!(call.env.get("GIT_EDITOR").map(String::as_str), Some(""));
        assert_eq!(call.env.get("GIT_TERMINAL_PROMPT").map(String::as_str), Some("0"));
    }

    #[tokio::test]
    async fn test_stdin_payload_is_forwarded() {
        let (git, mut mock) = mock_git();
        mock.expect_command("git").returns_stdout("deadbeef\n").finish();

        let out = git
            .run_async("hash-object", &GitOptions::new().flag("stdin", true).stdin("blob"), &[])
            .await
            .unwrap();

        assert_eq!(out.first_line(), Some("deadbeef"));
        let call = &mock.get_call_history()[0];
        assert_eq!(call.args, vec!["hash-object", "--stdin"]);
        assert_eq!(call.stdin.as_deref(), Some("blob"));
    }

    #[tokio::test]
    async fn test_version_async_strips_prefix() {
        let (git, mut mock) = mock_git();
        expect_version(&mut mock, "2.40.1");

        assert_eq!(git.version_async().await.unwrap(), "2.40.1");
        assert!(git.supports_log_no_abbrev_commit().unwrap());
        assert!(mock.verify_called("git", 1));
    }

    #[tokio::test]
    async fn test_version_failure_propagates_unchanged() {
        let (git, mut mock) = mock_git();
        mock.expect_command("git")
            .returns_stderr("fatal: broken\n")
            .returns_exit_code(129)
            .finish();

        let err = git.version_async().await.unwrap_err();
        match err {
            GitError::ProcessFailure { code, stderr, .. } => {
                assert_eq!(code, Some(129));
                assert_eq!(stderr, vec!["fatal: broken"]);
            }
            other => panic!("Expected ProcessFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_log_async_parses_and_probes_version_once() {
        let (git, mut mock) = mock_git();
        expect_version(&mut mock, "2.40.1");
        mock.expect_command("git")
            .with_args(|args| {
                args == [
                    "log",
                    "--no-decorate",
                    "--no-color",
                    "--pretty=medium",
                    "--no-abbrev-commit",
                    "--max-count=2",
                    "main",
                ]
            })
            .returns_stdout(LOG_OUTPUT)
            .times(2)
            .finish();

        let options = LogOptions::new().max_count(2).revision("main");
        let entries = git.log_async(&options).await.unwrap();
        git.log_async(&options).await.unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].summary(), "Add feature");
        assert_eq!(entries[0].message, "Add feature\n\nLonger description.\n");
        assert_eq!(entries[1].id, "89abcdef0123456789abcdef0123456789abcdef");

        let version_calls = mock
            .get_call_history()
            .iter()
            .filter(|call| call.args == ["version"])
            .count();
        assert_eq!(version_calls, 1);
    }

    #[tokio::test]
    async fn test_log_on_old_git_keeps_abbreviation_flag_off() {
        let (git, mut mock) = mock_git();
        expect_version(&mut mock, "1.7.1");
        mock.expect_command("git")
            .with_args(|args| args[0] == "log")
            .returns_stdout(LOG_OUTPUT)
            .finish();

        git.log_async(&LogOptions::new().raw(true)).await.unwrap();

        let log_call = &mock.get_call_history()[1];
        assert!(!log_call.args.contains(&"--no-abbrev-commit".to_string()));
        assert!(log_call.args.contains(&"--raw".to_string()));
    }

    #[tokio::test]
    async fn test_log_runs_when_version_is_unrecognized() {
        let (git, mut mock) = mock_git();
        mock.expect_command("git")
            .with_args(|args| args == ["version"])
            .returns_stdout("git version dev\n")
            .finish();
        mock.expect_command("git")
            .with_args(|args| args[0] == "log")
            .returns_stdout(LOG_OUTPUT)
            .finish();

        let entries = git.log_async(&LogOptions::new()).await.unwrap();

        assert_eq!(entries.len(), 2);
        let log_call = &mock.get_call_history()[1];
        assert_eq!(
            log_call.args,
            vec!["log", "--no-decorate", "--no-color", "--pretty=medium"]
        );
    }

    #[test]
    fn test_blocking_log_runs_when_version_is_unrecognized() {
        let (git, mut mock) = mock_git();
        expect_version(&mut mock, "dev");
        mock.expect_command("git")
            .with_args(|args| args[0] == "log")
            .returns_stdout(LOG_OUTPUT)
            .finish();

        assert_eq!(git.log(&LogOptions::new()).unwrap().len(), 2);
        assert!(matches!(
            git.git_version(),
            Err(GitError::Parse(ParseError::UnrecognizedVersion { .. }))
        ));
    }

    #[tokio::test]
    async fn test_log_fails_when_version_command_fails() {
        let (git, mut mock) = mock_git();
        mock.expect_command("git")
            .with_args(|args| args == ["version"])
            .returns_stderr("fatal: broken\n")
            .returns_exit_code(2)
            .finish();

        let err = git.log_async(&LogOptions::new()).await.unwrap_err();
        assert_eq!(err.status(), Some(2));
        assert!(mock.verify_called("git", 1));
    }

    #[tokio::test]
    async fn test_log_parse_error_fails_future() {
        let (git, mut mock) = mock_git();
        expect_version(&mut mock, "2.40.1");
        mock.expect_command("git")
            .with_args(|args| args[0] == "log")
            .returns_stdout("warning: something odd\n")
            .finish();

        let err = git.log_async(&LogOptions::new()).await.unwrap_err();
        match err {
            GitError::Parse(ParseError::UnhandledLogLine { line }) => {
                assert_eq!(line, "warning: something odd");
            }
            other => panic!("Expected parse error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_completion_callback_receives_outcome() {
        let (git, mut mock) = mock_git();
        expect_version(&mut mock, "2.45.0");
        let (tx, rx) = oneshot::channel();

        git.version_async()
            .attach(Completion::callback(move |outcome| {
                let _ = tx.send(outcome);
            }));

        assert_eq!(rx.await.unwrap().unwrap(), "2.45.0");
    }

    #[tokio::test]
    async fn test_completion_resolver_is_resolved_and_returned() {
        let (git, mut mock) = mock_git();
        mock.expect_command("git").returns_stdout("UU both.txt\n").finish();
        let (resolver, mine) = GitFuture::<StatusCollection>::pending();

        let returned = git
            .status_async(&GitOptions::new())
            .attach(Completion::Resolver(resolver));

        let mine = mine.await.unwrap();
        assert_eq!(mine.get(StatusCategory::Conflict).len(), 1);
        assert_eq!(returned.await.unwrap(), mine);
    }

    #[test]
    fn test_blocking_entry_points() {
        let (git, mut mock) = mock_git();
        expect_version(&mut mock, "2.40.1");
        mock.expect_command("git")
            .with_args(|args| args[0] == "status")
            .returns_stdout("?? newfile.txt\n")
            .finish();
        mock.expect_command("git")
            .with_args(|args| args[0] == "log")
            .returns_stdout(LOG_OUTPUT)
            .finish();

        assert_eq!(git.version().unwrap(), "2.40.1");

        let status = git.status(&GitOptions::new()).unwrap();
        assert_eq!(status.get(StatusCategory::Unknown)[0].from, "newfile.txt");
        assert_eq!(git.last_output(), vec!["?? newfile.txt"]);

        let entries = git.log(&LogOptions::new()).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_blocking_failure_raises_at_call_site() {
        let (git, mut mock) = mock_git();
        mock.expect_command("git")
            .returns_stderr("fatal: not a git repository\n")
            .returns_exit_code(128)
            .finish();

        let err = git.run("branch", &GitOptions::new(), &[]).unwrap_err();
        assert_eq!(err.status(), Some(128));
        assert_eq!(err.stderr(), &["fatal: not a git repository".to_string()]);
    }
}
