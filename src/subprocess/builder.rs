//! Assembly of git invocations
//!
//! Everything that decides how a git child is launched lives here: the
//! configured binary and environment, the repository directory, and the
//! overrides that keep git from waiting on a terminal.

use std::collections::HashMap;
use std::path::Path;

use crate::config::GitConfig;
use crate::git::command::CLONE;
use crate::git::GitOptions;
use crate::subprocess::ProcessCommand;

/// Forced empty so no invocation can stop and wait for an editor
pub const EDITOR_ENV: &str = "GIT_EDITOR";

pub struct ProcessCommandBuilder {
    command: ProcessCommand,
    subcommand: Option<String>,
    disable_editor: bool,
}

impl ProcessCommandBuilder {
    /// Bare command with no git policy applied
    pub fn new(program: &str) -> Self {
        Self {
            command: ProcessCommand {
                program: program.to_string(),
                args: Vec::new(),
                env: HashMap::new(),
                working_dir: None,
                stdin: None,
            },
            subcommand: None,
            disable_editor: false,
        }
    }

    /// Configured git binary with the configured environment.
    ///
    /// `GIT_EDITOR` is set empty at build time, after every other variable.
    pub fn for_git(config: &GitConfig) -> Self {
        let mut builder = Self::new(&config.git_binary);
        for (key, value) in &config.env {
            builder = builder.env(key, value);
        }
        builder.disable_editor = true;
        builder
    }

    /// Arguments and stdin payload for one subcommand, serialized from `options`
    pub fn subcommand(mut self, name: &str, options: &GitOptions, positional: &[&str]) -> Self {
        let (argv, input) = options.serialize(name, positional);
        self.command.args.extend(argv);
        self.command.stdin = input;
        self.subcommand = Some(name.to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.command
            .args
            .extend(args.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.command.env.insert(key.to_string(), value.to_string());
        self
    }

    /// Directory the child runs in. Ignored for `clone`, which resolves its
    /// destination against the caller's directory.
    pub fn repository(mut self, dir: &Path) -> Self {
        self.command.working_dir = Some(dir.to_path_buf());
        self
    }

    pub fn build(mut self) -> ProcessCommand {
        if self.subcommand.as_deref() == Some(CLONE) {
            self.command.working_dir = None;
        }
        if self.disable_editor {
            self.command
                .env
                .insert(EDITOR_ENV.to_string(), String::new());
        }
        self.command
    }
}
