//! Fake git executable shared by the integration tests
//!
//! The script answers a handful of subcommands with canned output so the
//! real process runners can be exercised without a git installation.
#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use git_promise::GitConfig;

pub const NEWEST_COMMIT: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
pub const OLDEST_COMMIT: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

const FAKE_GIT: &str = r#"#!/bin/sh
if [ -n "$FAKE_GIT_ARGS_LOG" ]; then
  echo "$*" >> "$FAKE_GIT_ARGS_LOG"
fi

emit_commit() {
  printf 'commit %s\nAuthor: Fake Author <fake@example.com>\nDate:   %s\n\n    %s\n' "$1" "$2" "$3"
}

case "$1" in
  version)
    echo "git version ${FAKE_GIT_VERSION:-2.40.1}"
    ;;
  status)
    printf '## main...origin/main\nAM staged.txt\n?? new file.txt\nUU both.txt\nR  old.rs -> new.rs\n'
    exit "${FAKE_STATUS_EXIT:-0}"
    ;;
  log)
    raw=
    one=
    for arg in "$@"; do
      case "$arg" in
        --raw) raw=1 ;;
        --max-count=1) one=1 ;;
      esac
    done
    emit_commit aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa "Mon Jan 6 12:00:00 2025 +0000" "Second commit"
    if [ -n "$raw" ]; then printf '\n:100644 100644 1234567 89abcde M\tsrc/lib.rs\n'; fi
    if [ -z "$one" ]; then
      printf '\n'
      emit_commit bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb "Sun Jan 5 12:00:00 2025 +0000" "First commit"
      if [ -n "$raw" ]; then printf '\n:000000 100644 0000000 1234567 A\tsrc/lib.rs\n'; fi
    fi
    ;;
  hash-object)
    cat
    ;;
  editor)
    printf 'editor=[%s]\n' "$GIT_EDITOR"
    ;;
  pwd|clone)
    pwd
    ;;
  fail)
    echo "partial output"
    echo "fatal: scripted failure" >&2
    exit 3
    ;;
  *)
    echo "git: '$1' is not a git command" >&2
    exit 1
    ;;
esac
"#;

/// A temp directory holding the fake `git` and an empty repository directory
pub struct FakeGit {
    temp_dir: TempDir,
    binary: PathBuf,
    repo: PathBuf,
}

impl FakeGit {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let binary = temp_dir.path().join("fake-git");
        fs::write(&binary, FAKE_GIT).expect("Failed to write fake git");
        fs::set_permissions(&binary, fs::Permissions::from_mode(0o755))
            .expect("Failed to make fake git executable");

        let repo = temp_dir.path().join("repo");
        fs::create_dir(&repo).expect("Failed to create repo dir");

        Self {
            temp_dir,
            binary,
            repo,
        }
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn args_log(&self) -> PathBuf {
        self.temp_dir.path().join("args.log")
    }

    /// Every recorded invocation, one argument string per line
    pub fn recorded_args(&self) -> Vec<String> {
        fs::read_to_string(self.args_log())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn config(&self) -> GitConfig {
        let mut config = GitConfig::with_binary(self.binary.to_string_lossy());
        config.env.insert(
            "FAKE_GIT_ARGS_LOG".to_string(),
            self.args_log().to_string_lossy().into_owned(),
        );
        config
    }

    /// A TOML config file pointing the CLI at the fake binary
    pub fn write_config_file(&self) -> PathBuf {
        let path = self.temp_dir.path().join("config.toml");
        let content = format!(
            "git_binary = {:?}\n\n[env]\nFAKE_GIT_ARGS_LOG = {:?}\n",
            self.binary.to_string_lossy(),
            self.args_log().to_string_lossy()
        );
        fs::write(&path, content).expect("Failed to write config");
        path
    }
}
