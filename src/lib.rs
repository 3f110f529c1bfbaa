//! # git-promise
//!
//! Run git subcommands without blocking the caller and get typed results back.
//!
//! Every operation on [`Git`] comes in two forms. The blocking form waits for
//! the process and returns a `Result`. The `_async` form returns a
//! [`GitFuture`] right away; the future settles exactly once with the parsed
//! result or a [`GitError`] carrying the exit status and captured output.
//!
//! ```no_run
//! use git_promise::{Git, GitOptions};
//!
//! # async fn demo() -> Result<(), git_promise::GitError> {
//! let git = Git::new("/path/to/repo");
//! let status = git.status_async(&GitOptions::new()).await?;
//! for entry in status.iter() {
//!     println!("{} {}", entry.code, entry.from);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - `config` - Git binary and child environment settings
//! - `future` - Single-assignment result handles
//! - `git` - The wrapper, exit classification and output parsers
//! - `subprocess` - Process runners behind trait seams, with a scripted mock for tests
pub mod config;
pub mod future;
pub mod git;
pub mod subprocess;

pub use config::{ConfigError, GitConfig};
pub use future::{Completion, GitFuture, GitResult, Resolver};
pub use git::{
    CommandOutput, Git, GitError, GitOptions, GitVersion, LogEntry, LogOptions, OptionValue,
    ParseError, RawModification, StatusCategory, StatusCollection, StatusEntry,
};
pub use subprocess::SubprocessManager;
