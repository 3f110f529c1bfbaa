use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, error, trace};

use git_promise::{
    Git, GitConfig, GitError, GitOptions, LogEntry, LogOptions, StatusCollection,
};

/// Run git commands through a non-blocking wrapper
#[derive(Parser)]
#[command(name = "git-promise")]
#[command(about = "Query a git repository through typed, non-blocking git calls", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Repository directory (default: current directory)
    #[arg(short = 'C', long = "dir", global = true)]
    dir: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show working tree status, grouped by category
    Status {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show commit history
    Log {
        /// Include the files each commit touched
        #[arg(long)]
        raw: bool,

        /// Limit the number of commits
        #[arg(short = 'n', long)]
        max_count: Option<usize>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,

        /// Revisions or ranges to list
        revisions: Vec<String>,
    },
    /// Print the installed git version
    Version,
    /// Status, last commit and version gathered concurrently
    Summary {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Run an arbitrary git subcommand and print its output
    Run {
        subcommand: String,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[derive(Serialize)]
struct Summary {
    version: String,
    branch: Option<String>,
    dirty: bool,
    changes: usize,
    last_commit: Option<LogEntry>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        2 => "trace",
        _ => "trace,tokio=debug",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .with_target(cli.verbose >= 2)
        .with_thread_ids(cli.verbose >= 3)
        .with_line_number(cli.verbose >= 3)
        .init();

    debug!("git-promise started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code(&e));
    }
}

/// Mirror git's own exit status when the failure came from git
fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<GitError>()
        .and_then(GitError::status)
        .filter(|code| *code > 0)
        .unwrap_or(1)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config =
        GitConfig::discover(cli.config.as_deref()).context("Failed to load configuration")?;
    let dir = match cli.dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    let git = Git::with_config(&dir, config);

    match cli.command {
        Commands::Status { json } => {
            let status = git.status_async(&GitOptions::new()).await?;
            if json {
                print_json(&status)?;
            } else {
                print_status(&status);
            }
        }
        Commands::Log {
            raw,
            max_count,
            json,
            revisions,
        } => {
            let options = LogOptions {
                raw,
                max_count,
                revisions,
                ..LogOptions::default()
            };
            let entries = git.log_async(&options).await?;
            if json {
                print_json(&entries)?;
            } else {
                print_log(&entries);
            }
        }
        Commands::Version => {
            println!("{}", git.version_async().await?);
        }
        Commands::Summary { json } => {
            let summary = summarize(&git).await?;
            if json {
                print_json(&summary)?;
            } else {
                print_summary(&summary);
            }
        }
        Commands::Run { subcommand, args } => {
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            let output = git.run_async(&subcommand, &GitOptions::new(), &args).await?;
            for line in &output.stdout {
                println!("{line}");
            }
            for line in &output.stderr {
                eprintln!("{line}");
            }
        }
    }

    Ok(())
}

async fn summarize(git: &Git) -> anyhow::Result<Summary> {
    let (status, log, version) = tokio::join!(
        git.status_async(&GitOptions::new().flag("branch", true)).wait(),
        git.log_async(&LogOptions::new().max_count(1)).wait(),
        git.version_async().wait(),
    );

    let status = status.context("Failed to read status")?;
    let version = version.context("Failed to read git version")?;
    let last_commit = match log {
        Ok(entries) => entries.into_iter().next(),
        Err(e) => {
            debug!("No last commit: {}", e);
            None
        }
    };

    Ok(Summary {
        version,
        branch: status.branch.clone(),
        dirty: status.is_dirty(),
        changes: status.len(),
        last_commit,
    })
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

fn print_status(status: &StatusCollection) {
    if status.is_empty() {
        println!("Working tree clean");
        return;
    }
    for entry in status.iter() {
        let path = match &entry.to {
            Some(to) => format!("{} -> {}", entry.from, to),
            None => entry.from.clone(),
        };
        println!(
            "{:<8} {:<2} {:<16} {}",
            entry.category.as_str(),
            entry.code,
            entry.description(),
            path
        );
    }
}

fn print_log(entries: &[LogEntry]) {
    for entry in entries {
        println!(
            "{} {} ({})",
            entry.id,
            entry.summary(),
            entry.author().unwrap_or("unknown author")
        );
        for modification in &entry.modifications {
            println!("    {} {}", modification.change_type, modification.path);
        }
    }
}

fn print_summary(summary: &Summary) {
    println!("git {}", summary.version);
    if let Some(branch) = &summary.branch {
        println!("branch: {branch}");
    }
    let state = if summary.dirty { "dirty" } else { "clean" };
    println!("working tree: {} ({} changes)", state, summary.changes);
    match &summary.last_commit {
        Some(commit) => println!("last commit: {} {}", commit.id, commit.summary()),
        None => println!("last commit: none"),
    }
}
