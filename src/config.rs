//! Wrapper configuration
//!
//! ```toml
//! git_binary = "/usr/local/bin/git"
//!
//! [env]
//! GIT_TERMINAL_PROMPT = "0"
//! ```

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Executable to launch, looked up on PATH when not absolute
    pub git_binary: String,
    /// Extra variables for every child process. `GIT_EDITOR` is always
    /// forced empty regardless of what is set here.
    pub env: BTreeMap<String, String>,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            git_binary: "git".to_string(),
            env: BTreeMap::new(),
        }
    }
}

impl GitConfig {
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            git_binary: binary.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, path)
    }

    /// `config.toml` under the platform config directory
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "git-promise").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load an explicit file, else the default file if present, else defaults
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match Self::default_path() {
            Some(path) if path.is_file() => {
                tracing::debug!("Loading config from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}
