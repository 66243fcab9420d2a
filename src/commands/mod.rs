//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the `muno`
//! command-line tool. Each subcommand is defined in its own file to keep the
//! logic separated and maintainable.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the shared [`Context`] and the parsed
//!   `Args` and performs the command's logic.
//!
//! Commands open the workspace through [`Context::manager`] and leave the
//! actual work to `muno::manager::TreeManager`.

pub mod add;
pub mod clone;
pub mod completions;
pub mod init;
pub mod list;
pub mod navigate;
pub mod remove;
pub mod status;
pub mod sync;
pub mod tree;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};

use muno::config;
use muno::error::Error;
use muno::manager::TreeManager;
use muno::navigator::CacheSettings;
use muno::output::OutputConfig;
use muno::suggestions;
use muno::vcs::GitClient;

/// Settings shared by every command, taken from the global flags.
#[derive(Debug, Clone)]
pub struct Context {
    pub workspace: Option<PathBuf>,
    pub output: OutputConfig,
    pub cache: Option<CacheSettings>,
}

impl Context {
    /// The workspace root: `--workspace` when given, otherwise the nearest
    /// directory at or above the current one holding a configuration.
    pub fn workspace_root(&self) -> Result<PathBuf> {
        if let Some(root) = &self.workspace {
            if config::find_config_in(root).is_none() {
                return Err(suggestions::workspace_not_found(root));
            }
            return Ok(root.clone());
        }
        let cwd = env::current_dir().context("Failed to read the current directory")?;
        config::find_workspace_root(&cwd).ok_or_else(|| suggestions::workspace_not_found(&cwd))
    }

    /// Open the workspace with the system git client.
    pub fn manager(&self) -> Result<TreeManager> {
        let root = self.workspace_root()?;
        TreeManager::open(root, Arc::new(GitClient::new()), self.cache.clone()).map_err(explain)
    }
}

/// Library error to a user-facing error with hints.
pub fn explain(error: Error) -> anyhow::Error {
    suggestions::explain(error)
}

/// Like [`explain`], suggesting siblings of a missing node.
pub fn explain_in(manager: &TreeManager, error: Error) -> anyhow::Error {
    match error {
        Error::NodeNotFound { path } => {
            let siblings = muno::path::parent(&path)
                .and_then(|parent| manager.list(&parent).ok())
                .map(|nodes| nodes.into_iter().map(|n| n.name).collect::<Vec<_>>())
                .unwrap_or_default();
            suggestions::node_not_found(&path, &siblings)
        }
        other => explain(other),
    }
}
