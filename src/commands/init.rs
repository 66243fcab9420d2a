//! # Init Command Implementation
//!
//! This module implements the `init` subcommand, which creates a new workspace:
//! a starter `muno.yaml` and the directory top-level repositories are cloned
//! into. An existing workspace configuration is never overwritten.

use anyhow::{Context as _, Result};
use clap::Args;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::{explain, Context};
use muno::manager::TreeManager;
use muno::output::emoji;

/// Create a new workspace
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to initialise. Defaults to --workspace, then the current
    /// directory.
    #[arg(value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Workspace name. Defaults to the directory name.
    #[arg(short, long)]
    pub name: Option<String>,
}

/// Execute the `init` command.
pub fn execute(context: &Context, args: InitArgs) -> Result<()> {
    let dir = match args.dir.or_else(|| context.workspace.clone()) {
        Some(dir) => dir,
        None => env::current_dir().context("Failed to read the current directory")?,
    };
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    let name = args.name.unwrap_or_else(|| default_name(&dir));
    let config_path = TreeManager::init_workspace(&dir, &name).map_err(explain)?;

    println!(
        "{} Initialised workspace '{}' in {}",
        emoji(&context.output, "✅", "[OK]"),
        name,
        config_path.display()
    );
    println!(
        "{} Run `muno add <url>` to add repositories",
        emoji(&context.output, "💡", "[HINT]")
    );
    Ok(())
}

fn default_name(dir: &Path) -> String {
    dir.canonicalize()
        .ok()
        .as_deref()
        .unwrap_or(dir)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workspace".to_string())
}
