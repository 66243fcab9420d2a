//! # Use and Current Command Implementations
//!
//! `use` moves the current position in the tree, cloning the target first
//! when it is a repository not yet on disk. `current` prints the position.
//! The position is stored in the workspace's `.muno-current` file, so it
//! carries over between invocations.

use anyhow::Result;
use clap::Args;

use super::{explain, explain_in, Context};
use muno::output::emoji;

/// Move to a node, cloning it first if needed
#[derive(Args, Debug)]
pub struct UseArgs {
    /// Logical path, absolute (`/a/b`) or relative to the current node (`b`, `..`)
    #[arg(value_name = "PATH")]
    pub path: String,
}

/// Execute the `use` command.
pub fn execute(context: &Context, args: UseArgs) -> Result<()> {
    let manager = context.manager()?;
    let target = manager
        .use_path(&args.path)
        .map_err(|e| explain_in(&manager, e))?;
    let fs_path = manager
        .workspace_root()
        .map(|root| muno::path::PathResolver::for_workspace(root).compute_filesystem_path(&target));

    println!("{} {}", emoji(&context.output, "📍", "->"), target);
    if let Some(fs_path) = fs_path {
        println!("   {}", fs_path.display());
    }
    Ok(())
}

/// Execute the `current` command.
pub fn current(context: &Context) -> Result<()> {
    let manager = context.manager()?;
    println!("{}", manager.current().map_err(explain)?);
    Ok(())
}
