//! # Remove Command Implementation
//!
//! Removes a node declaration from the fragment that declares it. Any clone
//! already on disk is left in place.

use anyhow::Result;
use clap::Args;

use super::{explain_in, Context};
use muno::output::emoji;

/// Remove a node from the tree
#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Name of the child to remove
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Parent node. Defaults to the current node.
    #[arg(short, long, value_name = "PATH", default_value = ".")]
    pub parent: String,
}

/// Execute the `remove` command.
pub fn execute(context: &Context, args: RemoveArgs) -> Result<()> {
    let manager = context.manager()?;
    manager
        .remove(&args.parent, &args.name)
        .map_err(|e| explain_in(&manager, e))?;

    println!(
        "{} Removed {} from {}",
        emoji(&context.output, "🗑️", "[OK]"),
        args.name,
        args.parent
    );
    Ok(())
}
