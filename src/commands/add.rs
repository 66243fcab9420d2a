//! # Add Command Implementation
//!
//! This module implements the `add` subcommand, which declares a repository
//! under a node and clones it unless its fetch policy is lazy.
//!
//! ## Functionality
//!
//! - **Name Derivation**: the node is named after the URL's last segment
//!   unless `--name` is given
//! - **Fetch Policy**: `--fetch auto` (the default) clones meta-repositories
//!   right away and leaves everything else lazy
//! - **Rollback**: when the initial clone fails, the declaration is removed
//!   again
//!
//! The declaration is written to the configuration fragment that defines the
//! parent's children.

use anyhow::Result;
use clap::Args;

use super::{explain_in, Context};
use muno::config::FetchPolicy;
use muno::output::emoji;

/// Add a repository to the tree
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Repository URL
    #[arg(value_name = "URL")]
    pub url: String,

    /// Node name. Defaults to the last segment of the URL without `.git`.
    #[arg(short, long)]
    pub name: Option<String>,

    /// When to clone: eager, lazy or auto
    #[arg(short, long, value_name = "POLICY", default_value = "auto")]
    pub fetch: FetchPolicy,

    /// Parent node. Defaults to the current node.
    #[arg(short, long, value_name = "PATH", default_value = ".")]
    pub parent: String,
}

/// Execute the `add` command.
pub fn execute(context: &Context, args: AddArgs) -> Result<()> {
    let manager = context.manager()?;
    let node = manager
        .add(&args.parent, &args.url, args.name.as_deref(), args.fetch)
        .map_err(|e| explain_in(&manager, e))?;

    let cloned = manager
        .navigator()
        .get_node_status(&node.path)
        .map(|status| status.cloned)
        .unwrap_or(false);
    println!(
        "{} Added {} ({}){}",
        emoji(&context.output, "✅", "[OK]"),
        node.path,
        args.url,
        if cloned { ", cloned" } else { ", lazy" }
    );
    Ok(())
}
