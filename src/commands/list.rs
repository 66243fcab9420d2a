//! # List Command Implementation
//!
//! Lists the direct children of a node with their repository state. This
//! command is read-only: it never clones.

use anyhow::Result;
use clap::Args;

use super::{explain_in, Context};
use muno::output::node_label;

/// List the children of a node
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Node to list. Defaults to the current node.
    #[arg(value_name = "PATH", default_value = ".")]
    pub path: String,
}

/// Execute the `list` command.
pub fn execute(context: &Context, args: ListArgs) -> Result<()> {
    let manager = context.manager()?;
    let view = manager
        .tree(&args.path, Some(1))
        .map_err(|e| explain_in(&manager, e))?;

    let children = view.children_of(&view.root);
    if children.is_empty() {
        println!("(no children)");
        return Ok(());
    }
    for child in children {
        println!(
            "{}",
            node_label(&context.output, child, view.status(&child.path))
        );
    }
    Ok(())
}
