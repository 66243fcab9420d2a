//! # Tree Command Implementation
//!
//! This module implements the `tree` subcommand, which displays the logical
//! tree below a node, either rendered with `ptree` or as JSON.
//!
//! ## Functionality
//!
//! - **Depth Control**: `--depth` limits how far below the node to go
//! - **Status Display**: each repository shows its state, lazy flag and branch
//! - **JSON Output**: `--format json` prints the full snapshot for scripting
//!
//! This command is read-only: it never clones.

use anyhow::Result;
use clap::{Args, ValueEnum};
use ptree::{print_tree, TreeItem};
use std::borrow::Cow;

use super::{explain_in, Context};
use muno::node::TreeView;
use muno::output::{node_label, OutputConfig};

/// Output format for the tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum TreeFormat {
    #[default]
    Text,
    Json,
}

/// Display the workspace tree
#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Node to start from. Defaults to the workspace root.
    #[arg(value_name = "PATH", default_value = "/")]
    pub path: String,

    /// Maximum depth to display. 0 shows only the starting node.
    #[arg(long, value_name = "NUM")]
    pub depth: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value_t = TreeFormat::Text)]
    pub format: TreeFormat,
}

/// Execute the `tree` command.
pub fn execute(context: &Context, args: TreeArgs) -> Result<()> {
    let manager = context.manager()?;
    let view = manager
        .tree(&args.path, args.depth)
        .map_err(|e| explain_in(&manager, e))?;

    match args.format {
        TreeFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
        TreeFormat::Text => {
            let root = build_tree_node(&context.output, &view, &view.root);
            print_tree(&root).map_err(|e| anyhow::anyhow!("Failed to display tree: {}", e))?;
        }
    }
    Ok(())
}

/// Build the display node for `path` and its descendants within `view`.
fn build_tree_node(output: &OutputConfig, view: &TreeView, path: &str) -> TreeNode {
    let label = match view.node(path) {
        Some(node) => node_label(output, node, view.status(path)),
        None => path.to_string(),
    };
    let children = view
        .children_of(path)
        .into_iter()
        .map(|child| build_tree_node(output, view, &child.path))
        .collect();
    TreeNode { label, children }
}

/// Tree node structure for ptree visualization
#[derive(Clone)]
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl TreeItem for TreeNode {
    type Child = TreeNode;

    fn write_self<W: std::io::Write>(
        &self,
        f: &mut W,
        _style: &ptree::Style,
    ) -> std::io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> Cow<'_, [Self::Child]> {
        Cow::Borrowed(&self.children)
    }
}
