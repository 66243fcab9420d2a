//! # Sync Command Implementation
//!
//! Resolves the whole workspace the way a fresh checkout needs it: eager
//! repositories (meta-repositories by default) that are missing from disk
//! are cloned, and configuration discovered inside them is expanded in the
//! same pass. Lazy repositories are left alone.

use anyhow::Result;
use clap::Args;

use super::Context;
use muno::output::emoji;
use muno::resolver::ResolvedNode;

/// Clone eager repositories and expand the configuration they carry
#[derive(Args, Debug)]
pub struct SyncArgs {}

/// Repository paths of a resolved tree, grouped by outcome.
#[derive(Debug, Default, PartialEq, Eq)]
struct SyncSummary {
    on_disk: Vec<String>,
    lazy: Vec<String>,
    missing: Vec<String>,
}

fn summarize(tree: &ResolvedNode) -> SyncSummary {
    let mut summary = SyncSummary::default();
    for node in tree.walk().into_iter().filter(|n| n.is_repository()) {
        let bucket = if node.cloned {
            &mut summary.on_disk
        } else if node.is_lazy() {
            &mut summary.lazy
        } else {
            &mut summary.missing
        };
        bucket.push(node.path.clone());
    }
    summary
}

/// Execute the `sync` command.
pub fn execute(context: &Context, _args: SyncArgs) -> Result<()> {
    let manager = context.manager()?;
    let tree = manager.resolve_workspace()?;
    let summary = summarize(&tree);

    for path in &summary.missing {
        eprintln!(
            "{} {} could not be cloned",
            emoji(&context.output, "❌", "[FAIL]"),
            path
        );
    }
    println!(
        "{} repositories on disk, {} lazy",
        summary.on_disk.len(),
        summary.lazy.len()
    );

    if summary.missing.is_empty() {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "{} eager repositories are missing\n\n\
             hint: Check the URLs and re-run 'muno sync'; finished clones are kept",
            summary.missing.len()
        ))
    }
}
