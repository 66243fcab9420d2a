//! # Clone Command Implementation
//!
//! Materialises repositories in bulk: the node and its direct children, or
//! its whole subtree with `--recursive`. Lazy repositories are skipped unless
//! `--include-lazy` is given. Failures are collected and reported at the end
//! rather than stopping the run.

use anyhow::Result;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use super::{explain_in, Context};
use muno::output::emoji;

/// Clone repositories in bulk
#[derive(Args, Debug)]
pub struct CloneArgs {
    /// Node to start from. Defaults to the current node.
    #[arg(value_name = "PATH", default_value = ".")]
    pub path: String,

    /// Descend into the whole subtree, including children revealed by clones
    #[arg(short, long)]
    pub recursive: bool,

    /// Clone lazy repositories too
    #[arg(long)]
    pub include_lazy: bool,
}

/// Execute the `clone` command.
pub fn execute(context: &Context, args: CloneArgs) -> Result<()> {
    let manager = context.manager()?;

    let spinner = if context.output.use_color {
        ProgressBar::new_spinner()
    } else {
        ProgressBar::hidden()
    };
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));

    let report = manager
        .clone_subtree_with(&args.path, args.recursive, args.include_lazy, |path| {
            spinner.set_message(format!("checking {}", path));
        })
        .map_err(|e| explain_in(&manager, e));
    spinner.finish_and_clear();
    let report = report?;

    for path in &report.cloned {
        println!("{} cloned {}", emoji(&context.output, "✅", "[OK]"), path);
    }
    for path in &report.skipped {
        println!("{} skipped {} (lazy)", emoji(&context.output, "⏭️", "[SKIP]"), path);
    }
    for (path, message) in &report.failed {
        eprintln!(
            "{} failed {}: {}",
            emoji(&context.output, "❌", "[FAIL]"),
            path,
            message
        );
    }

    if report.is_success() {
        println!(
            "Cloned {} repositories, skipped {}",
            report.cloned.len(),
            report.skipped.len()
        );
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "{} of {} repositories failed to clone\n\n\
             hint: Re-run 'muno clone' once the failures are fixed; finished clones are kept",
            report.failed.len(),
            report.failed.len() + report.cloned.len()
        ))
    }
}
