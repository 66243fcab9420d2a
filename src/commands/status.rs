//! # Status Command Implementation
//!
//! Shows the state of the repositories at and directly below a node, or in
//! its whole subtree with `--recursive`. Statuses are derived fresh from
//! the checkouts on every run.

use anyhow::Result;
use clap::Args;

use super::{explain_in, Context};
use muno::output::{emoji, state_label};

/// Show the status of repositories
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Node to inspect. Defaults to the current node.
    #[arg(value_name = "PATH", default_value = ".")]
    pub path: String,

    /// Include the whole subtree
    #[arg(short, long)]
    pub recursive: bool,
}

/// Execute the `status` command.
pub fn execute(context: &Context, args: StatusArgs) -> Result<()> {
    let manager = context.manager()?;
    let statuses = manager
        .status(&args.path, args.recursive)
        .map_err(|e| explain_in(&manager, e))?;

    if statuses.is_empty() {
        println!("No repositories under {}", args.path);
        return Ok(());
    }

    let width = statuses.iter().map(|(p, _)| p.len()).max().unwrap_or(0);
    for (path, status) in &statuses {
        let mut line = format!(
            "{:<width$}  {}",
            path,
            state_label(&context.output, status.state),
            width = width
        );
        if let Some(branch) = &status.branch {
            line.push_str(&format!("  {}", branch));
        }
        if status.lazy && !status.cloned {
            line.push_str("  (lazy)");
        }
        if let Some(error) = &status.error {
            line.push_str(&format!(
                "  {} {}",
                emoji(&context.output, "⚠️", "!"),
                error
            ));
        }
        println!("{}", line);
    }
    Ok(())
}
