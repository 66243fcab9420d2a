//! CLI argument parsing and command dispatch

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands::{self, Context};
use muno::defaults::{DEFAULT_CACHE_CAPACITY, WORKSPACE_ENV};
use muno::navigator::CacheSettings;
use muno::output::OutputConfig;

/// Muno - Navigate a tree of git repositories, cloning them as you go
#[derive(Parser, Debug)]
#[command(name = "muno")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Workspace root. Defaults to the nearest directory at or above the
    /// current one containing a muno.yaml.
    #[arg(long, global = true, value_name = "DIR", env = WORKSPACE_ENV)]
    workspace: Option<PathBuf>,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace). RUST_LOG takes
    /// precedence when set.
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,

    /// Seconds navigator reads stay cached within one invocation
    #[arg(long, global = true, value_name = "SECS", default_value_t = 30)]
    cache_ttl_secs: u64,

    /// Disable the navigator cache
    #[arg(long, global = true)]
    no_cache: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new workspace
    Init(commands::init::InitArgs),

    /// Move to a node, cloning it first if needed
    Use(commands::navigate::UseArgs),

    /// Print the current logical path
    Current,

    /// List the children of a node
    List(commands::list::ListArgs),

    /// Display the workspace tree
    Tree(commands::tree::TreeArgs),

    /// Show the status of repositories
    Status(commands::status::StatusArgs),

    /// Add a repository to the tree
    Add(commands::add::AddArgs),

    /// Remove a node from the tree
    Remove(commands::remove::RemoveArgs),

    /// Clone repositories in bulk
    Clone(commands::clone::CloneArgs),

    /// Clone eager repositories and expand the configuration they carry
    Sync(commands::sync::SyncArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        let cache = (!self.no_cache).then(|| CacheSettings {
            ttl: Duration::from_secs(self.cache_ttl_secs),
            capacity: DEFAULT_CACHE_CAPACITY,
            sweep_interval: None,
        });
        let context = Context {
            workspace: self.workspace,
            output: OutputConfig::from_env_and_flag(&self.color),
            cache,
        };

        match self.command {
            Commands::Init(args) => commands::init::execute(&context, args),
            Commands::Use(args) => commands::navigate::execute(&context, args),
            Commands::Current => commands::navigate::current(&context),
            Commands::List(args) => commands::list::execute(&context, args),
            Commands::Tree(args) => commands::tree::execute(&context, args),
            Commands::Status(args) => commands::status::execute(&context, args),
            Commands::Add(args) => commands::add::execute(&context, args),
            Commands::Remove(args) => commands::remove::execute(&context, args),
            Commands::Clone(args) => commands::clone::execute(&context, args),
            Commands::Sync(args) => commands::sync::execute(&context, args),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

/// Initialise `env_logger` at `level`, unless `RUST_LOG` says otherwise.
fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "muno",
            "tree",
            "--depth",
            "2",
            "--no-cache",
            "--workspace",
            "/tmp/ws",
        ])
        .unwrap();
        assert!(cli.no_cache);
        assert_eq!(cli.workspace, Some(PathBuf::from("/tmp/ws")));
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn test_use_requires_path() {
        assert!(Cli::try_parse_from(["muno", "use"]).is_err());
    }
}
