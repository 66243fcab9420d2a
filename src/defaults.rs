//! Default values for muno configuration.
//!
//! This module centralizes the fixed names and tunables used across the
//! library and the CLI so the resolver, the path resolver and the commands
//! always agree on them.

use std::time::Duration;

/// Configuration filenames probed, in order, when looking for a fragment in a
/// directory. The first existing file wins.
pub const CONFIG_CANDIDATES: [&str; 4] = ["muno.yaml", ".muno.yaml", "muno.yml", ".muno.yml"];

/// Filename written by `muno init`.
pub const DEFAULT_CONFIG_FILENAME: &str = CONFIG_CANDIDATES[0];

/// Directory, relative to a node, under which its children are placed when no
/// configuration overrides it.
pub const DEFAULT_REPOS_DIR: &str = "repos";

/// File in the workspace root holding the last navigated logical path.
pub const CURRENT_PATH_MARKER: &str = ".muno-current";

/// Name suffixes marking a meta-repository. Matched case-insensitively.
pub const META_REPO_SUFFIXES: [&str; 7] = [
    "-monorepo",
    "-munorepo",
    "-muno",
    "-metarepo",
    "-platform",
    "-workspace",
    "-root-repo",
];

/// Time-to-live for entries of the cached navigator.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

/// Maximum number of entries held by the cached navigator.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Environment variable overriding workspace discovery.
pub const WORKSPACE_ENV: &str = "MUNO_WORKSPACE";
