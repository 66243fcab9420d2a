//! # Tree Navigation
//!
//! One contract, three implementations:
//!
//! - [`FilesystemNavigator`]: the source of truth. Every query is re-derived
//!   from configuration fragments and the filesystem; only the current
//!   logical path is persisted, in a marker file.
//! - [`MemoryNavigator`]: map-backed and deterministic, with direct node and
//!   status injection. Used by tests and dry runs.
//! - [`CachedNavigator`]: a TTL cache wrapping any other navigator, which
//!   invalidates affected entries before delegating every mutation.
//!
//! ## Paths
//!
//! Every operation accepts absolute logical paths (`/a/b`) or paths relative
//! to the current path (`b`, `../c`).
//!
//! ## Reads and absence
//!
//! Reads never mutate. `get_node` returns `Ok(None)` when the parent exists
//! but declares no such child, and `NodeNotFound` when an ancestor cannot be
//! resolved. `list_children`, `get_tree` and the status operations require
//! the target itself to exist.

mod cached;
mod filesystem;
mod memory;

pub use cached::{CacheSettings, CacheStats, CachedNavigator};
pub use filesystem::FilesystemNavigator;
pub use memory::MemoryNavigator;

use crate::config::NodeDefinition;
use crate::error::Result;
use crate::node::{Node, NodeStatus, TreeView};

/// Operations over the logical tree.
pub trait Navigator: Send + Sync {
    /// The current logical path.
    fn current_path(&self) -> Result<String>;

    /// Move to `path`, cloning it first if it is a repository not yet on
    /// disk. On failure the current path is unchanged. Returns the new
    /// absolute path.
    fn navigate(&self, path: &str) -> Result<String>;

    fn get_node(&self, path: &str) -> Result<Option<Node>>;

    fn list_children(&self, path: &str) -> Result<Vec<Node>>;

    /// Snapshot of the subtree at `path`. `depth` of `None` is unlimited,
    /// `Some(0)` is the node alone.
    fn get_tree(&self, path: &str, depth: Option<usize>) -> Result<TreeView>;

    /// Status of a repository node; `NotARepository` for anything else.
    fn get_node_status(&self, path: &str) -> Result<NodeStatus>;

    /// Bring any stored state for `path` up to date.
    fn refresh_status(&self, path: &str) -> Result<()>;

    /// Whether `path` is a lazy repository that has not been cloned.
    /// Non-repository nodes are never lazy.
    fn is_lazy(&self, path: &str) -> Result<bool>;

    /// Clone the repository at `path`. A no-op when already cloned.
    fn trigger_lazy_load(&self, path: &str) -> Result<()>;

    /// Declare a new child under `parent`. Returns the new node.
    fn add_child(&self, parent: &str, definition: NodeDefinition) -> Result<Node>;

    /// Remove the child `name` declared under `parent`.
    fn remove_child(&self, parent: &str, name: &str) -> Result<()>;
}
