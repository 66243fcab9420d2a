//! # Tree Manager
//!
//! Orchestration exposed to the CLI. A [`TreeManager`] composes a
//! [`Navigator`] (usually a filesystem navigator, optionally behind a cache)
//! with the [`VersionControlClient`] used to materialise repositories.
//!
//! Operations that change more than one thing are all-or-nothing from the
//! caller's point of view: [`TreeManager::add`] removes the node again when
//! its initial clone fails. Bulk cloning is the exception and reports
//! per-node failures instead of stopping at the first one.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::{self, ConfigFragment, FetchPolicy, NodeDefinition};
use crate::defaults::{DEFAULT_CONFIG_FILENAME, DEFAULT_REPOS_DIR};
use crate::error::{Error, Result};
use crate::navigator::{CacheSettings, CachedNavigator, FilesystemNavigator, Navigator};
use crate::node::{Node, NodeStatus, TreeView};
use crate::resolver::{effective_fetch_policy, ConfigResolver, ResolvedNode};
use crate::vcs::VersionControlClient;

/// Outcome of a bulk clone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneReport {
    /// Paths cloned by this call.
    pub cloned: Vec<String>,
    /// Lazy repositories left alone.
    pub skipped: Vec<String>,
    /// Paths whose clone failed, with the error message.
    pub failed: Vec<(String, String)>,
}

impl CloneReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

struct Workspace {
    root: PathBuf,
    client: Arc<dyn VersionControlClient>,
}

/// High-level operations over a workspace tree.
pub struct TreeManager {
    navigator: Arc<dyn Navigator>,
    workspace: Option<Workspace>,
}

impl TreeManager {
    /// Open the workspace at `workspace_root`, caching reads when `cache` is
    /// given.
    pub fn open(
        workspace_root: impl Into<PathBuf>,
        client: Arc<dyn VersionControlClient>,
        cache: Option<CacheSettings>,
    ) -> Result<Self> {
        let root = workspace_root.into();
        let filesystem: Arc<dyn Navigator> =
            Arc::new(FilesystemNavigator::new(&root, Arc::clone(&client))?);
        let navigator: Arc<dyn Navigator> = match cache {
            Some(settings) => Arc::new(CachedNavigator::new(filesystem, settings)),
            None => filesystem,
        };
        debug!("Opened tree manager for {}", root.display());
        Ok(Self {
            navigator,
            workspace: Some(Workspace { root, client }),
        })
    }

    /// A manager over an arbitrary navigator, with no workspace directory
    /// attached.
    pub fn with_navigator(navigator: Arc<dyn Navigator>) -> Self {
        Self {
            navigator,
            workspace: None,
        }
    }

    /// Create a new workspace in `root`: a starter configuration and the
    /// repositories directory. Refuses to overwrite an existing configuration.
    pub fn init_workspace(root: &Path, name: &str) -> Result<PathBuf> {
        if let Some(existing) = config::find_config_in(root) {
            return Err(Error::ConfigLoad {
                path: existing,
                message: "a workspace configuration already exists".to_string(),
            });
        }

        let config_path = root.join(DEFAULT_CONFIG_FILENAME);
        config::to_file(&config_path, &ConfigFragment::new_workspace(name))?;
        fs::create_dir_all(root.join(DEFAULT_REPOS_DIR))?;
        info!("Initialised workspace '{}' in {}", name, root.display());
        Ok(config_path)
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    pub fn workspace_root(&self) -> Option<&Path> {
        self.workspace.as_ref().map(|ws| ws.root.as_path())
    }

    pub fn current(&self) -> Result<String> {
        self.navigator.current_path()
    }

    /// Navigate to `path`, cloning it on the way if needed.
    pub fn use_path(&self, path: &str) -> Result<String> {
        self.navigator.navigate(path)
    }

    pub fn list(&self, path: &str) -> Result<Vec<Node>> {
        self.navigator.list_children(path)
    }

    pub fn tree(&self, path: &str, depth: Option<usize>) -> Result<TreeView> {
        self.navigator.get_tree(path, depth)
    }

    /// Statuses of the repositories at `path` and its direct children, or
    /// the whole subtree when `recursive`. Sorted by path.
    pub fn status(&self, path: &str, recursive: bool) -> Result<Vec<(String, NodeStatus)>> {
        let depth = if recursive { None } else { Some(1) };
        let view = self.navigator.get_tree(path, depth)?;
        Ok(view.statuses.into_iter().collect())
    }

    /// Add a repository under `parent`, named after the URL unless `name` is
    /// given, and clone it unless its effective policy is lazy.
    pub fn add(
        &self,
        parent: &str,
        url: &str,
        name: Option<&str>,
        fetch: FetchPolicy,
    ) -> Result<Node> {
        let name = match name {
            Some(name) => name.to_string(),
            None => derive_name(url)?,
        };
        let definition = NodeDefinition::repository(&name, url).with_fetch(fetch);
        let eager = effective_fetch_policy(&definition) == FetchPolicy::Eager;

        let node = self.navigator.add_child(parent, definition)?;
        if eager {
            if let Err(e) = self.navigator.trigger_lazy_load(&node.path) {
                warn!("Clone of {} failed, removing it again", node.path);
                if let Err(rollback) = self.navigator.remove_child(parent, &name) {
                    warn!("Could not roll back {}: {}", node.path, rollback);
                }
                return Err(e);
            }
        }
        Ok(node)
    }

    /// Remove `name` from `parent`. Files on disk are left in place.
    pub fn remove(&self, parent: &str, name: &str) -> Result<()> {
        self.navigator.remove_child(parent, name)
    }

    pub fn clone_subtree(
        &self,
        path: &str,
        recursive: bool,
        include_lazy: bool,
    ) -> Result<CloneReport> {
        self.clone_subtree_with(path, recursive, include_lazy, |_| {})
    }

    /// Clone the repositories at `path` and its direct children, or the
    /// whole subtree when `recursive`. Lazy repositories are only cloned
    /// with `include_lazy`. Children revealed by a clone are visited too.
    ///
    /// `on_visit` is called with each repository path before it is handled.
    pub fn clone_subtree_with<F>(
        &self,
        path: &str,
        recursive: bool,
        include_lazy: bool,
        mut on_visit: F,
    ) -> Result<CloneReport>
    where
        F: FnMut(&str),
    {
        let start = self
            .navigator
            .get_node(path)?
            .ok_or_else(|| Error::NodeNotFound {
                path: path.to_string(),
            })?;

        let mut report = CloneReport::default();
        let mut queue = VecDeque::from([(start, 0usize)]);
        while let Some((node, level)) = queue.pop_front() {
            if node.is_repository() {
                on_visit(&node.path);
                let status = self.navigator.get_node_status(&node.path)?;
                if status.needs_clone() {
                    if status.lazy && !include_lazy {
                        debug!("Skipping lazy repository {}", node.path);
                        report.skipped.push(node.path.clone());
                        continue;
                    }
                    match self.navigator.trigger_lazy_load(&node.path) {
                        Ok(()) => report.cloned.push(node.path.clone()),
                        Err(e) => {
                            warn!("Failed to clone {}: {}", node.path, e);
                            report.failed.push((node.path.clone(), e.to_string()));
                            continue;
                        }
                    }
                }
            }

            if recursive || level == 0 {
                for child in self.navigator.list_children(&node.path)? {
                    queue.push_back((child, level + 1));
                }
            }
        }

        info!(
            "Cloned {}, skipped {}, failed {} under {}",
            report.cloned.len(),
            report.skipped.len(),
            report.failed.len(),
            path
        );
        Ok(report)
    }

    /// Resolve the whole workspace, cloning eager repositories that are not
    /// on disk yet.
    pub fn resolve_workspace(&self) -> Result<ResolvedNode> {
        let workspace = self.workspace.as_ref().ok_or_else(|| Error::ConfigLoad {
            path: PathBuf::new(),
            message: "no workspace directory is attached".to_string(),
        })?;
        let resolver = ConfigResolver::new(&workspace.root);
        let tree = resolver.resolve_tree(Some(workspace.client.as_ref()))?;
        // Eager clones happened outside the navigator.
        self.navigator.refresh_status("/")?;
        Ok(tree)
    }
}

/// Node name for a repository URL: its last path segment without `.git`.
///
/// Handles URLs (`https://host/org/repo.git`), scp-like addresses
/// (`git@host:org/repo.git`) and local paths.
pub fn derive_name(url: &str) -> Result<String> {
    let trimmed = url.trim();
    let path = match url::Url::parse(trimmed) {
        Ok(parsed) if parsed.has_host() || parsed.scheme() == "file" => parsed.path().to_string(),
        _ => trimmed.to_string(),
    };

    let name = path
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()
        .unwrap_or_default()
        .trim_end_matches(".git")
        .to_string();

    config::validate_name(&name).map_err(|_| Error::InvalidNodeDefinition {
        name: url.to_string(),
        message: "cannot derive a node name from this url; pass one explicitly".to_string(),
    })?;
    Ok(name)
}
