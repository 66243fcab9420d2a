//! Filesystem-backed navigator.
//!
//! Nothing but the current logical path is stored: every answer is derived
//! again from the configuration fragments (through the [`ConfigResolver`])
//! and from what is on disk, trading repeated scans for never serving a
//! stale persisted state.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};

use super::Navigator;
use crate::config::{self, ConfigFragment, NodeDefinition};
use crate::defaults::{CURRENT_PATH_MARKER, DEFAULT_CONFIG_FILENAME};
use crate::error::{Error, Result};
use crate::node::{Node, NodeKind, NodeStatus, RepoState, TreeView};
use crate::path::{self, PathResolver};
use crate::resolver::{classify, ConfigResolver, ExpansionStack, Located, ResolvedNode};
use crate::vcs::{self, VersionControlClient};

/// The authoritative navigator over a workspace directory.
pub struct FilesystemNavigator {
    resolver: ConfigResolver,
    client: Arc<dyn VersionControlClient>,
    current: Mutex<String>,
    marker: PathBuf,
}

impl FilesystemNavigator {
    /// Open the workspace at `workspace_root`.
    ///
    /// Fails when the workspace has no configuration file. The current path
    /// is read from the marker file; a missing or unusable marker means root.
    pub fn new(
        workspace_root: impl Into<PathBuf>,
        client: Arc<dyn VersionControlClient>,
    ) -> Result<Self> {
        let workspace_root = workspace_root.into();
        let resolver = ConfigResolver::new(&workspace_root);
        resolver.root_config_path()?;

        let marker = workspace_root.join(CURRENT_PATH_MARKER);
        let current = read_marker(&marker);
        debug!("Opened workspace {} at {}", workspace_root.display(), current);

        Ok(Self {
            resolver,
            client,
            current: Mutex::new(current),
            marker,
        })
    }

    pub fn workspace_root(&self) -> &Path {
        self.resolver.workspace_root()
    }

    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    /// Path resolver for this workspace, reflecting the configuration
    /// currently on disk.
    pub fn path_resolver(&self) -> PathResolver {
        PathResolver::for_workspace(self.workspace_root())
    }

    /// Filesystem location of an existing node.
    pub fn filesystem_path(&self, path: &str) -> Result<PathBuf> {
        let target = self.absolute(path)?;
        Ok(self.locate_existing(&target)?.node.dir)
    }

    fn absolute(&self, path: &str) -> Result<String> {
        Ok(path::resolve(&self.current_path()?, path))
    }

    fn locate_existing(&self, target: &str) -> Result<Located> {
        self.resolver
            .locate(target)?
            .ok_or_else(|| Error::NodeNotFound {
                path: target.to_string(),
            })
    }

    fn child_names(&self, node: &ResolvedNode, stack: &ExpansionStack) -> Result<Vec<String>> {
        Ok(self
            .resolver
            .expand_children(node, stack, None)?
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    fn collect(
        &self,
        node: &ResolvedNode,
        stack: &mut ExpansionStack,
        remaining: Option<usize>,
        view: &mut TreeView,
    ) -> Result<()> {
        let children = self.resolver.expand_children(node, stack, None)?;
        view.nodes.insert(
            node.path.clone(),
            node.to_node(children.iter().map(|c| c.name.clone()).collect()),
        );
        if node.is_repository() {
            view.statuses
                .insert(node.path.clone(), self.derive_status(node));
        }

        if remaining == Some(0) {
            return Ok(());
        }

        let pushed = stack.enter(node);
        let result = children
            .iter()
            .try_for_each(|child| self.collect(child, stack, remaining.map(|d| d - 1), view));
        stack.leave(pushed);
        result
    }

    /// Status of a repository node, probed fresh from disk and the client.
    fn derive_status(&self, node: &ResolvedNode) -> NodeStatus {
        let lazy = node.is_lazy();
        let exists = node.dir.exists();
        if !vcs::is_cloned(&node.dir) {
            return NodeStatus {
                exists,
                remote_url: node.url.clone(),
                ..NodeStatus::missing(lazy)
            };
        }

        let mut error: Option<String> = None;
        let mut record = |aspect: &str, e: Error| {
            warn!("Could not determine {} of {}: {}", aspect, node.path, e);
            error.get_or_insert_with(|| format!("{}: {}", aspect, e));
        };

        let branch = match self.client.current_branch(&node.dir) {
            Ok(branch) => Some(branch),
            Err(e) => {
                record("branch", e);
                None
            }
        };
        let remote_url = match self.client.remote_url(&node.dir) {
            Ok(url) => Some(url),
            Err(e) => {
                record("remote url", e);
                node.url.clone()
            }
        };
        let modified = match self.client.has_local_changes(&node.dir) {
            Ok(modified) => modified,
            Err(e) => {
                record("local changes", e);
                false
            }
        };
        let (ahead, behind) = self.client.ahead_behind(&node.dir).unwrap_or_else(|e| {
            debug!("No upstream comparison for {}: {}", node.path, e);
            (0, 0)
        });

        NodeStatus {
            exists,
            cloned: true,
            state: RepoState::derive(true, modified, ahead, behind),
            lazy,
            branch,
            remote_url,
            last_check: std::time::SystemTime::now(),
            error,
        }
    }

    fn clone_node(&self, node: &ResolvedNode) -> Result<()> {
        let url = node.url.clone().unwrap_or_default();
        info!("Cloning {} from {}", node.path, url);
        self.client
            .clone_repository(&url, &node.dir)
            .map_err(|e| Error::CloneFailure {
                path: node.path.clone(),
                url: url.clone(),
                message: match e {
                    Error::CloneFailure { message, .. } => message,
                    other => other.to_string(),
                },
            })
    }

    /// Fragment file declaring the children of `located`.
    ///
    /// Repositories and plain directories get a `muno.yaml` in their own
    /// directory when they do not carry one yet.
    fn declaring_fragment(&self, located: &Located) -> Result<PathBuf> {
        let node = &located.node;
        match node.kind {
            NodeKind::Root | NodeKind::ConfigReference => node
                .fragment
                .as_ref()
                .map(|source| source.path.clone())
                .ok_or_else(|| Error::NodeNotFound {
                    path: node.path.clone(),
                }),
            NodeKind::Repository if !node.cloned => Err(Error::NotCloned {
                path: node.path.clone(),
            }),
            NodeKind::Repository | NodeKind::Directory => Ok(node
                .fragment
                .as_ref()
                .map(|source| source.path.clone())
                .unwrap_or_else(|| node.dir.join(DEFAULT_CONFIG_FILENAME))),
        }
    }

    fn write_marker(&self, logical: &str) -> Result<()> {
        fs::write(&self.marker, format!("{}\n", logical))?;
        Ok(())
    }

    fn lock_current(&self) -> Result<std::sync::MutexGuard<'_, String>> {
        self.current.lock().map_err(|_| Error::LockPoisoned {
            context: "current path".to_string(),
        })
    }
}

/// Read the current-path marker, falling back to the root.
fn read_marker(marker: &Path) -> String {
    match fs::read_to_string(marker) {
        Ok(content) => {
            let value = content.trim();
            if value.starts_with('/') && !value.contains('\0') {
                path::normalize(value)
            } else {
                warn!(
                    "Ignoring unusable current-path marker {}",
                    marker.display()
                );
                "/".to_string()
            }
        }
        Err(_) => "/".to_string(),
    }
}

impl Navigator for FilesystemNavigator {
    fn current_path(&self) -> Result<String> {
        Ok(self.lock_current()?.clone())
    }

    fn navigate(&self, path: &str) -> Result<String> {
        let target = self.absolute(path)?;
        let located = self.locate_existing(&target)?;
        if located.node.needs_clone() {
            self.clone_node(&located.node)?;
        }

        self.write_marker(&target)?;
        *self.lock_current()? = target.clone();
        debug!("Navigated to {}", target);
        Ok(target)
    }

    fn get_node(&self, path: &str) -> Result<Option<Node>> {
        let target = self.absolute(path)?;
        let Some(located) = self.resolver.locate(&target)? else {
            return Ok(None);
        };
        let names = self.child_names(&located.node, &located.stack)?;
        Ok(Some(located.node.to_node(names)))
    }

    fn list_children(&self, path: &str) -> Result<Vec<Node>> {
        let target = self.absolute(path)?;
        let mut located = self.locate_existing(&target)?;
        let children = self.resolver.children_of(&located)?;

        located.stack.enter(&located.node);
        children
            .iter()
            .map(|child| {
                let names = self.child_names(child, &located.stack)?;
                Ok(child.to_node(names))
            })
            .collect()
    }

    fn get_tree(&self, path: &str, depth: Option<usize>) -> Result<TreeView> {
        let target = self.absolute(path)?;
        let Located { node, mut stack } = self.locate_existing(&target)?;
        let mut view = TreeView::new(target, depth);
        self.collect(&node, &mut stack, depth, &mut view)?;
        Ok(view)
    }

    fn get_node_status(&self, path: &str) -> Result<NodeStatus> {
        let target = self.absolute(path)?;
        let located = self.locate_existing(&target)?;
        if !located.node.is_repository() {
            return Err(Error::NotARepository { path: target });
        }
        Ok(self.derive_status(&located.node))
    }

    fn refresh_status(&self, _path: &str) -> Result<()> {
        // Statuses are derived on every read; there is nothing to refresh.
        Ok(())
    }

    fn is_lazy(&self, path: &str) -> Result<bool> {
        let target = self.absolute(path)?;
        let node = self.locate_existing(&target)?.node;
        Ok(node.needs_clone() && node.is_lazy())
    }

    fn trigger_lazy_load(&self, path: &str) -> Result<()> {
        let target = self.absolute(path)?;
        let node = self.locate_existing(&target)?.node;
        if !node.is_repository() {
            return Err(Error::NotARepository { path: target });
        }
        if node.cloned {
            debug!("{} is already cloned", target);
            return Ok(());
        }
        self.clone_node(&node)
    }

    fn add_child(&self, parent: &str, definition: NodeDefinition) -> Result<Node> {
        let parent = self.absolute(parent)?;
        config::validate_name(&definition.name)?;
        classify(&definition)?;

        let located = self.locate_existing(&parent)?;
        let fragment_path = self.declaring_fragment(&located)?;
        let mut fragment = if fragment_path.exists() {
            config::from_file(&fragment_path)?
        } else {
            ConfigFragment::default()
        };
        if fragment.contains(&definition.name) {
            return Err(Error::DuplicateNode {
                parent,
                name: definition.name,
            });
        }

        let child_path = path::join(&parent, &definition.name);
        fragment.nodes.push(definition);
        config::to_file(&fragment_path, &fragment)?;
        self.resolver.invalidate(&fragment_path)?;
        info!("Added {} to {}", child_path, fragment_path.display());

        self.get_node(&child_path)?
            .ok_or(Error::NodeNotFound { path: child_path })
    }

    fn remove_child(&self, parent: &str, name: &str) -> Result<()> {
        let parent = self.absolute(parent)?;
        let child_path = path::join(&parent, name);
        let located = self.locate_existing(&parent)?;
        let fragment_path = self.declaring_fragment(&located)?;
        if !fragment_path.exists() {
            return Err(Error::NodeNotFound { path: child_path });
        }

        let mut fragment = config::from_file(&fragment_path)?;
        let before = fragment.nodes.len();
        fragment.nodes.retain(|def| def.name != name);
        if fragment.nodes.len() == before {
            return Err(Error::NodeNotFound { path: child_path });
        }

        config::to_file(&fragment_path, &fragment)?;
        self.resolver.invalidate(&fragment_path)?;
        info!(
            "Removed {} from {}; files on disk are left in place",
            child_path,
            fragment_path.display()
        );
        Ok(())
    }
}
