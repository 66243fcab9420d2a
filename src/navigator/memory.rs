//! Map-backed navigator.
//!
//! Holds the whole tree in memory. Nothing touches the filesystem or the
//! network: "cloning" flips the stored status and is recorded, so tests can
//! assert which nodes were loaded and inject failures for specific paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, info};

use super::Navigator;
use crate::config::{self, ConfigFragment, FetchPolicy, NodeDefinition};
use crate::error::{Error, Result};
use crate::node::{Node, NodeKind, NodeStatus, TreeView};
use crate::path;
use crate::resolver::{classify, effective_fetch_policy};

#[derive(Debug)]
struct MemoryState {
    nodes: BTreeMap<String, Node>,
    statuses: BTreeMap<String, NodeStatus>,
    current: String,
    config: Option<ConfigFragment>,
    loads: Vec<String>,
    failures: HashMap<String, String>,
}

impl MemoryState {
    fn existing(&self, target: &str) -> Result<&Node> {
        self.nodes.get(target).ok_or_else(|| Error::NodeNotFound {
            path: target.to_string(),
        })
    }

    fn status_of(&self, target: &str) -> NodeStatus {
        self.statuses
            .get(target)
            .cloned()
            .unwrap_or_else(|| NodeStatus::missing(false))
    }

    /// First ancestor of `target` (exclusive) that is not in the tree.
    fn missing_ancestor(&self, target: &str) -> Option<String> {
        let segments = path::segments(target);
        let mut current = "/".to_string();
        for segment in segments.iter().take(segments.len().saturating_sub(1)) {
            current = path::join(&current, segment);
            if !self.nodes.contains_key(&current) {
                return Some(current);
            }
        }
        None
    }

    fn insert(&mut self, node: Node, status: Option<NodeStatus>) {
        if let Some(parent) = path::parent(&node.path) {
            if let Some(parent_node) = self.nodes.get_mut(&parent) {
                if !parent_node.children.contains(&node.name) {
                    parent_node.children.push(node.name.clone());
                }
            }
        }
        if let Some(status) = status {
            self.statuses.insert(node.path.clone(), status);
        }
        self.nodes.insert(node.path.clone(), node);
    }

    /// Remove `target` and everything below it.
    fn remove_subtree(&mut self, target: &str) {
        let prefix = format!("{}/", target);
        self.nodes
            .retain(|p, _| p != target && !p.starts_with(&prefix));
        self.statuses
            .retain(|p, _| p != target && !p.starts_with(&prefix));
        if let Some(parent) = path::parent(target) {
            let name = path::name(target);
            if let Some(parent_node) = self.nodes.get_mut(&parent) {
                parent_node.children.retain(|c| *c != name);
            }
        }
    }

    fn load(&mut self, target: &str) -> Result<()> {
        self.loads.push(target.to_string());
        let node = self.existing(target)?;
        if let Some(message) = self.failures.get(target) {
            return Err(Error::CloneFailure {
                path: target.to_string(),
                url: node.url.clone().unwrap_or_default(),
                message: message.clone(),
            });
        }

        let lazy = self.status_of(target).lazy;
        info!("Loading {}", target);
        self.statuses
            .insert(target.to_string(), NodeStatus::cloned(lazy));
        Ok(())
    }
}

/// Build the node and initial status described by `def` under `parent`.
fn materialize(parent: &str, def: &NodeDefinition) -> Result<(Node, Option<NodeStatus>)> {
    config::validate_name(&def.name)?;
    let kind: NodeKind = classify(def)?.into();
    let node = Node {
        path: path::join(parent, &def.name),
        name: def.name.clone(),
        kind,
        url: def.url.clone(),
        config_ref: def.config_ref.clone(),
        children: Vec::new(),
    };
    let status = (kind == NodeKind::Repository)
        .then(|| NodeStatus::missing(effective_fetch_policy(def) == FetchPolicy::Lazy));
    Ok((node, status))
}

/// Deterministic in-memory [`Navigator`].
#[derive(Debug)]
pub struct MemoryNavigator {
    state: RwLock<MemoryState>,
}

impl Default for MemoryNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryNavigator {
    /// A tree holding only the root.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::root());
        Self {
            state: RwLock::new(MemoryState {
                nodes,
                statuses: BTreeMap::new(),
                current: "/".to_string(),
                config: None,
                loads: Vec::new(),
                failures: HashMap::new(),
            }),
        }
    }

    /// A tree whose root children are the nodes of `fragment`. The fragment
    /// is kept as the configuration `refresh_status("/")` reconciles with.
    pub fn from_config(fragment: &ConfigFragment) -> Result<Self> {
        let nav = Self::new();
        nav.set_config(fragment.clone())?;
        nav.refresh_status("/")?;
        Ok(nav)
    }

    /// Insert `node` as is. Its parent must already be present; repositories
    /// without a status get a missing, non-lazy one.
    pub fn insert_node(&self, node: Node) -> Result<()> {
        let mut state = self.write()?;
        if let Some(parent) = path::parent(&node.path) {
            state.existing(&parent)?;
        }
        let status = (node.is_repository() && !state.statuses.contains_key(&node.path))
            .then(|| NodeStatus::missing(false));
        state.insert(node, status);
        Ok(())
    }

    pub fn set_status(&self, target: &str, status: NodeStatus) -> Result<()> {
        let mut state = self.write()?;
        state.existing(target)?;
        state.statuses.insert(target.to_string(), status);
        Ok(())
    }

    /// Replace the configuration used when refreshing the root.
    pub fn set_config(&self, fragment: ConfigFragment) -> Result<()> {
        config::validate(&fragment)?;
        self.write()?.config = Some(fragment);
        Ok(())
    }

    /// Make every load of `target` fail with `message`.
    pub fn fail_loads(&self, target: &str, message: &str) -> Result<()> {
        self.write()?
            .failures
            .insert(path::normalize(target), message.to_string());
        Ok(())
    }

    /// Paths passed to a load, in call order, including failed ones.
    pub fn loaded_paths(&self) -> Vec<String> {
        self.read().map(|s| s.loads.clone()).unwrap_or_default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>> {
        self.state.read().map_err(|_| Error::LockPoisoned {
            context: "memory navigator".to_string(),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>> {
        self.state.write().map_err(|_| Error::LockPoisoned {
            context: "memory navigator".to_string(),
        })
    }

    fn absolute(&self, target: &str) -> Result<String> {
        Ok(path::resolve(&self.read()?.current, target))
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> Result<String> {
        Ok(self.read()?.current.clone())
    }

    fn navigate(&self, target: &str) -> Result<String> {
        let target = self.absolute(target)?;
        let mut state = self.write()?;
        let node = state.existing(&target)?;
        if node.is_repository() && state.status_of(&target).needs_clone() {
            state.load(&target)?;
        }
        state.current = target.clone();
        debug!("Navigated to {}", target);
        Ok(target)
    }

    fn get_node(&self, target: &str) -> Result<Option<Node>> {
        let target = self.absolute(target)?;
        let state = self.read()?;
        if let Some(node) = state.nodes.get(&target) {
            return Ok(Some(node.clone()));
        }
        match state.missing_ancestor(&target) {
            Some(ancestor) => Err(Error::NodeNotFound { path: ancestor }),
            None => Ok(None),
        }
    }

    fn list_children(&self, target: &str) -> Result<Vec<Node>> {
        let target = self.absolute(target)?;
        let state = self.read()?;
        let node = state.existing(&target)?;
        Ok(node
            .children
            .iter()
            .filter_map(|name| state.nodes.get(&path::join(&target, name)).cloned())
            .collect())
    }

    fn get_tree(&self, target: &str, depth: Option<usize>) -> Result<TreeView> {
        let target = self.absolute(target)?;
        let state = self.read()?;
        state.existing(&target)?;

        let mut view = TreeView::new(target.clone(), depth);
        let mut queue = vec![(target, 0usize)];
        while let Some((current, level)) = queue.pop() {
            let Some(node) = state.nodes.get(&current) else {
                continue;
            };
            if node.is_repository() {
                view.statuses
                    .insert(current.clone(), state.status_of(&current));
            }
            if depth.map_or(true, |max| level < max) {
                for name in &node.children {
                    queue.push((path::join(&current, name), level + 1));
                }
            }
            view.nodes.insert(current, node.clone());
        }
        Ok(view)
    }

    fn get_node_status(&self, target: &str) -> Result<NodeStatus> {
        let target = self.absolute(target)?;
        let state = self.read()?;
        if !state.existing(&target)?.is_repository() {
            return Err(Error::NotARepository { path: target });
        }
        Ok(state.status_of(&target))
    }

    fn refresh_status(&self, target: &str) -> Result<()> {
        let target = self.absolute(target)?;
        let mut state = self.write()?;
        state.existing(&target)?;

        if path::is_root(&target) {
            if let Some(fragment) = state.config.clone() {
                let declared: Vec<&str> = fragment.nodes.iter().map(|d| d.name.as_str()).collect();
                let stale: Vec<String> = state
                    .existing("/")?
                    .children
                    .iter()
                    .filter(|name| !declared.contains(&name.as_str()))
                    .map(|name| path::join("/", name))
                    .collect();
                for stale_path in stale {
                    debug!("Dropping undeclared node {}", stale_path);
                    state.remove_subtree(&stale_path);
                }
                for def in &fragment.nodes {
                    if !state.nodes.contains_key(&path::join("/", &def.name)) {
                        let (node, status) = materialize("/", def)?;
                        state.insert(node, status);
                    }
                }
            }
        }

        if let Some(status) = state.statuses.get_mut(&target) {
            status.last_check = std::time::SystemTime::now();
        }
        Ok(())
    }

    fn is_lazy(&self, target: &str) -> Result<bool> {
        let target = self.absolute(target)?;
        let state = self.read()?;
        if !state.existing(&target)?.is_repository() {
            return Ok(false);
        }
        let status = state.status_of(&target);
        Ok(status.lazy && !status.cloned)
    }

    fn trigger_lazy_load(&self, target: &str) -> Result<()> {
        let target = self.absolute(target)?;
        let mut state = self.write()?;
        if !state.existing(&target)?.is_repository() {
            return Err(Error::NotARepository { path: target });
        }
        if state.status_of(&target).cloned {
            return Ok(());
        }
        state.load(&target)
    }

    fn add_child(&self, parent: &str, definition: NodeDefinition) -> Result<Node> {
        let parent = self.absolute(parent)?;
        let (node, status) = materialize(&parent, &definition)?;

        let mut state = self.write()?;
        state.existing(&parent)?;
        if state.nodes.contains_key(&node.path) {
            return Err(Error::DuplicateNode {
                parent,
                name: definition.name,
            });
        }

        if path::is_root(&parent) {
            if let Some(config) = state.config.as_mut() {
                config.nodes.push(definition);
            }
        }
        state.insert(node.clone(), status);
        Ok(node)
    }

    fn remove_child(&self, parent: &str, name: &str) -> Result<()> {
        let parent = self.absolute(parent)?;
        let child = path::join(&parent, name);

        let mut state = self.write()?;
        state.existing(&child)?;
        if path::is_root(&parent) {
            if let Some(config) = state.config.as_mut() {
                config.nodes.retain(|def| def.name != name);
            }
        }
        state.remove_subtree(&child);
        Ok(())
    }
}
