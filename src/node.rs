//! # Node and Status Model
//!
//! Pure data describing the logical tree. A [`Node`] is what the
//! configuration declares; a [`NodeStatus`] is what the filesystem and the
//! version control client say about it right now. Statuses are always derived
//! and never persisted.
//!
//! Every predicate in this module is side-effect free.

use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::Serialize;

/// What a node in the logical tree stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    /// The workspace itself.
    Root,
    /// A git repository, identified by its remote URL.
    Repository,
    /// A plain directory grouping other nodes.
    ///
    /// Configuration cannot declare one, since every definition names a
    /// url or a config reference. Only navigators that take nodes as given,
    /// such as `MemoryNavigator::insert_node`, hold directories.
    Directory,
    /// A delegation to another configuration fragment.
    ConfigReference,
}

/// A node of the logical tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    /// Absolute logical path, e.g. `/backend-monorepo/payment-service`.
    pub path: String,
    pub name: String,
    pub kind: NodeKind,
    /// Remote URL, set for repositories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Fragment path as written in the configuration, set for config references.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_ref: Option<String>,
    /// Names of the direct children, in declaration order.
    pub children: Vec<String>,
}

impl Node {
    /// The workspace root node.
    pub fn root() -> Self {
        Self {
            path: "/".to_string(),
            name: String::new(),
            kind: NodeKind::Root,
            url: None,
            config_ref: None,
            children: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.kind == NodeKind::Root
    }

    pub fn is_repository(&self) -> bool {
        self.kind == NodeKind::Repository
    }

    pub fn is_config_reference(&self) -> bool {
        self.kind == NodeKind::ConfigReference
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Synchronisation state of a repository relative to its upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepoState {
    /// Not cloned.
    Missing,
    /// Cloned and clean.
    Cloned,
    /// Cloned with uncommitted changes.
    Modified,
    /// Local commits not on the upstream.
    Ahead,
    /// Upstream commits not fetched into the local branch.
    Behind,
    /// Both ahead and behind.
    Diverged,
}

impl RepoState {
    /// Combine the individual probes into one state.
    ///
    /// Uncommitted changes dominate; otherwise the ahead/behind counts decide.
    pub fn derive(cloned: bool, modified: bool, ahead: usize, behind: usize) -> Self {
        if !cloned {
            return RepoState::Missing;
        }
        if modified {
            return RepoState::Modified;
        }
        match (ahead > 0, behind > 0) {
            (true, true) => RepoState::Diverged,
            (true, false) => RepoState::Ahead,
            (false, true) => RepoState::Behind,
            (false, false) => RepoState::Cloned,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RepoState::Missing => "missing",
            RepoState::Cloned => "cloned",
            RepoState::Modified => "modified",
            RepoState::Ahead => "ahead",
            RepoState::Behind => "behind",
            RepoState::Diverged => "diverged",
        }
    }
}

impl std::fmt::Display for RepoState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived, point-in-time status of a repository node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeStatus {
    pub exists: bool,
    pub cloned: bool,
    pub state: RepoState,
    /// The node's effective fetch policy is lazy.
    pub lazy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    pub last_check: SystemTime,
    /// First probe failure, if any aspect of the status is unknown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NodeStatus {
    /// Status of a repository that is not on disk.
    pub fn missing(lazy: bool) -> Self {
        Self {
            exists: false,
            cloned: false,
            state: RepoState::Missing,
            lazy,
            branch: None,
            remote_url: None,
            last_check: SystemTime::now(),
            error: None,
        }
    }

    /// Status of a clean, freshly cloned repository.
    pub fn cloned(lazy: bool) -> Self {
        Self {
            exists: true,
            cloned: true,
            state: RepoState::Cloned,
            ..Self::missing(lazy)
        }
    }

    /// Only meaningful for repository nodes; callers check the kind.
    pub fn needs_clone(&self) -> bool {
        self.state == RepoState::Missing
    }

    pub fn is_clean(&self) -> bool {
        self.cloned && self.state != RepoState::Modified
    }

    pub fn has_remote_changes(&self) -> bool {
        matches!(self.state, RepoState::Behind | RepoState::Diverged)
    }

    pub fn has_local_changes(&self) -> bool {
        matches!(
            self.state,
            RepoState::Ahead | RepoState::Diverged | RepoState::Modified
        )
    }
}

/// True when `node` is a repository whose status says it is not on disk.
pub fn needs_clone(node: &Node, status: &NodeStatus) -> bool {
    node.is_repository() && status.needs_clone()
}

/// Immutable snapshot of a subtree, bounded by depth.
#[derive(Debug, Clone, Serialize)]
pub struct TreeView {
    /// Logical path the snapshot starts at.
    pub root: String,
    pub nodes: BTreeMap<String, Node>,
    /// Statuses of the repository nodes in `nodes`.
    pub statuses: BTreeMap<String, NodeStatus>,
    /// `None` means unlimited.
    pub depth: Option<usize>,
    pub generated_at: SystemTime,
}

impl TreeView {
    pub fn new(root: impl Into<String>, depth: Option<usize>) -> Self {
        Self {
            root: root.into(),
            nodes: BTreeMap::new(),
            statuses: BTreeMap::new(),
            depth,
            generated_at: SystemTime::now(),
        }
    }

    pub fn root_node(&self) -> Option<&Node> {
        self.nodes.get(&self.root)
    }

    pub fn node(&self, path: &str) -> Option<&Node> {
        self.nodes.get(path)
    }

    pub fn status(&self, path: &str) -> Option<&NodeStatus> {
        self.statuses.get(path)
    }

    /// Children of `path` that are part of this snapshot, in declaration order.
    pub fn children_of(&self, path: &str) -> Vec<&Node> {
        let Some(parent) = self.nodes.get(path) else {
            return Vec::new();
        };
        parent
            .children
            .iter()
            .filter_map(|name| self.nodes.get(&crate::path::join(path, name)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(path: &str) -> Node {
        Node {
            path: path.to_string(),
            name: path.rsplit('/').next().unwrap_or_default().to_string(),
            kind: NodeKind::Repository,
            url: Some(format!("https://example.com{}.git", path)),
            config_ref: None,
            children: Vec::new(),
        }
    }

    fn status(state: RepoState) -> NodeStatus {
        NodeStatus {
            state,
            cloned: state != RepoState::Missing,
            exists: state != RepoState::Missing,
            ..NodeStatus::missing(false)
        }
    }

    #[test]
    fn test_node_predicates() {
        let root = Node::root();
        assert!(root.is_root());
        assert!(!root.is_repository());
        assert!(!root.has_children());

        let mut node = repo("/svc");
        assert!(node.is_repository());
        assert!(!node.is_config_reference());
        node.children.push("child".to_string());
        assert!(node.has_children());
    }

    #[test]
    fn test_needs_clone_only_for_missing_repositories() {
        let node = repo("/svc");
        assert!(needs_clone(&node, &status(RepoState::Missing)));
        assert!(!needs_clone(&node, &status(RepoState::Cloned)));

        let mut dir = repo("/dir");
        dir.kind = NodeKind::Directory;
        assert!(!needs_clone(&dir, &status(RepoState::Missing)));
    }

    #[test]
    fn test_is_clean() {
        assert!(status(RepoState::Cloned).is_clean());
        assert!(status(RepoState::Behind).is_clean());
        assert!(!status(RepoState::Modified).is_clean());
        assert!(!status(RepoState::Missing).is_clean());
    }

    #[test]
    fn test_remote_and_local_changes() {
        assert!(status(RepoState::Behind).has_remote_changes());
        assert!(status(RepoState::Diverged).has_remote_changes());
        assert!(!status(RepoState::Ahead).has_remote_changes());

        assert!(status(RepoState::Ahead).has_local_changes());
        assert!(status(RepoState::Diverged).has_local_changes());
        assert!(status(RepoState::Modified).has_local_changes());
        assert!(!status(RepoState::Behind).has_local_changes());
        assert!(!status(RepoState::Cloned).has_local_changes());
    }

    #[test]
    fn test_repo_state_derive() {
        assert_eq!(RepoState::derive(false, true, 3, 3), RepoState::Missing);
        assert_eq!(RepoState::derive(true, true, 1, 0), RepoState::Modified);
        assert_eq!(RepoState::derive(true, false, 1, 1), RepoState::Diverged);
        assert_eq!(RepoState::derive(true, false, 2, 0), RepoState::Ahead);
        assert_eq!(RepoState::derive(true, false, 0, 2), RepoState::Behind);
        assert_eq!(RepoState::derive(true, false, 0, 0), RepoState::Cloned);
    }

    #[test]
    fn test_tree_view_children_of() {
        let mut view = TreeView::new("/", None);
        let mut root = Node::root();
        root.children = vec!["a".to_string(), "b".to_string()];
        view.nodes.insert("/".to_string(), root);
        view.nodes.insert("/a".to_string(), repo("/a"));

        let children = view.children_of("/");
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].path, "/a");
        assert!(view.children_of("/missing").is_empty());
        assert_eq!(view.root_node().map(|n| n.kind), Some(NodeKind::Root));
    }
}
