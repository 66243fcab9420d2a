//! # Distributed Configuration Resolver
//!
//! Answers "what does this logical path contain?" without requiring the whole
//! workspace to be cloned. The tree is assembled from fragments spread across
//! the workspace: the root `muno.yaml`, fragments referenced explicitly with
//! `config:`, and fragments auto-discovered inside repositories that are
//! already on disk.
//!
//! ## Expansion
//!
//! Each definition of a fragment is classified ([`classify`]), given its
//! effective fetch policy ([`effective_fetch_policy`]) and checked on disk.
//! Cloned repositories are probed for their own fragment
//! ([`auto_discover_config`]); config references are always followed.
//!
//! When a [`VersionControlClient`] is supplied, eager repositories that are
//! not on disk are cloned during expansion so their own fragments can be
//! discovered. Without a client, expansion is read-only.
//!
//! ## Cycles
//!
//! The fragments and repository URLs of the nodes currently being expanded
//! are tracked on an [`ExpansionStack`] threaded through the recursion.
//! Meeting one of them again truncates that branch with a warning instead of
//! looping. Sibling branches each see only their own ancestors.
//!
//! ## Caching
//!
//! Loaded fragments are cached per resolver instance, keyed by absolute path.
//! A cached fragment is never mutated; [`ConfigResolver::invalidate`] drops it
//! so the next load replaces it.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

use log::{debug, info, warn};

use crate::config::{self, ConfigFragment, FetchPolicy, NodeDefinition};
use crate::defaults::{CONFIG_CANDIDATES, DEFAULT_CONFIG_FILENAME, META_REPO_SUFFIXES};
use crate::error::{Error, Result};
use crate::node::{Node, NodeKind};
use crate::path;
use crate::vcs::{self, VersionControlClient};

/// Classification of a node definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeClass {
    Repository,
    ConfigReference,
}

impl From<NodeClass> for NodeKind {
    fn from(class: NodeClass) -> Self {
        match class {
            NodeClass::Repository => NodeKind::Repository,
            NodeClass::ConfigReference => NodeKind::ConfigReference,
        }
    }
}

/// Classify a definition by which of `url` / `config` it sets.
///
/// Setting both or neither is rejected with an error naming the node.
pub fn classify(def: &NodeDefinition) -> Result<NodeClass> {
    let has_url = def.url.as_deref().is_some_and(|u| !u.trim().is_empty());
    let has_ref = def.config_ref.as_deref().is_some_and(|c| !c.trim().is_empty());
    match (has_url, has_ref) {
        (true, false) => Ok(NodeClass::Repository),
        (false, true) => Ok(NodeClass::ConfigReference),
        (true, true) => Err(Error::InvalidNodeDefinition {
            name: def.name.clone(),
            message: "both url and config are set; exactly one is allowed".to_string(),
        }),
        (false, false) => Err(Error::InvalidNodeDefinition {
            name: def.name.clone(),
            message: "neither url nor config is set; exactly one is required".to_string(),
        }),
    }
}

/// Location of the fragment a config reference points at.
///
/// Absolute paths are used as given. Relative paths resolve against
/// `base_path/<name>/`, so a fragment can ship inside the directory of the
/// node it describes. The result is normalized lexically.
pub fn resolve_fragment_path(base_path: &Path, def: &NodeDefinition) -> Result<PathBuf> {
    let reference = def
        .config_ref
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| Error::InvalidNodeDefinition {
            name: def.name.clone(),
            message: "no config reference to resolve".to_string(),
        })?;

    let reference = Path::new(reference);
    if reference.is_absolute() {
        Ok(normalize_fs_path(reference))
    } else {
        Ok(normalize_fs_path(&base_path.join(&def.name).join(reference)))
    }
}

/// Whether `name` marks a repository containing further nested structure.
///
/// Case-insensitive suffix match; a pattern appearing elsewhere in the name
/// does not count.
pub fn is_meta_repository(name: &str) -> bool {
    let lower = name.to_lowercase();
    META_REPO_SUFFIXES
        .iter()
        .any(|suffix| lower.ends_with(suffix))
}

/// Resolve `auto` to eager or lazy. Explicit policies win; meta-repositories
/// default to eager, everything else to lazy.
pub fn effective_fetch_policy(def: &NodeDefinition) -> FetchPolicy {
    match def.fetch {
        FetchPolicy::Eager => FetchPolicy::Eager,
        FetchPolicy::Lazy => FetchPolicy::Lazy,
        FetchPolicy::Auto if is_meta_repository(&def.name) => FetchPolicy::Eager,
        FetchPolicy::Auto => FetchPolicy::Lazy,
    }
}

/// First configuration candidate present in a repository checkout.
///
/// A candidate that cannot be inspected for a reason other than absence is
/// reported as an error.
pub fn auto_discover_config(repo_path: &Path) -> Result<Option<PathBuf>> {
    for name in CONFIG_CANDIDATES {
        let candidate = repo_path.join(name);
        match fs::metadata(&candidate) {
            Ok(meta) if meta.is_file() => return Ok(Some(candidate)),
            Ok(_) => continue,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(None)
}

fn normalize_fs_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Where a fragment came from, which decides how its failures are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentOrigin {
    /// The workspace configuration. Failures are fatal.
    Root,
    /// Named by a `config:` reference reachable from the root through
    /// references alone. Failures are fatal.
    Reference,
    /// Found inside a cloned repository. Failures degrade the subtree.
    Discovered,
    /// Named by a `config:` reference somewhere below a discovered fragment.
    /// Failures degrade the subtree.
    NestedReference,
}

impl FragmentOrigin {
    /// Whether a failure to load or expand this fragment aborts resolution.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FragmentOrigin::Root | FragmentOrigin::Reference)
    }
}

/// A fragment describing the children of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentSource {
    pub path: PathBuf,
    pub origin: FragmentOrigin,
}

/// A node as resolved against configuration and disk.
#[derive(Debug, Clone)]
pub struct ResolvedNode {
    pub name: String,
    /// Logical path.
    pub path: String,
    pub kind: NodeKind,
    pub url: Option<String>,
    pub config_ref: Option<String>,
    /// Effective fetch policy, for repositories.
    pub fetch: Option<FetchPolicy>,
    /// Location of the node itself.
    pub dir: PathBuf,
    /// Location of the node's children.
    pub children_dir: PathBuf,
    pub cloned: bool,
    /// Fragment declaring this node's children, if any.
    pub fragment: Option<FragmentSource>,
    /// Expanded children; empty unless built with `build_distributed_tree`.
    pub children: Vec<ResolvedNode>,
}

impl ResolvedNode {
    pub fn is_repository(&self) -> bool {
        self.kind == NodeKind::Repository
    }

    /// Repository that is not on disk yet.
    pub fn needs_clone(&self) -> bool {
        self.is_repository() && !self.cloned
    }

    pub fn is_lazy(&self) -> bool {
        self.fetch == Some(FetchPolicy::Lazy)
    }

    /// Convert to the public node model with the given child names.
    pub fn to_node(&self, children: Vec<String>) -> Node {
        Node {
            path: self.path.clone(),
            name: self.name.clone(),
            kind: self.kind,
            url: self.url.clone(),
            config_ref: self.config_ref.clone(),
            children,
        }
    }

    /// Descendant (or self) at `logical`, within the expanded children.
    pub fn find(&self, logical: &str) -> Option<&ResolvedNode> {
        let target = path::normalize(logical);
        if self.path == target {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(&target))
    }

    /// Pre-order traversal of this node and its expanded descendants.
    pub fn walk(&self) -> Vec<&ResolvedNode> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ExpansionKey {
    Fragment(PathBuf),
    Repository(String),
}

/// Fragments and repositories on the active recursion path.
#[derive(Debug, Clone, Default)]
pub struct ExpansionStack {
    keys: Vec<ExpansionKey>,
}

impl ExpansionStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_fragment(&self, path: &Path) -> bool {
        self.keys
            .iter()
            .any(|k| matches!(k, ExpansionKey::Fragment(p) if p == path))
    }

    pub fn contains_repository(&self, url: &str) -> bool {
        self.keys
            .iter()
            .any(|k| matches!(k, ExpansionKey::Repository(u) if u == url))
    }

    /// Push what `node` contributes; returns how many entries were pushed.
    pub fn enter(&mut self, node: &ResolvedNode) -> usize {
        let mut pushed = 0;
        if let Some(url) = node.url.as_ref().filter(|_| node.is_repository()) {
            self.keys.push(ExpansionKey::Repository(url.clone()));
            pushed += 1;
        }
        if let Some(source) = &node.fragment {
            self.keys.push(ExpansionKey::Fragment(source.path.clone()));
            pushed += 1;
        }
        pushed
    }

    pub fn leave(&mut self, pushed: usize) {
        let keep = self.keys.len().saturating_sub(pushed);
        self.keys.truncate(keep);
    }

    pub fn depth(&self) -> usize {
        self.keys.len()
    }

    fn describe(&self, closing: &str) -> String {
        let mut parts: Vec<String> = self
            .keys
            .iter()
            .map(|k| match k {
                ExpansionKey::Fragment(p) => p.display().to_string(),
                ExpansionKey::Repository(u) => u.clone(),
            })
            .collect();
        parts.push(closing.to_string());
        parts.join(" -> ")
    }
}

/// A node located by logical path, with the stack of its ancestors.
#[derive(Debug, Clone)]
pub struct Located {
    pub node: ResolvedNode,
    pub stack: ExpansionStack,
}

/// Loads, caches and expands configuration fragments for one workspace.
#[derive(Debug)]
pub struct ConfigResolver {
    workspace_root: PathBuf,
    fragments: RwLock<HashMap<PathBuf, Arc<ConfigFragment>>>,
}

impl ConfigResolver {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            fragments: RwLock::new(HashMap::new()),
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Path of the workspace configuration file.
    pub fn root_config_path(&self) -> Result<PathBuf> {
        config::find_config_in(&self.workspace_root).ok_or_else(|| Error::ConfigLoad {
            path: self.workspace_root.join(DEFAULT_CONFIG_FILENAME),
            message: "no workspace configuration found".to_string(),
        })
    }

    /// Load a fragment, serving it from this resolver's cache when present.
    pub fn load_fragment(&self, fragment_path: &Path) -> Result<Arc<ConfigFragment>> {
        let key = normalize_fs_path(fragment_path);
        {
            let cache = self.fragments.read().map_err(|_| Error::LockPoisoned {
                context: "config fragment cache".to_string(),
            })?;
            if let Some(fragment) = cache.get(&key) {
                return Ok(Arc::clone(fragment));
            }
        }

        debug!("Loading config fragment {}", key.display());
        let fragment = Arc::new(config::from_file(&key)?);
        let mut cache = self.fragments.write().map_err(|_| Error::LockPoisoned {
            context: "config fragment cache".to_string(),
        })?;
        cache.insert(key, Arc::clone(&fragment));
        Ok(fragment)
    }

    /// Drop a cached fragment so the next load reads it from disk.
    pub fn invalidate(&self, fragment_path: &Path) -> Result<()> {
        let mut cache = self.fragments.write().map_err(|_| Error::LockPoisoned {
            context: "config fragment cache".to_string(),
        })?;
        cache.remove(&normalize_fs_path(fragment_path));
        Ok(())
    }

    /// Number of fragments currently cached.
    pub fn cached_fragments(&self) -> usize {
        self.fragments.read().map(|c| c.len()).unwrap_or_default()
    }

    /// The root node, unexpanded.
    pub fn root(&self) -> Result<ResolvedNode> {
        let config_path = self.root_config_path()?;
        let root_dir = self.workspace_root.join(path::nested_repos_dir(&self.workspace_root));
        Ok(ResolvedNode {
            name: String::new(),
            path: "/".to_string(),
            kind: NodeKind::Root,
            url: None,
            config_ref: None,
            fetch: None,
            dir: root_dir.clone(),
            children_dir: root_dir,
            cloned: false,
            fragment: Some(FragmentSource {
                path: normalize_fs_path(&config_path),
                origin: FragmentOrigin::Root,
            }),
            children: Vec::new(),
        })
    }

    /// Resolve the direct children of `parent`.
    ///
    /// `stack` holds the ancestors of `parent`, not `parent` itself. When
    /// `client` is given, eager repositories missing from disk are cloned.
    pub fn expand_children(
        &self,
        parent: &ResolvedNode,
        stack: &ExpansionStack,
        client: Option<&dyn VersionControlClient>,
    ) -> Result<Vec<ResolvedNode>> {
        let Some(source) = &parent.fragment else {
            return Ok(Vec::new());
        };

        if stack.contains_fragment(&source.path) {
            let cycle = Error::CircularConfigReference {
                cycle: stack.describe(&source.path.display().to_string()),
            };
            warn!("Truncating {}: {}", parent.path, cycle);
            return Ok(Vec::new());
        }

        let fragment = match self.load_fragment(&source.path) {
            Ok(fragment) => fragment,
            Err(e) if !source.origin.is_fatal() => {
                warn!(
                    "Ignoring configuration below {}: {}",
                    parent.path, e
                );
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut children = Vec::with_capacity(fragment.nodes.len());
        for def in &fragment.nodes {
            match self.resolve_definition(def, parent, stack, client) {
                Ok(child) => children.push(child),
                Err(e) if !source.origin.is_fatal() => {
                    warn!("Skipping node '{}' under {}: {}", def.name, parent.path, e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(children)
    }

    fn resolve_definition(
        &self,
        def: &NodeDefinition,
        parent: &ResolvedNode,
        stack: &ExpansionStack,
        client: Option<&dyn VersionControlClient>,
    ) -> Result<ResolvedNode> {
        let class = classify(def)?;
        let logical = path::join(&parent.path, &def.name);
        let dir = parent.children_dir.join(&def.name);

        match class {
            NodeClass::Repository => {
                let url = def.url.clone().unwrap_or_default();
                let fetch = effective_fetch_policy(def);
                let recursive = stack.contains_repository(&url)
                    || parent.url.as_deref() == Some(url.as_str());
                let mut cloned = vcs::is_cloned(&dir);

                if recursive {
                    warn!(
                        "Not expanding {}: {} is already being expanded above it",
                        logical, url
                    );
                } else if !cloned && fetch == FetchPolicy::Eager {
                    if let Some(client) = client {
                        info!("Eagerly cloning {} ({})", logical, url);
                        if let Err(e) = client.clone_repository(&url, &dir) {
                            warn!("Eager clone of {} failed: {}", logical, e);
                        }
                        cloned = vcs::is_cloned(&dir);
                    }
                }

                let fragment = if cloned && !recursive {
                    match auto_discover_config(&dir) {
                        Ok(found) => found.map(|path| FragmentSource {
                            path: normalize_fs_path(&path),
                            origin: FragmentOrigin::Discovered,
                        }),
                        Err(e) => {
                            warn!("Auto-discovery failed in {}: {}", dir.display(), e);
                            None
                        }
                    }
                } else {
                    None
                };

                Ok(ResolvedNode {
                    name: def.name.clone(),
                    path: logical,
                    kind: NodeKind::Repository,
                    url: Some(url),
                    config_ref: None,
                    fetch: Some(fetch),
                    children_dir: path::children_dir(&dir),
                    dir,
                    cloned,
                    fragment,
                    children: Vec::new(),
                })
            }
            NodeClass::ConfigReference => {
                let fragment_path = resolve_fragment_path(&parent.children_dir, def)?;
                let origin = match parent.fragment.as_ref().map(|source| source.origin) {
                    Some(FragmentOrigin::Discovered | FragmentOrigin::NestedReference) => {
                        FragmentOrigin::NestedReference
                    }
                    _ => FragmentOrigin::Reference,
                };
                Ok(ResolvedNode {
                    name: def.name.clone(),
                    path: logical,
                    kind: NodeKind::ConfigReference,
                    url: None,
                    config_ref: def.config_ref.clone(),
                    fetch: None,
                    children_dir: path::children_dir(&dir),
                    dir,
                    cloned: false,
                    fragment: Some(FragmentSource {
                        path: fragment_path,
                        origin,
                    }),
                    children: Vec::new(),
                })
            }
        }
    }

    /// Recursively expand everything below `parent`.
    ///
    /// `stack` holds the ancestors of `parent` and is restored before
    /// returning.
    pub fn build_distributed_tree(
        &self,
        parent: &ResolvedNode,
        stack: &mut ExpansionStack,
        client: Option<&dyn VersionControlClient>,
    ) -> Result<Vec<ResolvedNode>> {
        let mut children = self.expand_children(parent, stack, client)?;
        let pushed = stack.enter(parent);
        let result: Result<()> = children.iter_mut().try_for_each(|child| {
            child.children = self.build_distributed_tree(child, stack, client)?;
            Ok(())
        });
        stack.leave(pushed);
        result.map(|_| children)
    }

    /// Resolve the whole workspace, cloning eager repositories when a client
    /// is given.
    pub fn resolve_tree(&self, client: Option<&dyn VersionControlClient>) -> Result<ResolvedNode> {
        let mut root = self.root()?;
        root.children = self.build_distributed_tree(&root, &mut ExpansionStack::new(), client)?;
        Ok(root)
    }

    /// Find the node at `logical` by expanding only the branch leading to it.
    ///
    /// Returns `Ok(None)` when the parent exists but declares no such child,
    /// and `NodeNotFound` naming the first ancestor that cannot be resolved.
    pub fn locate(&self, logical: &str) -> Result<Option<Located>> {
        let segments = path::segments(logical);
        let mut node = self.root()?;
        let mut stack = ExpansionStack::new();

        for (idx, segment) in segments.iter().enumerate() {
            let children = self.expand_children(&node, &stack, None)?;
            let found = children.into_iter().find(|c| &c.name == segment);
            match found {
                Some(child) => {
                    stack.enter(&node);
                    node = child;
                }
                None if idx + 1 == segments.len() => return Ok(None),
                None => {
                    return Err(Error::NodeNotFound {
                        path: path::join(&node.path, segment),
                    })
                }
            }
        }

        Ok(Some(Located { node, stack }))
    }

    /// Direct children of a located node, read-only.
    pub fn children_of(&self, located: &Located) -> Result<Vec<ResolvedNode>> {
        self.expand_children(&located.node, &located.stack, None)
    }
}
