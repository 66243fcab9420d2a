//! # Configuration Schema and Parsing
//!
//! This module defines the data structures that represent a `muno.yaml`
//! configuration fragment and the logic for reading and writing it.
//!
//! ## Key Components
//!
//! - **`ConfigFragment`**: One loaded document: workspace settings plus the
//!   ordered list of node definitions describing one level of the tree.
//!
//! - **`NodeDefinition`**: A named entry carrying either a repository `url` or
//!   a `config` reference to another fragment, and an optional fetch policy.
//!
//! - **`FetchPolicy`**: `eager`, `lazy` or `auto`. `auto` leaves the decision
//!   to the resolver (see `resolver::effective_fetch_policy`).
//!
//! ## Format
//!
//! ```yaml
//! workspace:
//!   name: platform
//!   repos_dir: repos
//! nodes:
//!   - name: backend-monorepo
//!     url: https://example.com/backend-monorepo.git
//!   - name: tools
//!     url: https://example.com/tools.git
//!     fetch: lazy
//!   - name: team
//!     config: team/muno.yaml
//! ```
//!
//! Whether a definition is well formed (exactly one of `url` / `config`) is
//! checked at resolution time, not here, so that the resolver can name the
//! offending node and decide whether the failure is fatal.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::defaults::CONFIG_CANDIDATES;
use crate::error::{Error, Result};
use crate::vcs;

/// When a repository node is cloned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchPolicy {
    /// Clone as soon as the tree is resolved.
    Eager,
    /// Clone only when navigated to or explicitly requested.
    Lazy,
    /// Eager for meta-repositories, lazy otherwise.
    #[default]
    Auto,
}

impl FetchPolicy {
    fn is_auto(&self) -> bool {
        *self == FetchPolicy::Auto
    }
}

impl std::str::FromStr for FetchPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "eager" => Ok(FetchPolicy::Eager),
            "lazy" => Ok(FetchPolicy::Lazy),
            "auto" => Ok(FetchPolicy::Auto),
            other => Err(format!(
                "unknown fetch policy '{}' (expected eager, lazy or auto)",
                other
            )),
        }
    }
}

/// The `workspace:` section of a fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSettings {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Directory, relative to the node owning this fragment, holding its
    /// children. Falls back to `defaults::DEFAULT_REPOS_DIR`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repos_dir: Option<String>,
}

/// One entry of the `nodes:` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Path to another fragment, absolute or relative to the node's directory.
    #[serde(
        default,
        alias = "config_ref",
        rename = "config",
        skip_serializing_if = "Option::is_none"
    )]
    pub config_ref: Option<String>,
    #[serde(default, skip_serializing_if = "FetchPolicy::is_auto")]
    pub fetch: FetchPolicy,
}

impl NodeDefinition {
    /// A repository definition with the default (`auto`) fetch policy.
    pub fn repository(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: Some(url.into()),
            config_ref: None,
            fetch: FetchPolicy::Auto,
        }
    }

    /// A definition delegating to another fragment.
    pub fn config_reference(name: impl Into<String>, config: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
            config_ref: Some(config.into()),
            fetch: FetchPolicy::Auto,
        }
    }

    pub fn with_fetch(mut self, fetch: FetchPolicy) -> Self {
        self.fetch = fetch;
        self
    }
}

/// A loaded configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFragment {
    #[serde(default)]
    pub workspace: WorkspaceSettings,
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
}

impl ConfigFragment {
    /// A fragment for a new workspace with no nodes.
    pub fn new_workspace(name: impl Into<String>) -> Self {
        Self {
            workspace: WorkspaceSettings {
                name: name.into(),
                repos_dir: None,
            },
            nodes: Vec::new(),
        }
    }

    pub fn find(&self, name: &str) -> Option<&NodeDefinition> {
        self.nodes.iter().find(|def| def.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }
}

/// Parses a YAML string into a `ConfigFragment`.
///
/// An empty document yields an empty fragment. Node names must be non-empty,
/// must not contain `/`, and must be unique within the fragment.
pub fn parse(yaml_content: &str) -> Result<ConfigFragment> {
    if yaml_content.trim().is_empty() {
        return Ok(ConfigFragment::default());
    }

    let fragment: ConfigFragment = serde_yaml::from_str(yaml_content)?;
    validate(&fragment)?;
    Ok(fragment)
}

/// Check that `name` can be used as a node name.
pub fn validate_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed != name
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
    {
        return Err(Error::InvalidNodeDefinition {
            name: name.to_string(),
            message: "node names must be a single non-empty path segment".to_string(),
        });
    }
    Ok(())
}

/// Check the node names of a fragment: each valid, none repeated.
pub fn validate(fragment: &ConfigFragment) -> Result<()> {
    let mut seen = HashSet::new();
    for def in &fragment.nodes {
        validate_name(&def.name)?;
        let name = def.name.as_str();
        if !seen.insert(name) {
            return Err(Error::InvalidNodeDefinition {
                name: def.name.clone(),
                message: "declared more than once in the same fragment".to_string(),
            });
        }
    }
    Ok(())
}

/// Reads and parses a fragment, reporting any failure as `ConfigLoad` with
/// the file path.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<ConfigFragment> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| Error::config_load(path, e))?;
    parse(&content).map_err(|e| match e {
        Error::InvalidNodeDefinition { .. } => e,
        other => Error::config_load(path, other),
    })
}

/// Writes a fragment to `path`, creating parent directories as needed.
pub fn to_file<P: AsRef<Path>>(path: P, fragment: &ConfigFragment) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let yaml = serde_yaml::to_string(fragment)?;
    fs::write(path, yaml)?;
    Ok(())
}

/// Returns the first configuration candidate present in `dir`.
pub fn find_config_in(dir: &Path) -> Option<PathBuf> {
    CONFIG_CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Walks upwards from `start` to the directory holding the workspace
/// configuration.
///
/// A configuration inside a git checkout belongs to a meta-repo mounted in
/// some outer workspace, so checkouts are passed over while an outer
/// directory with a configuration exists. The nearest directory that is not
/// a checkout wins; failing that, the outermost candidate.
pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    let candidates: Vec<&Path> = start
        .ancestors()
        .filter(|dir| find_config_in(dir).is_some())
        .collect();
    candidates
        .iter()
        .find(|dir| !vcs::is_cloned(dir))
        .or_else(|| candidates.last())
        .map(|dir| dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_fragment() {
        let yaml = r#"
workspace:
  name: platform
  repos_dir: nodes
nodes:
  - name: backend-monorepo
    url: https://example.com/backend-monorepo.git
  - name: tools
    url: https://example.com/tools.git
    fetch: lazy
  - name: team
    config: team/muno.yaml
"#;
        let fragment = parse(yaml).unwrap();
        assert_eq!(fragment.workspace.name, "platform");
        assert_eq!(fragment.workspace.repos_dir.as_deref(), Some("nodes"));
        assert_eq!(fragment.nodes.len(), 3);
        assert_eq!(fragment.nodes[0].fetch, FetchPolicy::Auto);
        assert_eq!(fragment.nodes[1].fetch, FetchPolicy::Lazy);
        assert_eq!(fragment.nodes[2].config_ref.as_deref(), Some("team/muno.yaml"));
        assert!(fragment.nodes[2].url.is_none());
    }

    #[test]
    fn test_parse_config_ref_alias() {
        let yaml = r#"
nodes:
  - name: team
    config_ref: /abs/team.yaml
"#;
        let fragment = parse(yaml).unwrap();
        assert_eq!(fragment.nodes[0].config_ref.as_deref(), Some("/abs/team.yaml"));
    }

    #[test]
    fn test_parse_empty_document() {
        let fragment = parse("   \n").unwrap();
        assert!(fragment.nodes.is_empty());
        assert!(fragment.workspace.repos_dir.is_none());
    }

    #[test]
    fn test_parse_unknown_fetch_policy_fails() {
        let yaml = r#"
nodes:
  - name: svc
    url: https://example.com/svc.git
    fetch: sometimes
"#;
        assert!(parse(yaml).is_err());
    }

    #[test]
    fn test_parse_rejects_duplicate_names() {
        let yaml = r#"
nodes:
  - name: svc
    url: https://example.com/a.git
  - name: svc
    url: https://example.com/b.git
"#;
        let err = parse(yaml).unwrap_err();
        assert!(matches!(err, Error::InvalidNodeDefinition { ref name, .. } if name == "svc"));
    }

    #[test]
    fn test_parse_rejects_nested_names() {
        let yaml = r#"
nodes:
  - name: a/b
    url: https://example.com/a.git
"#;
        assert!(matches!(
            parse(yaml),
            Err(Error::InvalidNodeDefinition { .. })
        ));
    }

    #[test]
    fn test_from_file_nonexistent_is_config_load() {
        let err = from_file("/nonexistent/muno.yaml").unwrap_err();
        match err {
            Error::ConfigLoad { path, .. } => {
                assert_eq!(path, PathBuf::from("/nonexistent/muno.yaml"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_file_malformed_is_config_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("muno.yaml");
        fs::write(&path, "nodes: [unclosed").unwrap();
        assert!(matches!(from_file(&path), Err(Error::ConfigLoad { .. })));
    }

    #[test]
    fn test_to_file_then_from_file_preserves_definitions() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/muno.yaml");

        let mut fragment = ConfigFragment::new_workspace("ws");
        fragment.nodes.push(
            NodeDefinition::repository("svc", "https://example.com/svc.git")
                .with_fetch(FetchPolicy::Eager),
        );
        fragment
            .nodes
            .push(NodeDefinition::config_reference("team", "team.yaml"));
        to_file(&path, &fragment).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("config: team.yaml"));
        assert!(!written.contains("fetch: auto"));
        assert_eq!(from_file(&path).unwrap(), fragment);
    }

    #[test]
    fn test_find_config_in_respects_candidate_order() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".muno.yml"), "").unwrap();
        fs::write(temp.path().join("muno.yml"), "").unwrap();
        assert_eq!(
            find_config_in(temp.path()),
            Some(temp.path().join("muno.yml"))
        );

        fs::write(temp.path().join("muno.yaml"), "").unwrap();
        assert_eq!(
            find_config_in(temp.path()),
            Some(temp.path().join("muno.yaml"))
        );
    }

    #[test]
    fn test_find_workspace_root_walks_upwards() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("muno.yaml"), "").unwrap();
        let deep = temp.path().join("repos/a/repos/b");
        fs::create_dir_all(&deep).unwrap();

        assert_eq!(find_workspace_root(&deep), Some(temp.path().to_path_buf()));
    }

    #[test]
    fn test_find_workspace_root_skips_nested_meta_repo() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("muno.yaml"), "").unwrap();
        let meta = temp.path().join("repos/backend-monorepo");
        fs::create_dir_all(meta.join(".git")).unwrap();
        fs::write(meta.join("muno.yaml"), "").unwrap();
        let deep = meta.join("src");
        fs::create_dir_all(&deep).unwrap();

        assert_eq!(find_workspace_root(&deep), Some(temp.path().to_path_buf()));
        assert_eq!(find_workspace_root(&meta), Some(temp.path().to_path_buf()));
    }

    #[test]
    fn test_find_workspace_root_accepts_checked_out_workspace() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("platform");
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("muno.yaml"), "").unwrap();

        assert_eq!(find_workspace_root(&root), Some(root.clone()));
    }

    #[test]
    fn test_fetch_policy_from_str() {
        assert_eq!("EAGER".parse::<FetchPolicy>(), Ok(FetchPolicy::Eager));
        assert_eq!("lazy".parse::<FetchPolicy>(), Ok(FetchPolicy::Lazy));
        assert!("never".parse::<FetchPolicy>().is_err());
    }
}
