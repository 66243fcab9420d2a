//! Logical path utilities and the filesystem path resolver.
//!
//! Logical paths are slash-delimited and always absolute once normalized
//! (`/`, `/backend-monorepo`, `/backend-monorepo/payment-service`). They are
//! independent of where anything lives on disk; [`PathResolver`] is the one
//! place that maps them to filesystem locations.

use std::path::{Path, PathBuf};

use log::debug;

use crate::config;
use crate::defaults::DEFAULT_REPOS_DIR;

/// Normalize a logical path: make it absolute, collapse repeated slashes and
/// resolve `.` and `..` segments. `..` above the root stays at the root.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Resolve `target` against `current`. Absolute targets ignore `current`; an
/// empty target resolves to `current`.
pub fn resolve(current: &str, target: &str) -> String {
    let target = target.trim();
    if target.starts_with('/') {
        normalize(target)
    } else if target.is_empty() {
        normalize(current)
    } else {
        normalize(&format!("{}/{}", current, target))
    }
}

/// Append a child name to a normalized parent path.
pub fn join(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), name)
    }
}

/// Parent of a normalized path; `None` for the root.
pub fn parent(path: &str) -> Option<String> {
    let path = normalize(path);
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/".to_string()),
        Some(idx) => Some(path[..idx].to_string()),
        None => Some("/".to_string()),
    }
}

/// Segments of a logical path, without empty, `.` or `..` parts.
pub fn segments(path: &str) -> Vec<String> {
    normalize(path)
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Last segment of a logical path; empty for the root.
pub fn name(path: &str) -> String {
    segments(path).pop().unwrap_or_default()
}

pub fn is_root(path: &str) -> bool {
    normalize(path) == "/"
}

/// Repository subdirectory declared by the configuration file found in
/// `node_dir`, or the default when there is none.
///
/// Unreadable configuration falls back to the default; resolution of the
/// fragment itself reports the problem.
pub fn nested_repos_dir(node_dir: &Path) -> String {
    let Some(config_path) = config::find_config_in(node_dir) else {
        return DEFAULT_REPOS_DIR.to_string();
    };
    match config::from_file(&config_path) {
        Ok(fragment) => sanitize_repos_dir(fragment.workspace.repos_dir.as_deref()),
        Err(e) => {
            debug!(
                "Ignoring unreadable config {} for path resolution: {}",
                config_path.display(),
                e
            );
            DEFAULT_REPOS_DIR.to_string()
        }
    }
}

/// Directory holding the children of the node located at `node_dir`.
pub fn children_dir(node_dir: &Path) -> PathBuf {
    node_dir.join(nested_repos_dir(node_dir))
}

fn sanitize_repos_dir(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(dir) if !dir.is_empty() && !Path::new(dir).is_absolute() && !dir.contains("..") => {
            dir.trim_matches('/').to_string()
        }
        _ => DEFAULT_REPOS_DIR.to_string(),
    }
}

/// Maps logical paths to filesystem locations.
///
/// Computation only inspects configuration files already on disk; it never
/// clones or creates directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    workspace_root: PathBuf,
    repos_dir: String,
}

impl PathResolver {
    /// A resolver for `workspace_root` whose top-level nodes live under
    /// `repos_dir` (the default when `None`).
    pub fn new(workspace_root: impl Into<PathBuf>, repos_dir: Option<&str>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            repos_dir: sanitize_repos_dir(repos_dir),
        }
    }

    /// A resolver reading the top-level repository subdirectory from the
    /// workspace's own configuration file.
    pub fn for_workspace(workspace_root: impl Into<PathBuf>) -> Self {
        let workspace_root = workspace_root.into();
        let repos_dir = nested_repos_dir(&workspace_root);
        Self {
            workspace_root,
            repos_dir,
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn repos_dir(&self) -> &str {
        &self.repos_dir
    }

    /// Location of the logical root: `<workspace>/<repos_dir>`.
    pub fn root_dir(&self) -> PathBuf {
        self.workspace_root.join(&self.repos_dir)
    }

    /// Filesystem location of `logical_path`.
    ///
    /// Each ancestor below the root contributes `<name>/<its repos dir>`,
    /// where the repos dir comes from a configuration file inside that
    /// ancestor if one exists.
    pub fn compute_filesystem_path(&self, logical_path: &str) -> PathBuf {
        let segments = segments(logical_path);
        let mut dir = self.root_dir();
        for (idx, segment) in segments.iter().enumerate() {
            dir.push(segment);
            if idx + 1 < segments.len() {
                dir = children_dir(&dir);
            }
        }
        dir
    }
}
