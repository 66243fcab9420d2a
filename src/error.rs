//! # Error Handling
//!
//! This module defines the centralized error type for `muno`. It uses the
//! `thiserror` library to build a single `Error` enum covering every failure
//! the navigation and resolution engine can report, each variant carrying
//! enough context (logical path, node name, fragment path) to act on.
//!
//! ## Key Components
//!
//! - **`Error`**: The enum of all anticipated failure modes:
//!   - unknown logical paths,
//!   - invalid node definitions (both or neither of `url` / `config`),
//!   - configuration fragments that are missing, unreadable or malformed,
//!   - circular configuration references,
//!   - clone failures reported by the version control client,
//!   - lazy/status operations on nodes that are not repositories.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! Degraded situations (a nested fragment that fails to load, a cycle that is
//! truncated) are logged as warnings by the resolver and never surface as an
//! `Error`; the `CircularConfigReference` variant exists so the warning text
//! and callers that want a hard failure share one description.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for muno operations
#[derive(Error, Debug)]
pub enum Error {
    /// No node exists at the given logical path.
    #[error("Node not found: {path}")]
    NodeNotFound { path: String },

    /// A node definition sets both or neither of `url` and `config`.
    #[error("Invalid node definition '{name}': {message}")]
    InvalidNodeDefinition { name: String, message: String },

    /// A configuration fragment could not be read or parsed.
    #[error("Failed to load configuration {}: {message}", path.display())]
    ConfigLoad { path: PathBuf, message: String },

    /// A configuration fragment references itself through its descendants.
    #[error("Circular configuration reference: {cycle}")]
    CircularConfigReference { cycle: String },

    /// The version control client failed to clone a node.
    #[error("Failed to clone {path} from {url}: {message}")]
    CloneFailure {
        path: String,
        url: String,
        message: String,
    },

    /// A lazy-load or status operation targeted a node that is not a repository.
    #[error("Not a repository: {path}")]
    NotARepository { path: String },

    /// A mutation targeted a repository that has not been cloned yet.
    #[error("Repository is not cloned: {path}")]
    NotCloned { path: String },

    /// A node with the same name is already declared under the parent.
    #[error("Node '{name}' already exists under {parent}")]
    DuplicateNode { parent: String, name: String },

    /// A git command exited unsuccessfully.
    #[error("Git command failed in {}: {command} - {stderr}", path.display())]
    GitCommand {
        command: String,
        path: PathBuf,
        stderr: String,
    },

    /// An error indicating that a lock has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML error, wrapped from `serde_yaml::Error`.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Wrap any displayable cause as a `ConfigLoad` error for `path`.
    pub fn config_load(path: impl Into<PathBuf>, cause: impl std::fmt::Display) -> Self {
        Error::ConfigLoad {
            path: path.into(),
            message: cause.to_string(),
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_node_not_found() {
        let error = Error::NodeNotFound {
            path: "/backend/payments".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("Node not found"));
        assert!(display.contains("/backend/payments"));
    }

    #[test]
    fn test_error_display_invalid_definition_names_node() {
        let error = Error::InvalidNodeDefinition {
            name: "broken".to_string(),
            message: "both url and config are set".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("'broken'"));
        assert!(display.contains("both url and config"));
    }

    #[test]
    fn test_error_display_config_load_includes_path() {
        let error = Error::config_load("/ws/team/muno.yaml", "file not found");
        let display = format!("{}", error);
        assert!(display.contains("/ws/team/muno.yaml"));
        assert!(display.contains("file not found"));
    }

    #[test]
    fn test_error_display_clone_failure() {
        let error = Error::CloneFailure {
            path: "/svc".to_string(),
            url: "https://example.com/svc.git".to_string(),
            message: "Authentication failed".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("/svc"));
        assert!(display.contains("https://example.com/svc.git"));
        assert!(display.contains("Authentication failed"));
    }

    #[test]
    fn test_error_display_cycle() {
        let error = Error::CircularConfigReference {
            cycle: "a.yaml -> b.yaml -> a.yaml".to_string(),
        };
        assert!(error.to_string().contains("a.yaml -> b.yaml -> a.yaml"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let error: Error = io_error.into();
        let display = format!("{}", error);
        assert!(display.contains("I/O error"));
        assert!(display.contains("File not found"));
    }

    #[test]
    fn test_error_from_yaml_error() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: [unclosed").unwrap_err();
        let error: Error = yaml_error.into();
        assert!(error.to_string().contains("YAML error"));
    }
}
