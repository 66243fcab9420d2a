//! # Muno Library
//!
//! Core of the `muno` command-line tool: a logical tree of git repositories
//! assembled from configuration fragments spread across the workspace, with
//! repositories cloned lazily when navigated to or eagerly when their name
//! marks them as meta-repositories.
//!
//! ## Quick Example
//!
//! ```
//! use muno::config;
//! use muno::navigator::{MemoryNavigator, Navigator};
//!
//! let fragment = config::parse(r#"
//! nodes:
//!   - name: backend-monorepo
//!     url: https://example.com/backend-monorepo.git
//!   - name: tools
//!     url: https://example.com/tools.git
//!     fetch: lazy
//! "#).unwrap();
//!
//! let nav = MemoryNavigator::from_config(&fragment).unwrap();
//! assert!(nav.is_lazy("/tools").unwrap());
//! assert!(!nav.is_lazy("/backend-monorepo").unwrap());
//!
//! nav.navigate("tools").unwrap();
//! assert_eq!(nav.current_path().unwrap(), "/tools");
//! assert!(nav.get_node_status("/tools").unwrap().cloned);
//! ```
//!
//! ## Core Concepts
//!
//! - **Nodes (`node`)**: what the configuration declares (repositories and
//!   references to other fragments) and the status derived for them.
//! - **Configuration (`config`)**: the `muno.yaml` document format.
//! - **Resolution (`resolver`)**: loading fragments, choosing fetch policies,
//!   discovering fragments inside cloned repositories, and guarding against
//!   fragments that reference each other.
//! - **Paths (`path`)**: logical path algebra and the mapping from logical
//!   paths to directories.
//! - **Navigation (`navigator`)**: one contract with filesystem, in-memory
//!   and caching implementations.
//! - **Orchestration (`manager`)**: the operations the CLI exposes.
//! - **Version control (`vcs`)**: the client cloning and inspecting
//!   repositories.

pub mod config;
pub mod defaults;
pub mod error;
pub mod manager;
pub mod navigator;
pub mod node;
pub mod output;
pub mod path;
pub mod resolver;
pub mod suggestions;
pub mod vcs;

#[cfg(test)]
mod path_proptest;
