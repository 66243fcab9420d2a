//! Shared test utilities for integration and E2E tests.
//!
//! Add `mod common;` to a test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! let fixture = TestFixture::new().with_config(configs::LAZY_PAIR);
//! fixture.command().arg("list").assert().success();
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
#[allow(unused_imports)]
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    pub use super::configs;
    pub use super::TestFixture;
}

/// Workspace configurations used across tests. None of them needs network
/// access: every repository is lazy or never cloned.
#[allow(dead_code)]
pub mod configs {
    /// Two lazy repositories at the root.
    pub const LAZY_PAIR: &str = r#"
workspace:
  name: fixture
nodes:
  - name: api
    url: https://example.invalid/api.git
    fetch: lazy
  - name: web
    url: https://example.invalid/web.git
    fetch: lazy
"#;

    /// A lazy repository and a config reference shipped with the workspace.
    pub const WITH_TEAM: &str = r#"
workspace:
  name: fixture
nodes:
  - name: api
    url: https://example.invalid/api.git
    fetch: lazy
  - name: team
    config: team.yaml
"#;

    /// Fragment for `repos/team/team.yaml` in [`WITH_TEAM`].
    pub const TEAM_FRAGMENT: &str = r#"
nodes:
  - name: payments
    url: https://example.invalid/payments.git
    fetch: lazy
"#;

    /// A node setting both url and config.
    pub const INVALID_NODE: &str = r#"
nodes:
  - name: broken
    url: https://example.invalid/broken.git
    config: broken.yaml
"#;
}

/// A temporary workspace directory.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Write `muno.yaml` with the given content.
    pub fn with_config(self, content: &str) -> Self {
        self.with_file("muno.yaml", content)
    }

    /// Write the `team` fragment of [`configs::WITH_TEAM`].
    pub fn with_team(self) -> Self {
        self.with_config(configs::WITH_TEAM)
            .with_file("repos/team/team.yaml", configs::TEAM_FRAGMENT)
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Make `relative_dir` look like a git checkout.
    pub fn with_checkout(self, relative_dir: &str) -> Self {
        self.temp_dir
            .child(relative_dir)
            .child(".git")
            .create_dir_all()
            .expect("Failed to create checkout");
        self
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.temp_dir.path().join("muno.yaml")
    }

    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// A command for the `muno` binary running inside this workspace.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("muno");
        cmd.current_dir(self.path())
            .env_remove("MUNO_WORKSPACE")
            .env_remove("RUST_LOG")
            .arg("--color=never");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
