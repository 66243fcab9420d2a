//! # Version Control Client
//!
//! The navigation engine never talks to git directly. Everything it needs from
//! version control goes through the [`VersionControlClient`] trait, which keeps
//! the engine testable and lets callers swap in another implementation.
//!
//! - **`GitClient`**: the default implementation, which shells out to the
//!   system `git` command. Using the system binary means SSH keys, credential
//!   helpers and anything else configured in `~/.gitconfig` just work.
//! - **`RecordingClient`**: an in-process implementation that records clone
//!   calls and materialises a `.git` marker plus seeded files instead of
//!   touching the network. Used by tests and dry runs.
//!
//! Any error returned by a status probe means "unknown for that aspect"; the
//! navigators record it on the status and carry on.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use log::{debug, info};

use crate::error::{Error, Result};

/// Operations the engine delegates to version control.
pub trait VersionControlClient: Send + Sync {
    /// Clone `url` into `dest`. `dest` must not exist or be empty.
    fn clone_repository(&self, url: &str, dest: &Path) -> Result<()>;

    /// Name of the checked-out branch.
    fn current_branch(&self, path: &Path) -> Result<String>;

    /// URL of the `origin` remote.
    fn remote_url(&self, path: &Path) -> Result<String>;

    /// Whether the working tree has uncommitted changes.
    fn has_local_changes(&self, path: &Path) -> Result<bool>;

    /// Commits ahead of and behind the upstream branch.
    ///
    /// Clients that cannot tell report `(0, 0)`.
    fn ahead_behind(&self, _path: &Path) -> Result<(usize, usize)> {
        Ok((0, 0))
    }
}

/// Whether `dir` holds a git checkout.
pub fn is_cloned(dir: &Path) -> bool {
    dir.join(".git").exists()
}

/// `VersionControlClient` backed by the system `git` command.
#[derive(Debug, Default, Clone)]
pub struct GitClient;

impl GitClient {
    pub fn new() -> Self {
        Self
    }

    fn run(&self, dir: &Path, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .map_err(|e| Error::GitCommand {
                command: args.join(" "),
                path: dir.to_path_buf(),
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(Error::GitCommand {
                command: args.join(" "),
                path: dir.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl VersionControlClient for GitClient {
    fn clone_repository(&self, url: &str, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        info!("Cloning {} into {}", url, dest.display());
        let output = Command::new("git")
            .args(["clone", "--quiet", url])
            .arg(dest)
            .output()
            .map_err(|e| Error::CloneFailure {
                path: dest.display().to_string(),
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);

            let message = if stderr.contains("Authentication failed")
                || stderr.contains("Permission denied")
                || stderr.contains("Could not read from remote repository")
            {
                format!(
                    "Authentication failed. Make sure you have access to the repository.\n\
                    For private repos, ensure you have:\n\
                    - SSH key added to ssh-agent\n\
                    - Git credentials configured\n\
                    - Personal access token set up\n\
                    Error: {}",
                    stderr.trim()
                )
            } else {
                stderr.trim().to_string()
            };

            return Err(Error::CloneFailure {
                path: dest.display().to_string(),
                url: url.to_string(),
                message,
            });
        }

        Ok(())
    }

    fn current_branch(&self, path: &Path) -> Result<String> {
        self.run(path, &["rev-parse", "--abbrev-ref", "HEAD"])
    }

    fn remote_url(&self, path: &Path) -> Result<String> {
        self.run(path, &["remote", "get-url", "origin"])
    }

    fn has_local_changes(&self, path: &Path) -> Result<bool> {
        let porcelain = self.run(path, &["status", "--porcelain"])?;
        Ok(!porcelain.is_empty())
    }

    fn ahead_behind(&self, path: &Path) -> Result<(usize, usize)> {
        let counts = self.run(
            path,
            &["rev-list", "--left-right", "--count", "HEAD...@{upstream}"],
        )?;
        parse_left_right_counts(&counts).ok_or_else(|| Error::GitCommand {
            command: "rev-list --left-right --count".to_string(),
            path: path.to_path_buf(),
            stderr: format!("unexpected output '{}'", counts),
        })
    }
}

/// Parse the `<ahead>\t<behind>` output of `git rev-list --left-right --count`.
fn parse_left_right_counts(output: &str) -> Option<(usize, usize)> {
    let mut parts = output.split_whitespace();
    let ahead = parts.next()?.parse().ok()?;
    let behind = parts.next()?.parse().ok()?;
    Some((ahead, behind))
}

/// A `VersionControlClient` that never leaves the process.
///
/// Cloning creates `<dest>/.git` and writes any files seeded for the URL, so
/// auto-discovery inside "cloned" repositories can be exercised. Every clone
/// call is recorded, including failed ones.
#[derive(Debug, Default)]
pub struct RecordingClient {
    clones: Mutex<Vec<(String, PathBuf)>>,
    seeds: Mutex<HashMap<String, Vec<(String, String)>>>,
    failures: Mutex<HashMap<String, String>>,
    dirty: Mutex<Vec<PathBuf>>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files written into the checkout whenever `url` is cloned.
    pub fn with_files(self, url: &str, files: &[(&str, &str)]) -> Self {
        if let Ok(mut seeds) = self.seeds.lock() {
            seeds.insert(
                url.to_string(),
                files
                    .iter()
                    .map(|(path, content)| (path.to_string(), content.to_string()))
                    .collect(),
            );
        }
        self
    }

    /// Make every clone of `url` fail with `message`.
    pub fn fail_url(self, url: &str, message: &str) -> Self {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(url.to_string(), message.to_string());
        }
        self
    }

    /// Report uncommitted changes for the checkout at `path`.
    pub fn mark_dirty(&self, path: &Path) {
        if let Ok(mut dirty) = self.dirty.lock() {
            dirty.push(path.to_path_buf());
        }
    }

    pub fn clone_count(&self) -> usize {
        self.clones.lock().map(|c| c.len()).unwrap_or_default()
    }

    /// URLs passed to `clone_repository`, in call order.
    pub fn cloned_urls(&self) -> Vec<String> {
        self.clones
            .lock()
            .map(|c| c.iter().map(|(url, _)| url.clone()).collect())
            .unwrap_or_default()
    }

    fn poisoned(context: &str) -> Error {
        Error::LockPoisoned {
            context: context.to_string(),
        }
    }
}

impl VersionControlClient for RecordingClient {
    fn clone_repository(&self, url: &str, dest: &Path) -> Result<()> {
        self.clones
            .lock()
            .map_err(|_| Self::poisoned("recording client clones"))?
            .push((url.to_string(), dest.to_path_buf()));

        if let Some(message) = self
            .failures
            .lock()
            .map_err(|_| Self::poisoned("recording client failures"))?
            .get(url)
        {
            return Err(Error::CloneFailure {
                path: dest.display().to_string(),
                url: url.to_string(),
                message: message.clone(),
            });
        }

        debug!("Recording clone of {} into {}", url, dest.display());
        fs::create_dir_all(dest.join(".git"))?;
        let seeds = self
            .seeds
            .lock()
            .map_err(|_| Self::poisoned("recording client seeds"))?;
        for (relative, content) in seeds.get(url).into_iter().flatten() {
            let target = dest.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(target, content)?;
        }
        Ok(())
    }

    fn current_branch(&self, _path: &Path) -> Result<String> {
        Ok("main".to_string())
    }

    fn remote_url(&self, path: &Path) -> Result<String> {
        let clones = self
            .clones
            .lock()
            .map_err(|_| Self::poisoned("recording client clones"))?;
        clones
            .iter()
            .rev()
            .find(|(_, dest)| dest == path)
            .map(|(url, _)| url.clone())
            .ok_or_else(|| Error::GitCommand {
                command: "remote get-url origin".to_string(),
                path: path.to_path_buf(),
                stderr: "no origin recorded".to_string(),
            })
    }

    fn has_local_changes(&self, path: &Path) -> Result<bool> {
        Ok(self
            .dirty
            .lock()
            .map_err(|_| Self::poisoned("recording client dirty set"))?
            .iter()
            .any(|p| p == path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_left_right_counts() {
        assert_eq!(parse_left_right_counts("2\t5"), Some((2, 5)));
        assert_eq!(parse_left_right_counts("0 0\n"), Some((0, 0)));
        assert_eq!(parse_left_right_counts("x\t1"), None);
        assert_eq!(parse_left_right_counts(""), None);
    }

    #[test]
    fn test_is_cloned_checks_git_dir() {
        let temp = TempDir::new().unwrap();
        assert!(!is_cloned(temp.path()));
        fs::create_dir(temp.path().join(".git")).unwrap();
        assert!(is_cloned(temp.path()));
    }

    #[test]
    fn test_recording_client_materialises_checkout() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("repos/svc");
        let client = RecordingClient::new().with_files(
            "https://example.com/svc.git",
            &[("muno.yaml", "nodes: []\n"), ("src/lib.rs", "")],
        );

        client
            .clone_repository("https://example.com/svc.git", &dest)
            .unwrap();

        assert!(is_cloned(&dest));
        assert!(dest.join("muno.yaml").is_file());
        assert!(dest.join("src/lib.rs").is_file());
        assert_eq!(client.clone_count(), 1);
        assert_eq!(
            client.remote_url(&dest).unwrap(),
            "https://example.com/svc.git"
        );
    }

    #[test]
    fn test_recording_client_failure_is_recorded() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("svc");
        let client = RecordingClient::new().fail_url("https://example.com/svc.git", "denied");

        let err = client
            .clone_repository("https://example.com/svc.git", &dest)
            .unwrap_err();
        assert!(err.to_string().contains("denied"));
        assert!(!dest.exists());
        assert_eq!(client.cloned_urls(), vec!["https://example.com/svc.git"]);
    }

    #[test]
    fn test_recording_client_dirty_paths() {
        let client = RecordingClient::new();
        let path = PathBuf::from("/ws/repos/svc");
        assert!(!client.has_local_changes(&path).unwrap());
        client.mark_dirty(&path);
        assert!(client.has_local_changes(&path).unwrap());
        assert_eq!(client.ahead_behind(&path).unwrap(), (0, 0));
    }

    // GitClient needs a git binary; the CLI end-to-end tests exercise it.
}
