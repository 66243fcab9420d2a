//! # Output Configuration
//!
//! Controls how the CLI renders nodes and repository states: whether colours
//! and symbols are used, and which ones.
//!
//! ## Respecting User Preferences
//!
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals

use std::env;

use console::Style;

use crate::node::{Node, NodeKind, NodeStatus, RepoState};

/// Output configuration for controlling colors and symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    /// Build from the value of `--color`: `always`, `never` or `auto`.
    ///
    /// In auto mode, colors are disabled when `NO_COLOR` is set (to any
    /// value), `CLICOLOR=0`, `TERM=dumb`, or stdout is not a terminal unless
    /// `CLICOLOR_FORCE` asks for them.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };
        Self { use_color }
    }

    fn detect_color_support() -> bool {
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }
        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }
        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }
        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }
        console::Term::stdout().features().colors_supported()
    }

    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    pub fn without_color() -> Self {
        Self { use_color: false }
    }

    fn paint(&self, style: Style, text: &str) -> String {
        if self.use_color {
            style.apply_to(text).to_string()
        } else {
            text.to_string()
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// The emoji when colors are enabled, the plain alternative otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

fn state_style(state: RepoState) -> Style {
    match state {
        RepoState::Missing => Style::new().dim(),
        RepoState::Cloned => Style::new().green(),
        RepoState::Modified => Style::new().yellow(),
        RepoState::Ahead => Style::new().cyan(),
        RepoState::Behind => Style::new().magenta(),
        RepoState::Diverged => Style::new().red().bold(),
    }
}

/// A repository state as a (possibly colored) label.
pub fn state_label(config: &OutputConfig, state: RepoState) -> String {
    config.paint(state_style(state), state.as_str())
}

/// One-line label for a node in listings and trees:
/// `name [state, lazy, branch]` for repositories, `name/` for config
/// references and `/` for the root.
pub fn node_label(config: &OutputConfig, node: &Node, status: Option<&NodeStatus>) -> String {
    let name = match node.kind {
        NodeKind::Root => "/".to_string(),
        NodeKind::ConfigReference | NodeKind::Directory => {
            config.paint(Style::new().blue().bold(), &format!("{}/", node.name))
        }
        NodeKind::Repository => config.paint(Style::new().bold(), &node.name),
    };

    let Some(status) = status else {
        return name;
    };

    let mut details = vec![state_label(config, status.state)];
    if status.lazy && !status.cloned {
        details.push("lazy".to_string());
    }
    if let Some(branch) = &status.branch {
        details.push(branch.clone());
    }
    if status.error.is_some() {
        details.push(emoji(config, "⚠️", "!").to_string());
    }
    format!("{} [{}]", name, details.join(", "))
}
