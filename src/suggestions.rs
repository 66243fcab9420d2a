//! # Error Suggestions
//!
//! Turns library errors into user-facing errors that say what went wrong
//! and how to fix it, as `hint:` lines under the message.

use std::path::Path;

use crate::error::Error;

/// No workspace configuration above `start`.
pub fn workspace_not_found(start: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "No muno workspace found at or above {path}\n\n\
         hint: Run 'muno init' to create a workspace here\n\
         hint: Use --workspace to point at an existing workspace\n\
         hint: Set the MUNO_WORKSPACE environment variable",
        path = start.display()
    )
}

/// `path` does not exist; `siblings` are the names declared next to it.
pub fn node_not_found(path: &str, siblings: &[String]) -> anyhow::Error {
    let missing = crate::path::name(path);
    let candidates: Vec<&str> = siblings.iter().map(String::as_str).collect();
    let did_you_mean = find_similar(&missing, &candidates)
        .map(|s| format!("\nhint: Did you mean '{s}'?"))
        .unwrap_or_default();

    anyhow::anyhow!(
        "Node not found: {path}{did_you_mean}\n\n\
         hint: Run 'muno list' to see the children of the current node\n\
         hint: Run 'muno tree' to see the whole workspace"
    )
}

fn clone_failed(path: &str, url: &str, message: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Failed to clone {path} from {url}\n\
         error: {message}\n\n\
         hint: Check that the URL is correct and reachable\n\
         hint: For private repositories, check your SSH keys or credentials"
    )
}

fn not_cloned(path: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Repository is not cloned: {path}\n\n\
         hint: Run 'muno use {path}' or 'muno clone {path}' first"
    )
}

fn invalid_definition(name: &str, message: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Invalid node definition '{name}': {message}\n\n\
         hint: Each node needs exactly one of 'url' (a repository) or 'config' (a fragment)"
    )
}

/// Attach hints to a library error where there are useful ones.
pub fn explain(error: Error) -> anyhow::Error {
    match error {
        Error::CloneFailure { path, url, message } => clone_failed(&path, &url, &message),
        Error::NotCloned { path } => not_cloned(&path),
        Error::InvalidNodeDefinition { name, message } => invalid_definition(&name, &message),
        Error::NodeNotFound { path } => node_not_found(&path, &[]),
        other => anyhow::Error::new(other),
    }
}

/// Closest candidate within an edit distance of two.
fn find_similar<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .map(|&candidate| (candidate, edit_distance(input, candidate)))
        .filter(|&(_, distance)| distance <= 2 && distance < input.len())
        .min_by_key(|&(_, distance)| distance)
        .map(|(candidate, _)| candidate)
}

/// Levenshtein distance, computed one row at a time.
fn edit_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();

    for (i, a_char) in a.chars().enumerate() {
        let mut row = vec![i + 1; b_chars.len() + 1];
        for (j, b_char) in b_chars.iter().enumerate() {
            let substitution = previous[j] + usize::from(a_char != *b_char);
            row[j + 1] = substitution.min(previous[j + 1] + 1).min(row[j] + 1);
        }
        previous = row;
    }

    previous[b_chars.len()]
}
