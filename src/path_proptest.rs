//! Property-based tests for logical path handling.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use crate::path::{join, normalize, parent, resolve, segments, PathResolver};
    use proptest::prelude::*;
    use std::path::Path;

    fn segment() -> impl Strategy<Value = String> {
        "[a-z0-9][a-z0-9_-]{0,11}"
    }

    fn logical_path() -> impl Strategy<Value = String> {
        prop::collection::vec(segment(), 0..6).prop_map(|parts| format!("/{}", parts.join("/")))
    }

    fn messy_path() -> impl Strategy<Value = String> {
        prop::collection::vec(
            prop_oneof![segment(), Just(".".to_string()), Just("..".to_string()), Just(String::new())],
            0..8,
        )
        .prop_map(|parts| parts.join("/"))
    }

    // ============================================================================
    // normalize / resolve
    // ============================================================================

    proptest! {
        /// Property: normalize is idempotent
        #[test]
        fn normalize_is_idempotent(input in messy_path()) {
            let once = normalize(&input);
            prop_assert_eq!(normalize(&once), once);
        }

        /// Property: normalized paths are absolute, without empty or dot segments
        #[test]
        fn normalize_produces_canonical_form(input in messy_path()) {
            let result = normalize(&input);
            prop_assert!(result.starts_with('/'));
            prop_assert!(result == "/" || !result.ends_with('/'));
            for part in segments(&result) {
                prop_assert!(!part.is_empty() && part != "." && part != "..");
            }
        }

        /// Property: absolute targets ignore the current path
        #[test]
        fn resolve_absolute_ignores_current(current in logical_path(), target in logical_path()) {
            prop_assert_eq!(resolve(&current, &target), normalize(&target));
        }

        /// Property: a relative child resolves below the current path
        #[test]
        fn resolve_relative_child(current in logical_path(), name in segment()) {
            prop_assert_eq!(resolve(&current, &name), join(&current, &name));
        }

        /// Property: ".." from a child returns to the parent
        #[test]
        fn resolve_dotdot_returns_to_parent(current in logical_path(), name in segment()) {
            let child = join(&current, &name);
            prop_assert_eq!(resolve(&child, ".."), current.clone());
            prop_assert_eq!(parent(&child), Some(current));
        }
    }

    // ============================================================================
    // PathResolver
    // ============================================================================

    proptest! {
        /// Property: compute_filesystem_path is deterministic and stays
        /// under the workspace
        #[test]
        fn compute_filesystem_path_is_deterministic(logical in logical_path()) {
            let resolver = PathResolver::new("/nonexistent-workspace", None);
            let first = resolver.compute_filesystem_path(&logical);
            let second = resolver.compute_filesystem_path(&logical);
            prop_assert_eq!(&first, &second);
            prop_assert!(first.starts_with(Path::new("/nonexistent-workspace/repos")));
        }

        /// Property: without nested configuration every segment after the
        /// first adds a default repos directory
        #[test]
        fn compute_filesystem_path_default_layout(parts in prop::collection::vec(segment(), 1..5)) {
            let resolver = PathResolver::new("/nonexistent-workspace", None);
            let logical = format!("/{}", parts.join("/"));
            let expected = format!("/nonexistent-workspace/repos/{}", parts.join("/repos/"));
            prop_assert_eq!(
                resolver.compute_filesystem_path(&logical),
                Path::new(&expected).to_path_buf()
            );
        }

        /// Property: equivalent logical spellings map to the same directory
        #[test]
        fn compute_filesystem_path_ignores_spelling(logical in logical_path()) {
            let resolver = PathResolver::new("/nonexistent-workspace", Some("nodes"));
            let spelled = format!("{}/./", logical.replace('/', "//"));
            prop_assert_eq!(
                resolver.compute_filesystem_path(&spelled),
                resolver.compute_filesystem_path(&logical)
            );
        }
    }
}
