//! End-to-end tests for `use`, `current`, `list`, `tree` and `status`.
//!
//! Every repository in these workspaces is lazy and never cloned, so no
//! test needs network access.

mod common;

use common::prelude::*;

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_current_defaults_to_root() {
    let fixture = TestFixture::new().with_config(configs::LAZY_PAIR);

    fixture
        .command()
        .arg("current")
        .assert()
        .success()
        .stdout("/\n");
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_list_shows_children_with_state() {
    let fixture = TestFixture::new().with_team();

    fixture
        .command()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("api [missing, lazy]"))
        .stdout(predicate::str::contains("team/"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_use_config_reference_persists_position() {
    let fixture = TestFixture::new().with_team();

    fixture
        .command()
        .arg("use")
        .arg("team")
        .assert()
        .success()
        .stdout(predicate::str::contains("/team"));
    fixture
        .child(".muno-current")
        .assert(predicate::str::contains("/team"));

    fixture
        .command()
        .arg("current")
        .assert()
        .success()
        .stdout("/team\n");

    // Relative paths now resolve against /team.
    fixture
        .command()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("payments [missing, lazy]"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_use_missing_node_suggests_sibling() {
    let fixture = TestFixture::new().with_team();

    fixture
        .command()
        .arg("use")
        .arg("/tema")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Node not found: /tema"))
        .stderr(predicate::str::contains("Did you mean 'team'?"));

    fixture
        .command()
        .arg("current")
        .assert()
        .success()
        .stdout("/\n");
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_tree_text_includes_referenced_fragment() {
    let fixture = TestFixture::new().with_team();

    fixture
        .command()
        .arg("tree")
        .assert()
        .success()
        .stdout(predicate::str::contains("team/"))
        .stdout(predicate::str::contains("payments [missing, lazy]"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_tree_depth_zero_shows_only_start() {
    let fixture = TestFixture::new().with_team();

    fixture
        .command()
        .arg("tree")
        .arg("--depth")
        .arg("0")
        .assert()
        .success()
        .stdout(predicate::str::contains("api").not());
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_tree_json_is_parseable() {
    let fixture = TestFixture::new().with_team();

    let output = fixture
        .command()
        .arg("tree")
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let view: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(view["root"], "/");
    assert_eq!(view["nodes"]["/team"]["kind"], "config-reference");
    assert_eq!(view["nodes"]["/team/payments"]["kind"], "repository");
    assert_eq!(view["statuses"]["/api"]["state"], "missing");
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_status_recursive_covers_subtree() {
    let fixture = TestFixture::new().with_team();

    fixture
        .command()
        .arg("status")
        .arg("/")
        .arg("--recursive")
        .assert()
        .success()
        .stdout(predicate::str::contains("/api"))
        .stdout(predicate::str::contains("/team/payments"))
        .stdout(predicate::str::contains("(lazy)"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_commands_work_from_subdirectory() {
    let fixture = TestFixture::new().with_team();

    fixture
        .command()
        .current_dir(fixture.path().join("repos/team"))
        .arg("list")
        .arg("/team")
        .assert()
        .success()
        .stdout(predicate::str::contains("payments"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_commands_from_inside_meta_repo_use_outer_workspace() {
    let fixture = TestFixture::new()
        .with_config(configs::LAZY_PAIR)
        .with_checkout("repos/api")
        .with_file(
            "repos/api/muno.yaml",
            "nodes:\n  - name: plugins\n    url: https://example.invalid/plugins.git\n    fetch: lazy\n",
        )
        .with_file("repos/api/src/.keep", "");

    fixture
        .command()
        .current_dir(fixture.path().join("repos/api/src"))
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("api"))
        .stdout(predicate::str::contains("web"));

    fixture
        .command()
        .current_dir(fixture.path().join("repos/api"))
        .arg("tree")
        .assert()
        .success()
        .stdout(predicate::str::contains("plugins"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_workspace_flag_and_env() {
    let fixture = TestFixture::new().with_config(configs::LAZY_PAIR);
    let elsewhere = TempDir::new().unwrap();

    fixture
        .command()
        .current_dir(elsewhere.path())
        .arg("--workspace")
        .arg(fixture.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("web"));

    fixture
        .command()
        .current_dir(elsewhere.path())
        .env("MUNO_WORKSPACE", fixture.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("api"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_sync_leaves_lazy_repositories_alone() {
    let fixture = TestFixture::new().with_team();

    fixture
        .command()
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 repositories on disk, 2 lazy"));
    fixture.child("repos/api").assert(predicate::path::missing());
}
