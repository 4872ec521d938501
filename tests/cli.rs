//! End-to-end tests for the revkb binary
//!
//! Each test runs in its own temporary repository.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

fn revkb(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("revkb").unwrap();
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env("NO_COLOR", "1")
        .env_remove("REVKB_DATABASE")
        .env_remove("REVKB_CONFIG")
        .env_remove("REVKB_USER")
        .env_remove("RUST_LOG");
    cmd
}

fn init_repo() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    revkb(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized revkb repository"));
    dir
}

fn json_output(cmd: &mut Command) -> Value {
    let assert = cmd.assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    serde_json::from_str(&stdout).unwrap()
}

/// Create an accepted work and return its gid
fn create_work(dir: &TempDir, alias: &str) -> String {
    let out = json_output(revkb(dir).args(["create", "--kind", "work", "-a", alias, "--apply", "--json"]));
    assert_eq!(out["applied"], true);
    out["gid"].as_str().unwrap().to_string()
}

#[test]
fn test_commands_require_init() {
    let dir = tempfile::tempdir().unwrap();
    revkb(&dir)
        .args(["search", "dune"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("revkb init"));
}

#[test]
fn test_init_twice_needs_force() {
    let dir = init_repo();
    revkb(&dir)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
    revkb(&dir).args(["init", "--force"]).assert().success();
}

#[test]
fn test_create_and_show() {
    let dir = init_repo();
    let gid = create_work(&dir, "Dune");

    revkb(&dir)
        .args(["show", &gid])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dune"))
        .stdout(predicate::str::contains("work"));

    let out = json_output(revkb(&dir).args(["show", &gid, "--json"]));
    assert_eq!(out["entity"]["gid"], gid.as_str());
    assert_eq!(out["tree"]["aliases"][0]["name"], "Dune");
    assert!(out["entity"]["master_revision_id"].is_i64());
}

#[test]
fn test_create_without_kind_fails() {
    let dir = init_repo();
    revkb(&dir)
        .args(["create", "-a", "Dune"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("kind"));

    let stats = json_output(revkb(&dir).args(["stats", "--json"]));
    assert_eq!(stats["entities"], 0);
    assert_eq!(stats["open_edits"], 0);
}

#[test]
fn test_default_kind_from_config() {
    let dir = init_repo();
    revkb(&dir)
        .args(["config", "core.default_kind", "creator"])
        .assert()
        .success();

    let out = json_output(revkb(&dir).args(["create", "-a", "Frank Herbert", "--apply", "--json"]));
    let gid = out["gid"].as_str().unwrap();

    let shown = json_output(revkb(&dir).args(["show", gid, "--json"]));
    assert_eq!(shown["tree"]["data"]["kind"], "creator");
}

#[test]
fn test_unapplied_create_is_pending() {
    let dir = init_repo();
    let out = json_output(revkb(&dir).args(["create", "--kind", "work", "-a", "Dune", "--json"]));
    assert_eq!(out["applied"], false);
    let gid = out["gid"].as_str().unwrap().to_string();
    let edit_id = out["edit_id"].as_i64().unwrap().to_string();

    revkb(&dir)
        .args(["show", &gid])
        .assert()
        .success()
        .stdout(predicate::str::contains("No accepted revision yet"));

    // Not searchable until accepted
    let hits = json_output(revkb(&dir).args(["search", "dune", "--json"]));
    assert_eq!(hits.as_array().unwrap().len(), 0);

    revkb(&dir).args(["edit", "apply", &edit_id]).assert().success();

    let hits = json_output(revkb(&dir).args(["search", "dune", "--json"]));
    assert_eq!(hits[0]["gid"], gid.as_str());
}

#[test]
fn test_update_and_history() {
    let dir = init_repo();
    let gid = create_work(&dir, "Dune");

    let out = json_output(revkb(&dir).args(["update", &gid, "-d", "novel", "--apply", "--json"]));
    assert_eq!(out["changed"], true);

    // Same data again is a no-op
    let out = json_output(revkb(&dir).args(["update", &gid, "-d", "novel", "--apply", "--json"]));
    assert_eq!(out["changed"], false);

    let history = json_output(revkb(&dir).args(["history", &gid, "--json"]));
    assert_eq!(history.as_array().unwrap().len(), 2);

    revkb(&dir)
        .args(["show", &gid])
        .assert()
        .success()
        .stdout(predicate::str::contains("novel"));

    let stats = json_output(revkb(&dir).args(["stats", "--json"]));
    assert_eq!(stats["revisions"], 2);
    assert_eq!(stats["applied_edits"], 2);
    assert_eq!(stats["open_edits"], 0);
}

#[test]
fn test_update_unknown_entity() {
    let dir = init_repo();
    revkb(&dir)
        .args(["update", "01ARZ3NDEKTSV4RRFFQ69G5FAV", "-d", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));

    revkb(&dir)
        .args(["update", "not-a-gid", "-d", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid gid"));
}

#[test]
fn test_edit_workflow() {
    let dir = init_repo();
    let gid = create_work(&dir, "Dune");

    revkb(&dir)
        .args(["edit", "open"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Edit opened"));

    let edits = json_output(revkb(&dir).args(["stats", "--json"]));
    assert_eq!(edits["open_edits"], 1);

    // The open edit is the second one
    revkb(&dir)
        .args(["update", &gid, "-d", "novel", "--edit", "2", "--note", "cover says so"])
        .assert()
        .success();

    let edit = json_output(revkb(&dir).args(["edit", "show", "2", "--json"]));
    assert_eq!(edit["edit"]["status"], "open");
    assert_eq!(edit["edit"]["revision_ids"].as_array().unwrap().len(), 1);
    assert_eq!(edit["notes"][0]["content"], "cover says so");

    revkb(&dir)
        .args(["edit", "list", "--status", "open"])
        .assert()
        .success()
        .stdout(predicate::str::contains("open"));

    revkb(&dir).args(["edit", "cancel", "2"]).assert().success();
    revkb(&dir)
        .args(["edit", "apply", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not open"));

    // Cancelled revision never became master
    revkb(&dir)
        .args(["show", &gid])
        .assert()
        .success()
        .stdout(predicate::str::contains("novel").not());
}

#[test]
fn test_relate_and_redirect() {
    let dir = init_repo();
    let work = create_work(&dir, "Dune");
    let duplicate = create_work(&dir, "Dune (duplicate)");
    let author = json_output(revkb(&dir).args([
        "create", "--kind", "creator", "-a", "Frank Herbert", "--apply", "--json",
    ]))["gid"]
        .as_str()
        .unwrap()
        .to_string();

    let rel = json_output(revkb(&dir).args(["relate", &author, "wrote", &work, "--apply", "--json"]));
    assert_eq!(rel["applied"], true);
    assert!(rel["relationship_id"].is_i64());
    assert!(rel["revision_id"].is_i64());

    revkb(&dir)
        .args(["show", &work])
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote"))
        .stdout(predicate::str::contains("Frank Herbert"));

    revkb(&dir).args(["redirect", &duplicate, &work]).assert().success();

    let shown = json_output(revkb(&dir).args(["show", &duplicate, "--json"]));
    assert_eq!(shown["entity"]["gid"], work.as_str());
    assert_eq!(shown["redirected_from"], duplicate.as_str());

    revkb(&dir)
        .args(["redirect", &work, &duplicate])
        .assert()
        .failure();
}

#[test]
fn test_user_override() {
    let dir = init_repo();
    let gid = create_work(&dir, "Dune");

    revkb(&dir)
        .args(["--user", "alice", "update", &gid, "-d", "novel", "--apply"])
        .assert()
        .success();

    revkb(&dir)
        .args(["history", &gid])
        .assert()
        .success()
        .stdout(predicate::str::contains("alice"))
        .stdout(predicate::str::contains("editor"));
}

#[test]
fn test_config_get_set() {
    let dir = init_repo();
    revkb(&dir)
        .args(["config", "user.name", "bob"])
        .assert()
        .success();
    revkb(&dir)
        .args(["config", "user.name"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bob"));
    revkb(&dir)
        .args(["config", "core.default_kind", "novel"])
        .assert()
        .failure();
}

#[test]
fn test_config_explicit_file() {
    let dir = init_repo();
    std::fs::write(dir.path().join("alt.toml"), "[user]\nname = \"bob\"\n").unwrap();

    revkb(&dir)
        .args(["--config", "alt.toml", "config", "user.name"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bob"));

    revkb(&dir)
        .args(["--config", "alt.toml", "config", "user.name", "carol"])
        .assert()
        .success();
    revkb(&dir)
        .args(["config", "user.name"])
        .assert()
        .success()
        .stdout(predicate::str::contains("carol").not());
    let alt = std::fs::read_to_string(dir.path().join("alt.toml")).unwrap();
    assert!(alt.contains("carol"));

    revkb(&dir)
        .args(["config", "user.nickname", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown config key"));
}
