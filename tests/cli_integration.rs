//! CLI integration tests for takelog
//!
//! These tests drive the binary through a whole logging session, from
//! workspace initialization to conflict resolution and range edits.

use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a command instance for the takelog binary
fn takelog_cmd() -> assert_cmd::Command {
    assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("takelog"))
}

/// Create a temporary directory and initialize a takelog workspace
fn setup_workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    takelog_cmd().arg("init").arg(dir.path()).assert().success();
    dir
}

/// Runs a command in the workspace with JSON output and parses stdout
fn run_json(dir: &TempDir, args: &[&str]) -> serde_json::Value {
    let output = takelog_cmd()
        .current_dir(dir.path())
        .args(args)
        .args(["--format", "json"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "command {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

fn new_project(dir: &TempDir, name: &str, cameras: u32) -> String {
    let json = run_json(dir, &["project", "new", name, "--cameras", &cameras.to_string()]);
    json["id"].as_str().unwrap().to_string()
}

fn add_take(dir: &TempDir, project: &str, scene: &str, take: u32) -> serde_json::Value {
    run_json(
        dir,
        &["take", "add", project, "--scene", scene, "--take", &take.to_string()],
    )
}

// =============================================================================
// Initialization Tests
// =============================================================================

#[test]
fn test_init_creates_structure() {
    let dir = TempDir::new().unwrap();

    takelog_cmd()
        .arg("init")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized takelog workspace"));

    assert!(dir.path().join(".takelog").is_dir());
    assert!(dir.path().join(".takelog/projects").is_dir());
    assert!(dir.path().join(".takelog/config.toml").is_file());
    assert!(dir.path().join(".takelog/.gitignore").is_file());
}

#[test]
fn test_init_is_idempotent() {
    let dir = TempDir::new().unwrap();

    takelog_cmd().arg("init").arg(dir.path()).assert().success();
    takelog_cmd().arg("init").arg(dir.path()).assert().success();
}

#[test]
fn test_commands_outside_workspace_fail() {
    let dir = TempDir::new().unwrap();

    takelog_cmd()
        .current_dir(dir.path())
        .args(["project", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("takelog init"));
}

// =============================================================================
// Project Tests
// =============================================================================

#[test]
fn test_project_new_writes_file() {
    let dir = setup_workspace();

    takelog_cmd()
        .current_dir(dir.path())
        .args(["project", "new", "Night Shoot"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created project"));

    let files: Vec<_> = fs::read_dir(dir.path().join(".takelog/projects"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map(|ext| ext == "jsonl").unwrap_or(false))
        .collect();
    assert_eq!(files.len(), 1);
}

#[test]
fn test_project_list_and_show() {
    let dir = setup_workspace();
    let id = new_project(&dir, "Listing", 2);

    takelog_cmd()
        .current_dir(dir.path())
        .args(["project", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Listing"))
        .stdout(predicate::str::contains(id.as_str()));

    add_take(&dir, &id, "4", 1);
    add_take(&dir, &id, "4", 2);
    add_take(&dir, &id, "4", 4);

    takelog_cmd()
        .current_dir(dir.path())
        .args(["project", "show", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cameras:  2"))
        .stdout(predicate::str::contains("Scene 4 (cam 0): 1-2, 4"));
}

#[test]
fn test_project_cameras_cannot_shrink() {
    let dir = setup_workspace();
    let id = new_project(&dir, "Shrink", 2);

    let json = run_json(&dir, &["project", "cameras", &id, "3"]);
    assert_eq!(json["settings"]["camera_count"], 3);

    takelog_cmd()
        .current_dir(dir.path())
        .args(["project", "cameras", &id, "1"])
        .assert()
        .failure();
}

#[test]
fn test_project_delete() {
    let dir = setup_workspace();
    let id = new_project(&dir, "Gone", 1);

    takelog_cmd()
        .current_dir(dir.path())
        .args(["project", "delete", &id])
        .assert()
        .success();

    takelog_cmd()
        .current_dir(dir.path())
        .args(["project", "show", &id])
        .assert()
        .failure();
}

// =============================================================================
// Take Tests
// =============================================================================

#[test]
fn test_take_add_assigns_file_numbers() {
    let dir = setup_workspace();
    let id = new_project(&dir, "Files", 1);

    let first = add_take(&dir, &id, "1", 1);
    let second = add_take(&dir, &id, "1", 2);

    assert_eq!(first["scene"], "1");
    assert_eq!(first["file_number"], 1);
    assert_eq!(second["file_number"], 2);
}

#[test]
fn test_take_add_conflict_exits_nonzero() {
    let dir = setup_workspace();
    let id = new_project(&dir, "Clash", 1);
    add_take(&dir, &id, "3", 1);

    takelog_cmd()
        .current_dir(dir.path())
        .args(["take", "add", &id, "--scene", "3", "--take", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("renumber"))
        .stderr(predicate::str::contains("--on-conflict"));

    let list = run_json(&dir, &["take", "list", &id]);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[test]
fn test_take_add_renumber_on_conflict() {
    let dir = setup_workspace();
    let id = new_project(&dir, "Renumber", 1);
    add_take(&dir, &id, "3", 1);
    add_take(&dir, &id, "3", 2);

    let json = run_json(
        &dir,
        &["take", "add", &id, "--scene", "3", "--take", "1", "--on-conflict", "renumber"],
    );
    assert_eq!(json["take_number"], 1);

    let list = run_json(&dir, &["take", "list", &id]);
    let mut numbers: Vec<u64> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["take_number"].as_u64().unwrap())
        .collect();
    numbers.sort();
    assert_eq!(numbers, vec![1, 2, 3]);
}

#[test]
fn test_take_add_cancel_on_conflict_changes_nothing() {
    let dir = setup_workspace();
    let id = new_project(&dir, "Cancel", 1);
    add_take(&dir, &id, "5", 1);

    takelog_cmd()
        .current_dir(dir.path())
        .args(["take", "add", &id, "--scene", "5", "--take", "1", "--on-conflict", "cancel"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cancelled"));

    let list = run_json(&dir, &["take", "list", &id]);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[test]
fn test_take_check_reports_conflicts() {
    let dir = setup_workspace();
    let id = new_project(&dir, "Check", 1);
    let take = add_take(&dir, &id, "7", 1);

    let clash = run_json(&dir, &["take", "check", &id, "--scene", "7", "--take", "1"]);
    assert_eq!(clash["clear"], false);
    assert_eq!(clash["occupied_by"], take["id"]);

    let clear = run_json(&dir, &["take", "check", &id, "--scene", "7", "--take", "2"]);
    assert_eq!(clear["clear"], true);
    assert!(clear["occupied_by"].is_null());
}

#[test]
fn test_take_edit_and_show() {
    let dir = setup_workspace();
    let id = new_project(&dir, "Edit", 1);
    let take = add_take(&dir, &id, "2", 1);
    let take_id = take["id"].as_str().unwrap();

    run_json(
        &dir,
        &["take", "edit", take_id, "--waste", "focus,sound", "--field", "lens=35mm"],
    );

    takelog_cmd()
        .current_dir(dir.path())
        .args(["take", "show", take_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("waste (sound, focus)"))
        .stdout(predicate::str::contains("lens: 35mm"));
}

#[test]
fn test_take_delete_is_idempotent() {
    let dir = setup_workspace();
    let id = new_project(&dir, "Delete", 1);
    let take = add_take(&dir, &id, "1", 1);
    let take_id = take["id"].as_str().unwrap();

    let first = run_json(&dir, &["take", "delete", take_id]);
    assert_eq!(first["deleted"], 1);

    let second = run_json(&dir, &["take", "delete", take_id]);
    assert_eq!(second["deleted"], 0);
}

#[test]
fn test_invalid_take_number_rejected() {
    let dir = setup_workspace();
    let id = new_project(&dir, "Bounds", 1);

    takelog_cmd()
        .current_dir(dir.path())
        .args(["take", "add", &id, "--scene", "1", "--take", "0"])
        .assert()
        .failure();
}

// =============================================================================
// Range and Camera Tests
// =============================================================================

#[test]
fn test_range_writes_field_and_skips_disabled() {
    let dir = setup_workspace();
    let id = new_project(&dir, "Range", 1);
    for n in 1..=3 {
        add_take(&dir, &id, "9", n);
    }
    let list = run_json(&dir, &["take", "list", &id]);
    let second_id = list[1]["id"].as_str().unwrap().to_string();

    run_json(&dir, &["take", "disable", &second_id, "lens"]);

    let updated = run_json(
        &dir,
        &["range", &id, "--field", "lens", "--from", "1", "--to", "3", "--value", "50mm"],
    );
    assert_eq!(updated.as_array().unwrap().len(), 2);

    let second = run_json(&dir, &["take", "show", &second_id]);
    assert!(second["fields"].get("lens").is_none());
}

#[test]
fn test_range_inverted_bounds_fail() {
    let dir = setup_workspace();
    let id = new_project(&dir, "Inverted", 1);
    add_take(&dir, &id, "1", 1);

    takelog_cmd()
        .current_dir(dir.path())
        .args(["range", &id, "--from", "5", "--to", "2", "--value", "x"])
        .assert()
        .failure();
}

#[test]
fn test_camera_toggle_on_multi_camera_project() {
    let dir = setup_workspace();
    let id = new_project(&dir, "Two Cams", 2);
    let take = add_take(&dir, &id, "1", 1);
    let take_id = take["id"].as_str().unwrap();

    takelog_cmd()
        .current_dir(dir.path())
        .args(["camera", "toggle", take_id, "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cam 1: stopped"))
        .stdout(predicate::str::contains("cam 0: rolling"));
}

#[test]
fn test_camera_toggle_on_single_camera_project_fails() {
    let dir = setup_workspace();
    let id = new_project(&dir, "One Cam", 1);
    let take = add_take(&dir, &id, "1", 1);
    let take_id = take["id"].as_str().unwrap();

    takelog_cmd()
        .current_dir(dir.path())
        .args(["camera", "toggle", take_id, "0"])
        .assert()
        .failure();
}
