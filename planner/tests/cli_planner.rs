//! CLI tests for the `planner` binary.
//!
//! Spawns the binary in a temp directory and verifies exit codes and the
//! plan written back for `init`, `validate`, `next` and `refine`.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use planner::exit_codes;
use planner::io::init::{InitOptions, PlannerPaths, init_planner};
use planner::io::tree_store::{load_plan, write_plan};
use planner::test_support::{id, leaf, limits, node_with_children, plan};

fn planner(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_planner"))
        .current_dir(root)
        .args(args)
        .output()
        .expect("run planner")
}

#[test]
fn init_then_validate_succeeds() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = planner(temp.path(), &["init"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));

    let output = planner(temp.path(), &["validate"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1 subtasks, frontier 1"), "{stdout}");

    let output = planner(temp.path(), &["init"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn init_honors_config_flag() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = planner(temp.path(), &["--config", "alt.toml", "init"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(temp.path().join("alt.toml").is_file());
    assert!(!temp.path().join("planner.toml").exists());

    let output = planner(temp.path(), &["--config", "alt.toml", "validate"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
}

#[test]
fn next_on_default_plan_is_exhausted() {
    let temp = tempfile::tempdir().expect("tempdir");
    init_planner(temp.path(), &InitOptions { force: false }).expect("init");

    let output = planner(temp.path(), &["next"]);
    assert_eq!(output.status.code(), Some(exit_codes::EXHAUSTED));
}

#[test]
fn next_prints_successor_of_frontier() {
    let temp = tempfile::tempdir().expect("tempdir");
    let paths = PlannerPaths::new(temp.path());
    let tree = plan(
        vec![node_with_children("1", vec![leaf("1.1"), leaf("1.2")]), leaf("2")],
        "1.2",
    );
    write_plan(&paths.plan_path, &tree).expect("write plan");

    let output = planner(temp.path(), &["next"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "2");
}

#[test]
fn refine_rejection_exits_with_rejected_code_and_keeps_accepted_ops() {
    let temp = tempfile::tempdir().expect("tempdir");
    let paths = PlannerPaths::new(temp.path());
    write_plan(&paths.plan_path, &plan(vec![leaf("1"), leaf("2")], "1")).expect("write plan");
    fs::write(
        temp.path().join("ops.json"),
        r#"[
            {"op": "split", "target": "2", "subtasks": [{"name": "a"}, {"name": "b"}]},
            {"op": "delete", "target": "1"},
            {"op": "exit"}
        ]"#,
    )
    .expect("write ops");

    let output = planner(temp.path(), &["refine", "--ops", "ops.json"]);
    assert_eq!(output.status.code(), Some(exit_codes::REJECTED));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("split 2: created 2.1, 2.2"), "{stdout}");
    assert!(stdout.contains("TargetIsFrontierOrAncestor"), "{stdout}");
    assert!(stdout.contains("skipped 1"), "{stdout}");

    let reloaded = load_plan(&paths.plan_path, &limits(4, 3)).expect("reload");
    assert_eq!(reloaded.get(&id("2.1")).expect("2.1").name, "a");
    assert!(reloaded.contains(&id("1")));
}

#[test]
fn invalid_ops_file_is_reported() {
    let temp = tempfile::tempdir().expect("tempdir");
    init_planner(temp.path(), &InitOptions { force: false }).expect("init");
    fs::write(temp.path().join("ops.json"), r#"[{"op": "grow"}]"#).expect("write ops");

    let output = planner(temp.path(), &["refine", "--ops", "ops.json"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("parse ops"));
}
