//! Patch and commit tools against real git repositories.
//!
//! Each test seeds a throwaway repo, drives the tool surface, and checks both
//! the returned payload and the state left on disk (working tree, scratch
//! file, commit history).

use testops::core::types::PatchOutcome;
use testops::error::ToolError;
use testops::io::patch::SCRATCH_FILE_NAME;
use testops::test_support::{TestProject, single_line_diff};

fn seeded_repo() -> TestProject {
    TestProject::git_with_files(&[
        ("package.json", "{\"name\": \"demo\"}\n"),
        ("src/foo.txt", "hello\n"),
    ])
    .expect("seed repo")
}

fn commit_count(project: &TestProject) -> usize {
    project
        .git(&["rev-list", "--count", "HEAD"])
        .expect("rev-list")
        .trim()
        .parse()
        .expect("count")
}

#[test]
fn clean_patch_dry_run_leaves_tree_untouched() {
    let project = seeded_repo();
    let diff = single_line_diff("src/foo.txt", "hello", "world");

    let outcome = project.ops().apply_patch(&diff, true).expect("dry run");

    assert_eq!(outcome, PatchOutcome::ok(false));
    assert_eq!(project.read("src/foo.txt").expect("read"), "hello\n");
    assert!(!project.join(SCRATCH_FILE_NAME).exists());
}

#[test]
fn clean_patch_applies_when_not_dry_run() {
    let project = seeded_repo();
    let diff = single_line_diff("src/foo.txt", "hello", "world");

    let outcome = project.ops().apply_patch(&diff, false).expect("apply");

    assert_eq!(outcome, PatchOutcome::ok(true));
    assert_eq!(project.read("src/foo.txt").expect("read"), "world\n");
    assert!(!project.join(SCRATCH_FILE_NAME).exists());
}

#[test]
fn forbidden_patch_is_rejected_before_any_write() {
    let project = seeded_repo();
    let diff = "--- /dev/null\n+++ b/infra/terraform.tf\n@@ -0,0 +1 @@\n+resource {}\n";

    let err = project.ops().apply_patch(diff, false).unwrap_err();

    assert!(matches!(err, ToolError::ForbiddenPath { token: "infra/" }));
    assert!(!project.join("infra").exists());
    assert!(!project.join(SCRATCH_FILE_NAME).exists());
    assert_eq!(project.git(&["status", "--porcelain"]).expect("status"), "");
}

#[test]
fn non_applying_diff_fails_and_keeps_tree_byte_identical() {
    let project = seeded_repo();
    let diff = single_line_diff("src/foo.txt", "not the current line", "world");

    for dry_run in [true, false] {
        let err = project.ops().apply_patch(&diff, dry_run).unwrap_err();
        match err {
            ToolError::ProcessFailed(result) => {
                assert_eq!(result.command[..3], ["git", "apply", "--check"]);
                assert_ne!(result.exit_code, 0);
                assert!(!result.stderr.is_empty());
            }
            other => panic!("expected ProcessFailed, got {other:?}"),
        }
        assert_eq!(project.read("src/foo.txt").expect("read"), "hello\n");
        assert!(!project.join(SCRATCH_FILE_NAME).exists());
    }
    assert_eq!(project.git(&["status", "--porcelain"]).expect("status"), "");
}

#[test]
fn dry_run_is_idempotent() {
    let project = seeded_repo();
    let ops = project.ops();
    let good = single_line_diff("src/foo.txt", "hello", "world");
    let bad = single_line_diff("src/foo.txt", "missing", "world");

    let first = ops.apply_patch(&good, true).expect("first");
    let second = ops.apply_patch(&good, true).expect("second");
    assert_eq!(first, second);

    let first = ops.apply_patch(&bad, true).unwrap_err();
    let second = ops.apply_patch(&bad, true).unwrap_err();
    assert_eq!(first.kind(), second.kind());
    assert_eq!(first.to_payload(), second.to_payload());
}

#[test]
fn garbage_diff_is_rejected_by_check() {
    let project = seeded_repo();
    let err = project
        .ops()
        .apply_patch("this is not a diff\n", true)
        .unwrap_err();
    assert_eq!(err.kind(), "ProcessFailed");
    assert!(!project.join(SCRATCH_FILE_NAME).exists());
}

#[test]
fn blank_commit_messages_are_rejected_without_git() {
    let project = seeded_repo();
    let before = commit_count(&project);

    for message in ["", "   ", "\n\t"] {
        let err = project.ops().git_commit(message).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgument(_)));
    }

    assert_eq!(commit_count(&project), before);
}

#[test]
fn commit_records_staged_changes() {
    let project = seeded_repo();
    project.write("src/foo.txt", "changed\n").expect("write");
    project.git(&["add", "src/foo.txt"]).expect("stage");

    let outcome = project.ops().git_commit("fix: update foo").expect("commit");

    assert_eq!(outcome.status, "committed");
    assert_eq!(outcome.message, "fix: update foo");
    let subject = project
        .git(&["log", "-1", "--format=%s"])
        .expect("log");
    assert_eq!(subject.trim(), "fix: update foo");
}

#[cfg(unix)]
#[test]
fn commit_skips_pre_commit_hooks() {
    use std::os::unix::fs::PermissionsExt;

    let project = seeded_repo();
    let hook = project.join(".git/hooks/pre-commit");
    project
        .write(".git/hooks/pre-commit", "#!/bin/sh\nexit 1\n")
        .expect("write hook");
    std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755)).expect("chmod");
    project.write("src/foo.txt", "changed\n").expect("write");
    project.git(&["add", "src/foo.txt"]).expect("stage");

    project.ops().git_commit("chore: bypass hook").expect("commit");

    assert_eq!(commit_count(&project), 2);
}

#[test]
fn commit_with_nothing_staged_is_process_failed() {
    let project = seeded_repo();
    let err = project.ops().git_commit("chore: nothing").unwrap_err();
    match err {
        ToolError::ProcessFailed(result) => {
            assert_eq!(
                result.command,
                vec!["git", "commit", "-m", "chore: nothing", "--no-verify"]
            );
        }
        other => panic!("expected ProcessFailed, got {other:?}"),
    }
}
