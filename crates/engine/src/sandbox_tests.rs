// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::Arc;
use vc_core::IssueId;

fn manager(enabled: bool) -> (tempfile::TempDir, SandboxManager, FakeGit) {
    let dir = tempfile::tempdir().unwrap();
    let parent = dir.path().join("repo");
    std::fs::create_dir_all(&parent).unwrap();
    let git = FakeGit::new();
    let mgr = SandboxManager::new(
        dir.path().join("sandboxes"),
        parent,
        enabled,
        Arc::new(git.clone()),
    );
    (dir, mgr, git)
}

#[tokio::test]
async fn create_builds_worktree_on_mission_branch() {
    let (_dir, mgr, git) = manager(true);
    let sandbox = mgr.create(&IssueId::new("vc-7"), 100).await.unwrap();

    assert!(sandbox.path.ends_with("mission-vc-7"));
    assert_eq!(sandbox.branch, "mission/vc-7");
    assert!(!sandbox.main_workspace);
    assert!(sandbox.path.exists());
    assert_eq!(git.calls(), vec!["worktree_add mission/vc-7"]);
}

#[tokio::test]
async fn create_fails_if_path_exists() {
    let (_dir, mgr, _git) = manager(true);
    let first = mgr.create(&IssueId::new("vc-7"), 100).await.unwrap();
    assert!(first.path.exists());

    let err = mgr.create(&IssueId::new("vc-7"), 200).await.unwrap_err();
    assert!(err.to_string().contains("already exists"));
}

#[tokio::test]
async fn cleanup_removes_worktree_and_reuse_works() {
    let (_dir, mgr, git) = manager(true);
    let sandbox = mgr.create(&IssueId::new("vc-7"), 100).await.unwrap();
    mgr.cleanup(&sandbox).await.unwrap();
    assert!(!sandbox.path.exists());
    assert!(git.calls().iter().any(|c| c.starts_with("worktree_remove")));

    // After cleanup the same issue can get a fresh sandbox
    mgr.create(&IssueId::new("vc-7"), 300).await.unwrap();
}

#[tokio::test]
async fn disabled_mode_degrades_to_main_workspace() {
    let (_dir, mgr, git) = manager(false);
    let sandbox = mgr.create(&IssueId::new("vc-7"), 100).await.unwrap();
    assert!(sandbox.main_workspace);
    assert!(sandbox.branch.is_empty());

    // Cleanup must not touch the parent repo
    mgr.cleanup(&sandbox).await.unwrap();
    assert!(sandbox.path.exists());
    assert!(git.calls().is_empty());
}

#[tokio::test]
async fn orphan_cleanup_deletes_only_old_worktreeless_branches() {
    let (dir, mgr, git) = manager(true);
    let now = 100 * 86_400_000;

    let live_worktree = dir.path().join("live");
    std::fs::create_dir_all(&live_worktree).unwrap();

    git.seed_branch("mission/old-orphan", 10 * 86_400_000, None);
    git.seed_branch("mission/fresh", now - 86_400_000, None);
    git.seed_branch("mission/live", 10 * 86_400_000, Some(&live_worktree));

    let deleted = mgr.cleanup_orphaned_branches(30, false, now).await.unwrap();
    assert_eq!(deleted, vec!["mission/old-orphan"]);
    assert!(git.calls().contains(&"delete_branch mission/old-orphan".to_string()));
}

#[tokio::test]
async fn orphan_cleanup_dry_run_reports_same_set_without_deleting() {
    let (_dir, mgr, git) = manager(true);
    let now = 100 * 86_400_000;
    git.seed_branch("mission/old-orphan", 10 * 86_400_000, None);

    let dry = mgr.cleanup_orphaned_branches(30, true, now).await.unwrap();
    assert_eq!(dry, vec!["mission/old-orphan"]);
    assert!(!git.calls().iter().any(|c| c.starts_with("delete_branch")));

    let real = mgr.cleanup_orphaned_branches(30, false, now).await.unwrap();
    assert_eq!(real, dry);
}
