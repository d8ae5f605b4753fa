// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-claim sandboxes: one git worktree per claim.
//!
//! Each claim works on a fresh branch `mission/<issue-id>` in a worktree at
//! `<sandbox-root>/mission-<issue-id>`, so concurrent attempts never touch
//! the parent repo's working tree. Cleanup runs on every exit path; orphaned
//! `mission/*` branches (worktree gone, older than N days) are pruned by a
//! separate maintenance operation.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use vc_core::IssueId;

/// Errors from the git layer.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("IO error running git: {0}")]
    Io(#[from] std::io::Error),
}

/// A branch with its last-commit time and attached worktree, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchInfo {
    pub name: String,
    pub last_commit_ms: u64,
    pub worktree_path: Option<PathBuf>,
}

/// The git operations the executor consumes.
#[async_trait]
pub trait GitBackend: Send + Sync + 'static {
    async fn worktree_add(&self, repo: &Path, path: &Path, branch: &str)
        -> Result<(), GitError>;
    async fn worktree_remove(&self, repo: &Path, path: &Path) -> Result<(), GitError>;
    async fn delete_branch(&self, repo: &Path, branch: &str) -> Result<(), GitError>;
    /// Branches matching a ref glob (e.g. `mission/*`).
    async fn list_branches(&self, repo: &Path, pattern: &str)
        -> Result<Vec<BranchInfo>, GitError>;
    /// Current HEAD commit id.
    async fn head(&self, repo: &Path) -> Result<String, GitError>;
    /// Stage everything and commit in the given worktree.
    async fn commit_all(&self, path: &Path, message: &str) -> Result<(), GitError>;
    /// Push the branch and open a pull request for it.
    async fn open_pr(&self, path: &Path, branch: &str, title: &str) -> Result<(), GitError>;
}

/// Shells out to the `git` binary.
#[derive(Clone, Default)]
pub struct CliGit;

impl CliGit {
    async fn run(&self, cwd: &Path, args: &[&str]) -> Result<String, GitError> {
        let output = tokio::process::Command::new("git")
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .output()
            .await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(GitError::CommandFailed {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl GitBackend for CliGit {
    async fn worktree_add(
        &self,
        repo: &Path,
        path: &Path,
        branch: &str,
    ) -> Result<(), GitError> {
        let path_str = path.display().to_string();
        self.run(repo, &["worktree", "add", "-b", branch, &path_str, "HEAD"])
            .await?;
        Ok(())
    }

    async fn worktree_remove(&self, repo: &Path, path: &Path) -> Result<(), GitError> {
        let path_str = path.display().to_string();
        self.run(repo, &["worktree", "remove", "--force", &path_str])
            .await?;
        self.run(repo, &["worktree", "prune"]).await?;
        Ok(())
    }

    async fn delete_branch(&self, repo: &Path, branch: &str) -> Result<(), GitError> {
        self.run(repo, &["branch", "-D", branch]).await?;
        Ok(())
    }

    async fn list_branches(
        &self,
        repo: &Path,
        pattern: &str,
    ) -> Result<Vec<BranchInfo>, GitError> {
        let format = "%(refname:short)\t%(committerdate:unix)\t%(worktreepath)";
        let refs = format!("refs/heads/{pattern}");
        let out = self
            .run(repo, &["for-each-ref", "--format", format, &refs])
            .await?;

        let mut branches = Vec::new();
        for line in out.lines() {
            let mut parts = line.split('\t');
            let Some(name) = parts.next() else { continue };
            let last_commit_ms = parts
                .next()
                .and_then(|s| s.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(0);
            let worktree_path = parts
                .next()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from);
            branches.push(BranchInfo {
                name: name.to_string(),
                last_commit_ms,
                worktree_path,
            });
        }
        Ok(branches)
    }

    async fn head(&self, repo: &Path) -> Result<String, GitError> {
        self.run(repo, &["rev-parse", "HEAD"]).await
    }

    async fn commit_all(&self, path: &Path, message: &str) -> Result<(), GitError> {
        self.run(path, &["add", "-A"]).await?;
        self.run(path, &["commit", "-m", message, "--allow-empty"])
            .await?;
        Ok(())
    }

    async fn open_pr(&self, path: &Path, branch: &str, title: &str) -> Result<(), GitError> {
        self.run(path, &["push", "-u", "origin", branch]).await?;
        let output = tokio::process::Command::new("gh")
            .args(["pr", "create", "--title", title, "--fill-first"])
            .current_dir(path)
            .stdin(Stdio::null())
            .output()
            .await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(GitError::CommandFailed {
                command: "gh pr create".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

/// An isolated per-claim workspace.
#[derive(Debug, Clone)]
pub struct Sandbox {
    pub issue_id: IssueId,
    pub path: PathBuf,
    pub branch: String,
    pub created_at: u64,
    /// True in the discouraged disabled-sandboxes mode: `path` is the parent
    /// repo itself and cleanup is a no-op.
    pub main_workspace: bool,
}

/// Creates and destroys sandboxes.
pub struct SandboxManager {
    root: PathBuf,
    parent_repo: PathBuf,
    enabled: bool,
    git: std::sync::Arc<dyn GitBackend>,
}

impl SandboxManager {
    pub fn new(
        root: PathBuf,
        parent_repo: PathBuf,
        enabled: bool,
        git: std::sync::Arc<dyn GitBackend>,
    ) -> Self {
        Self {
            root,
            parent_repo,
            enabled,
            git,
        }
    }

    pub fn branch_for(issue_id: &IssueId) -> String {
        format!("mission/{issue_id}")
    }

    pub fn path_for(&self, issue_id: &IssueId) -> PathBuf {
        self.root.join(format!("mission-{issue_id}"))
    }

    /// Create the worktree for a claim. Fails if the path already exists
    /// (a prior cleanup was skipped).
    pub async fn create(&self, issue_id: &IssueId, now: u64) -> Result<Sandbox, GitError> {
        if !self.enabled {
            tracing::warn!(
                issue_id = %issue_id,
                "sandboxes disabled; agent will run in the main workspace"
            );
            return Ok(Sandbox {
                issue_id: issue_id.clone(),
                path: self.parent_repo.clone(),
                branch: String::new(),
                created_at: now,
                main_workspace: true,
            });
        }

        let path = self.path_for(issue_id);
        if path.exists() {
            return Err(GitError::CommandFailed {
                command: "worktree add".to_string(),
                stderr: format!(
                    "sandbox path already exists (stale cleanup?): {}",
                    path.display()
                ),
            });
        }
        std::fs::create_dir_all(&self.root).map_err(GitError::Io)?;

        let branch = Self::branch_for(issue_id);
        self.git
            .worktree_add(&self.parent_repo, &path, &branch)
            .await?;

        Ok(Sandbox {
            issue_id: issue_id.clone(),
            path,
            branch,
            created_at: now,
            main_workspace: false,
        })
    }

    /// Remove the worktree. Runs on success and failure paths alike.
    pub async fn cleanup(&self, sandbox: &Sandbox) -> Result<(), GitError> {
        if sandbox.main_workspace {
            return Ok(());
        }
        self.git
            .worktree_remove(&self.parent_repo, &sandbox.path)
            .await
    }

    /// Delete `mission/*` branches older than `max_age_days` whose worktrees
    /// no longer exist. With `dry_run`, returns the exact set a real run
    /// would delete without deleting anything.
    pub async fn cleanup_orphaned_branches(
        &self,
        max_age_days: u64,
        dry_run: bool,
        now: u64,
    ) -> Result<Vec<String>, GitError> {
        let cutoff = now.saturating_sub(max_age_days * 86_400_000);
        let branches = self.git.list_branches(&self.parent_repo, "mission/*").await?;

        let mut doomed = Vec::new();
        for branch in branches {
            let worktree_live = branch
                .worktree_path
                .as_ref()
                .map(|p| p.exists())
                .unwrap_or(false);
            if worktree_live || branch.last_commit_ms >= cutoff {
                continue;
            }
            if !dry_run {
                self.git.delete_branch(&self.parent_repo, &branch.name).await?;
            }
            doomed.push(branch.name);
        }
        Ok(doomed)
    }
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeGit;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records git calls and simulates worktrees on the plain filesystem.
    #[derive(Clone, Default)]
    pub struct FakeGit {
        inner: Arc<Mutex<FakeGitInner>>,
    }

    #[derive(Default)]
    struct FakeGitInner {
        calls: Vec<String>,
        branches: Vec<BranchInfo>,
        fail_worktree_add: bool,
    }

    impl FakeGit {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<String> {
            self.inner.lock().calls.clone()
        }

        pub fn seed_branch(&self, name: &str, last_commit_ms: u64, worktree: Option<&Path>) {
            self.inner.lock().branches.push(BranchInfo {
                name: name.to_string(),
                last_commit_ms,
                worktree_path: worktree.map(Path::to_path_buf),
            });
        }

        pub fn fail_worktree_add(&self) {
            self.inner.lock().fail_worktree_add = true;
        }
    }

    #[async_trait]
    impl GitBackend for FakeGit {
        async fn worktree_add(
            &self,
            _repo: &Path,
            path: &Path,
            branch: &str,
        ) -> Result<(), GitError> {
            let mut inner = self.inner.lock();
            inner.calls.push(format!("worktree_add {branch}"));
            if inner.fail_worktree_add {
                return Err(GitError::CommandFailed {
                    command: "worktree add".to_string(),
                    stderr: "scripted failure".to_string(),
                });
            }
            drop(inner);
            std::fs::create_dir_all(path)?;
            Ok(())
        }

        async fn worktree_remove(&self, _repo: &Path, path: &Path) -> Result<(), GitError> {
            self.inner
                .lock()
                .calls
                .push(format!("worktree_remove {}", path.display()));
            if path.exists() {
                std::fs::remove_dir_all(path)?;
            }
            Ok(())
        }

        async fn delete_branch(&self, _repo: &Path, branch: &str) -> Result<(), GitError> {
            let mut inner = self.inner.lock();
            inner.calls.push(format!("delete_branch {branch}"));
            inner.branches.retain(|b| b.name != branch);
            Ok(())
        }

        async fn list_branches(
            &self,
            _repo: &Path,
            _pattern: &str,
        ) -> Result<Vec<BranchInfo>, GitError> {
            Ok(self.inner.lock().branches.clone())
        }

        async fn head(&self, _repo: &Path) -> Result<String, GitError> {
            Ok("deadbeef".to_string())
        }

        async fn commit_all(&self, path: &Path, message: &str) -> Result<(), GitError> {
            self.inner
                .lock()
                .calls
                .push(format!("commit_all {} {message}", path.display()));
            Ok(())
        }

        async fn open_pr(
            &self,
            _path: &Path,
            branch: &str,
            title: &str,
        ) -> Result<(), GitError> {
            self.inner
                .lock()
                .calls
                .push(format!("open_pr {branch} {title}"));
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "sandbox_tests.rs"]
mod tests;
