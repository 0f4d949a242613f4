mod cli;
mod mock;

pub use cli::CliGitOps;
pub use mock::MockGitOps;

use crate::status::GitStatus;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// A worktree as reported by `git worktree list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredWorktree {
    pub root: PathBuf,
    /// `None` for detached HEAD.
    pub branch: Option<String>,
}

/// Git operations the kernel consumes. Implementations shell out to git;
/// tests inject [`MockGitOps`].
pub trait GitOps: Send + Sync {
    /// `git worktree add -b <branch> <root> <base>` for the given repo.
    fn create_workspace(&self, repo: &Path, branch: &str, base: &str, root: &Path) -> Result<()>;
    /// `git worktree remove --force` on the root.
    fn remove_workspace(&self, repo: &Path, root: &Path) -> Result<()>;
    /// `git branch -D <branch>`.
    fn delete_branch(&self, repo: &Path, branch: &str) -> Result<()>;
    /// All worktrees of the repo, including the primary checkout.
    fn discover_workspaces(&self, repo: &Path) -> Vec<DiscoveredWorktree>;
    fn is_git_repository(&self, path: &Path) -> bool;
    fn current_branch(&self, repo: &Path) -> Option<String>;
    /// The repository's default branch (origin HEAD, falling back to a
    /// local main/master). `None` when undeterminable.
    fn base_branch(&self, repo: &Path) -> Option<String>;
    /// Working-tree status. `line_stats` selects the full form with
    /// per-file additions/deletions; the fast form skips the diff.
    fn status(&self, root: &Path, line_stats: bool) -> Result<GitStatus>;
}

/// Parse `git worktree list --porcelain` output.
pub(crate) fn parse_worktree_porcelain(output: &str) -> Vec<DiscoveredWorktree> {
    let mut worktrees = Vec::new();
    let mut current: Option<DiscoveredWorktree> = None;

    for line in output.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            if let Some(wt) = current.take() {
                worktrees.push(wt);
            }
            current = Some(DiscoveredWorktree {
                root: PathBuf::from(path),
                branch: None,
            });
        } else if let Some(branch) = line.strip_prefix("branch ")
            && let Some(wt) = current.as_mut()
        {
            wt.branch = Some(
                branch
                    .strip_prefix("refs/heads/")
                    .unwrap_or(branch)
                    .to_string(),
            );
        }
    }
    if let Some(wt) = current {
        worktrees.push(wt);
    }
    worktrees
}
