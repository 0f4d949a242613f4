use super::{DiscoveredWorktree, GitOps};
use crate::status::GitStatus;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Test double with one-shot result injection and call recording, so
/// kernel tests can assert which git side effects did (not) happen.
#[derive(Default)]
pub struct MockGitOps {
    pub worktrees: Mutex<Vec<DiscoveredWorktree>>,
    pub current_branch: Option<String>,
    pub base_branch: Option<String>,
    pub status_result: Mutex<Option<Result<GitStatus>>>,
    pub create_result: Mutex<Option<Result<()>>>,
    pub remove_result: Mutex<Option<Result<()>>>,
    pub delete_branch_result: Mutex<Option<Result<()>>>,
    pub create_calls: Mutex<Vec<(PathBuf, String, String, PathBuf)>>,
    pub remove_calls: Mutex<Vec<PathBuf>>,
    pub delete_branch_calls: Mutex<Vec<String>>,
    /// When true, `create_workspace` also materialises `<root>/.git` on
    /// disk so the `.git` appearance poll succeeds.
    pub create_materialises: bool,
}

impl MockGitOps {
    pub fn materialising() -> Self {
        Self {
            create_materialises: true,
            ..Self::default()
        }
    }
}

impl GitOps for MockGitOps {
    fn create_workspace(&self, repo: &Path, branch: &str, base: &str, root: &Path) -> Result<()> {
        self.create_calls.lock().unwrap().push((
            repo.to_path_buf(),
            branch.to_string(),
            base.to_string(),
            root.to_path_buf(),
        ));
        let result = self
            .create_result
            .lock()
            .unwrap()
            .take()
            .unwrap_or(Ok(()));
        if result.is_ok() && self.create_materialises {
            std::fs::create_dir_all(root.join(".git"))?;
        }
        result
    }

    fn remove_workspace(&self, _repo: &Path, root: &Path) -> Result<()> {
        self.remove_calls.lock().unwrap().push(root.to_path_buf());
        self.remove_result.lock().unwrap().take().unwrap_or(Ok(()))
    }

    fn delete_branch(&self, _repo: &Path, branch: &str) -> Result<()> {
        self.delete_branch_calls
            .lock()
            .unwrap()
            .push(branch.to_string());
        self.delete_branch_result
            .lock()
            .unwrap()
            .take()
            .unwrap_or(Ok(()))
    }

    fn discover_workspaces(&self, _repo: &Path) -> Vec<DiscoveredWorktree> {
        self.worktrees.lock().unwrap().clone()
    }

    fn is_git_repository(&self, path: &Path) -> bool {
        path.join(".git").exists()
    }

    fn current_branch(&self, _repo: &Path) -> Option<String> {
        self.current_branch.clone()
    }

    fn base_branch(&self, _repo: &Path) -> Option<String> {
        self.base_branch.clone()
    }

    fn status(&self, _root: &Path, line_stats: bool) -> Result<GitStatus> {
        self.status_result
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| {
                Ok(GitStatus {
                    has_line_stats: line_stats,
                    ..GitStatus::default()
                })
            })
    }
}
