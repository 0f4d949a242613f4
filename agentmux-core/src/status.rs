use crate::paths::canonical_path;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Snapshot of a worktree's git state. `has_line_stats` distinguishes a
/// full result (per-file additions/deletions included) from a fast one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitStatus {
    pub branch: Option<String>,
    pub staged: usize,
    pub unstaged: usize,
    pub untracked: usize,
    pub additions: usize,
    pub deletions: usize,
    pub has_line_stats: bool,
}

impl GitStatus {
    pub fn is_clean(&self) -> bool {
        self.staged == 0 && self.unstaged == 0 && self.untracked == 0
    }
}

/// Per-root status cache, keyed by canonical root path.
///
/// Guarded by its own mutex because results are written from status
/// commands running off-loop; everything else about the kernel state is
/// mutated on-loop only.
#[derive(Default)]
pub struct StatusCache {
    inner: Mutex<HashMap<PathBuf, GitStatus>>,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, root: &Path) -> Option<GitStatus> {
        self.inner
            .lock()
            .unwrap()
            .get(&canonical_path(root))
            .cloned()
    }

    /// Cached full result for a root, if any. Fast results are not
    /// returned: the periodic ticker only reuses full snapshots.
    pub fn get_full(&self, root: &Path) -> Option<GitStatus> {
        self.get(root).filter(|s| s.has_line_stats)
    }

    pub fn put(&self, root: &Path, status: GitStatus) {
        self.inner
            .lock()
            .unwrap()
            .insert(canonical_path(root), status);
    }

    pub fn invalidate(&self, root: &Path) {
        self.inner.lock().unwrap().remove(&canonical_path(root));
    }
}
