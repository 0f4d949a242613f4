use crate::ids::workspace_id;
use crate::paths::{canonical_path, same_canonical};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// A persisted tab attached to a workspace: one assistant session in one
/// tmux session. The Center model owns the runtime view; this is the
/// on-disk shape, reconciled on save and on rebind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TabDescriptor {
    pub assistant: String,
    pub name: String,
    pub session: String,
    #[serde(default)]
    pub detached: bool,
    #[serde(default)]
    pub status: String,
}

/// A git worktree with attached assistant-session metadata.
///
/// `repo` is a back-reference to the owning project by path, never by
/// pointer, so it survives projects-list rebuilds. A workspace whose root
/// equals its repo is the primary checkout: transient, reconstructed from
/// the repo's current branch on every load, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub name: String,
    pub branch: String,
    #[serde(default)]
    pub base: String,
    pub repo: PathBuf,
    pub root: PathBuf,
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub assistant: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_mode: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub open_tabs: Vec<TabDescriptor>,
    #[serde(default)]
    pub active_tab_index: usize,
    #[serde(default)]
    pub archived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
}

impl Workspace {
    pub fn new(name: &str, branch: &str, base: &str, repo: &Path, root: &Path) -> Self {
        Self {
            name: name.to_string(),
            branch: branch.to_string(),
            base: base.to_string(),
            repo: repo.to_path_buf(),
            root: root.to_path_buf(),
            created: now_unix_secs(),
            assistant: String::new(),
            script_mode: None,
            env: BTreeMap::new(),
            open_tabs: Vec::new(),
            active_tab_index: 0,
            archived: false,
            archived_at: None,
            runtime: None,
        }
    }

    /// Stable identifier derived from the canonical (repo, root) pair.
    pub fn id(&self) -> String {
        workspace_id(&self.repo, &self.root)
    }

    /// Primary checkout: the workspace whose root is the repo itself.
    pub fn is_primary(&self) -> bool {
        same_canonical(&self.repo, &self.root)
    }

    /// Whether the stored repo back-reference is a pre-canonicalisation
    /// relative path. Such entries are retained on load as long as
    /// discovery still reports a matching worktree.
    pub fn has_legacy_repo(&self) -> bool {
        self.repo.is_relative()
    }

    pub fn archive(&mut self) {
        self.archived = true;
        self.archived_at = Some(now_unix_secs());
    }

    pub fn unarchive(&mut self) {
        self.archived = false;
        self.archived_at = None;
    }
}

/// A registered git repository containing workspaces. Identity is the
/// canonical repository path; the display name falls back to the path
/// basename.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub name: String,
    pub path: PathBuf,
    pub workspaces: Vec<Workspace>,
}

impl Project {
    pub fn new(path: &Path) -> Self {
        Self {
            name: display_name(path),
            path: path.to_path_buf(),
            workspaces: Vec::new(),
        }
    }

    pub fn canonical(&self) -> PathBuf {
        canonical_path(&self.path)
    }

    /// Find a workspace by its stable ID.
    pub fn workspace(&self, id: &str) -> Option<&Workspace> {
        self.workspaces.iter().find(|w| w.id() == id)
    }
}

pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().to_string())
}

pub fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}
