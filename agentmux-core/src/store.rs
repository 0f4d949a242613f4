use crate::git::DiscoveredWorktree;
use crate::model::{Workspace, display_name};
use crate::paths::{canonical_path, clean_path, same_canonical};
use crate::suppress::SuppressionMap;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const WORKSPACES_DIR_NAME: &str = "workspaces";
const METADATA_FILE_NAME: &str = "workspace.json";

/// On-disk workspace metadata: one directory per workspace ID under the
/// data root, each holding a `workspace.json`. The store is the
/// authoritative source for workspace lists; discovery only feeds it.
///
/// Every save records a suppression marker so the state watcher can tell
/// our own writes from externally-authored ones.
pub struct WorkspaceStore {
    data_root: PathBuf,
    default_assistant: String,
    suppression: Arc<SuppressionMap>,
}

impl WorkspaceStore {
    pub fn new(data_root: &Path, default_assistant: &str, suppression: Arc<SuppressionMap>) -> Self {
        Self {
            data_root: data_root.to_path_buf(),
            default_assistant: default_assistant.to_string(),
            suppression,
        }
    }

    pub fn workspaces_dir(&self) -> PathBuf {
        self.data_root.join(WORKSPACES_DIR_NAME)
    }

    /// Absolute cleaned path of the metadata file for a workspace ID;
    /// also the key the suppression map uses.
    pub fn metadata_path_for(&self, id: &str) -> PathBuf {
        clean_path(&self.workspaces_dir().join(id).join(METADATA_FILE_NAME))
    }

    pub fn resolved_default_assistant(&self) -> &str {
        &self.default_assistant
    }

    pub fn save(&self, workspace: &Workspace) -> Result<()> {
        let id = workspace.id();
        let dir = self.workspaces_dir().join(&id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        let path = self.metadata_path_for(&id);
        let serialized = serde_json::to_string_pretty(workspace)?;
        fs::write(&path, serialized)
            .with_context(|| format!("failed to write {}", path.display()))?;
        self.suppression.record(&path);
        Ok(())
    }

    pub fn load(&self, id: &str) -> Option<Workspace> {
        let path = self.metadata_path_for(id);
        let contents = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(ws) => Some(ws),
            Err(e) => {
                log::warn!("unreadable workspace metadata {}: {e}", path.display());
                None
            }
        }
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let dir = self.workspaces_dir().join(id);
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .with_context(|| format!("failed to remove {}", dir.display()))?;
        }
        Ok(())
    }

    /// All stored workspaces, archived included. Entries whose metadata
    /// fails to parse are skipped with a warning, never fatal.
    pub fn list_all(&self) -> Vec<Workspace> {
        let Ok(entries) = fs::read_dir(self.workspaces_dir()) else {
            return Vec::new();
        };
        let mut workspaces: Vec<Workspace> = entries
            .flatten()
            .filter_map(|entry| {
                let id = entry.file_name().to_string_lossy().to_string();
                self.load(&id)
            })
            .collect();
        workspaces.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.name.cmp(&b.name)));
        workspaces
    }

    /// Stored workspaces belonging to `repo`, archived included. Legacy
    /// entries with a relative repo back-reference are candidates for
    /// every repo; callers scope them by managed root or discovery.
    pub fn list_by_repo_including_archived(&self, repo: &Path) -> Vec<Workspace> {
        self.list_all()
            .into_iter()
            .filter(|ws| ws.has_legacy_repo() || same_canonical(&ws.repo, repo))
            .collect()
    }

    /// Like [`Self::list_by_repo_including_archived`] minus archived
    /// entries.
    pub fn list_by_repo(&self, repo: &Path) -> Vec<Workspace> {
        self.list_by_repo_including_archived(repo)
            .into_iter()
            .filter(|ws| !ws.archived)
            .collect()
    }

    pub fn has_legacy_workspaces(&self, repo: &Path) -> bool {
        self.list_by_repo_including_archived(repo)
            .iter()
            .any(Workspace::has_legacy_repo)
    }

    /// Reconcile discovery results for one repo into the store: stored
    /// entries that discovery no longer reports are archived (timestamped
    /// now); discovered worktrees under the managed project root that the
    /// store has never seen are inserted. Existing entries keep their
    /// archive status. External worktrees are intentionally not imported.
    pub fn upsert_from_discovery(
        &self,
        repo: &Path,
        discovered: &[DiscoveredWorktree],
        managed_project_root: &Path,
    ) -> Result<()> {
        let discovered_roots: Vec<PathBuf> = discovered
            .iter()
            .map(|d| canonical_path(&d.root))
            .collect();

        let stored = self.list_by_repo_including_archived(repo);
        for mut ws in stored {
            let root = canonical_path(&ws.root);
            let seen = discovered_roots.iter().any(|d| *d == root);
            if !seen && !ws.archived {
                ws.archive();
                self.save(&ws)?;
            }
        }

        let stored = self.list_by_repo_including_archived(repo);
        let managed = canonical_path(managed_project_root);
        for worktree in discovered {
            let root = canonical_path(&worktree.root);
            if same_canonical(&root, repo) {
                // The primary checkout is transient, never stored.
                continue;
            }
            if !root.starts_with(&managed) {
                continue;
            }
            let known = stored
                .iter()
                .any(|ws| same_canonical(&ws.root, &root));
            if known {
                continue;
            }
            let name = display_name(&root);
            let branch = worktree.branch.clone().unwrap_or_else(|| name.clone());
            let mut ws = Workspace::new(&name, &branch, "", repo, &root);
            ws.assistant = self.default_assistant.clone();
            self.save(&ws)?;
        }
        Ok(())
    }
}
