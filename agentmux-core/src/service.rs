use crate::git::GitOps;
use crate::model::{Project, Workspace};
use crate::paths::{canonical_path, same_canonical};
use crate::registry::ProjectRegistry;
use crate::script::ScriptRunner;
use crate::store::WorkspaceStore;
use anyhow::{Result, anyhow, bail};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long to wait for `.git` to appear inside a freshly created
/// worktree before rolling the creation back.
const GIT_POLL_TIMEOUT: Duration = Duration::from_secs(3);
const GIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A failed create. `workspace` carries the pending struct whenever the
/// failure happened after validation, so the UI can clear its "creating"
/// indicator keyed by the exact ID a success would have used.
#[derive(Debug)]
pub struct CreateFailure {
    pub workspace: Option<Box<Workspace>>,
    pub error: String,
}

impl CreateFailure {
    fn invalid(error: impl Into<String>) -> Self {
        Self {
            workspace: None,
            error: error.into(),
        }
    }

    fn pending(workspace: Workspace, error: impl Into<String>) -> Self {
        Self {
            workspace: Some(Box::new(workspace)),
            error: error.into(),
        }
    }
}

/// Load, rescan, create, delete and set up workspaces. All methods are
/// called from command thunks off the update loop; results travel back
/// as messages.
pub struct WorkspaceService {
    git: Arc<dyn GitOps>,
    store: Arc<WorkspaceStore>,
    registry: Arc<ProjectRegistry>,
    scripts: Arc<dyn ScriptRunner>,
    workspaces_root: PathBuf,
    git_poll_timeout: Duration,
    git_poll_interval: Duration,
}

impl WorkspaceService {
    pub fn new(
        git: Arc<dyn GitOps>,
        store: Arc<WorkspaceStore>,
        registry: Arc<ProjectRegistry>,
        scripts: Arc<dyn ScriptRunner>,
        workspaces_root: &Path,
    ) -> Self {
        Self {
            git,
            store,
            registry,
            scripts,
            workspaces_root: workspaces_root.to_path_buf(),
            git_poll_timeout: GIT_POLL_TIMEOUT,
            git_poll_interval: GIT_POLL_INTERVAL,
        }
    }

    /// Shorten the `.git` appearance poll, for tests.
    pub fn with_git_poll(mut self, timeout: Duration, interval: Duration) -> Self {
        self.git_poll_timeout = timeout;
        self.git_poll_interval = interval;
        self
    }

    pub fn workspaces_root(&self) -> &Path {
        &self.workspaces_root
    }

    /// Managed root for one project: `<workspaces_root>/<project-name>`.
    fn managed_project_root(&self, project_name: &str) -> Result<PathBuf> {
        validate_project_segment(project_name)?;
        Ok(self.workspaces_root.join(project_name))
    }

    /// Rebuild the full projects list from the registry and the store.
    /// Metadata is authoritative: stored entries are surfaced even when
    /// their on-disk directory has gone missing.
    pub fn load_projects(&self) -> Result<Vec<Project>> {
        let mut projects = Vec::new();
        for path in self.registry.projects() {
            if !self.git.is_git_repository(&path) {
                log::warn!("skipping non-git project {}", path.display());
                continue;
            }
            let mut project = Project::new(&path);
            project.workspaces = self.project_workspaces(&project)?;
            projects.push(project);
        }
        Ok(projects)
    }

    fn project_workspaces(&self, project: &Project) -> Result<Vec<Workspace>> {
        let repo = &project.path;
        let managed = canonical_path(&self.managed_project_root(&project.name)?);
        let discovered_roots: Vec<PathBuf> = self
            .git
            .discover_workspaces(repo)
            .into_iter()
            .map(|w| canonical_path(&w.root))
            .collect();

        let mut primary_meta: Option<Workspace> = None;
        let mut workspaces = Vec::new();
        for ws in self.store.list_by_repo_including_archived(repo) {
            let root = canonical_path(&ws.root);
            if same_canonical(&ws.root, repo) {
                // Metadata for the primary checkout only rehydrates UI
                // state; the workspace itself is rebuilt below.
                primary_meta = Some(ws);
                continue;
            }
            if ws.has_legacy_repo() {
                // Legacy relative repo back-references survive only while
                // discovery still reports the worktree.
                if discovered_roots.contains(&root) {
                    workspaces.push(ws);
                }
                continue;
            }
            if root.starts_with(&managed) {
                workspaces.push(ws);
            }
        }

        let mut primary = self.primary_workspace(project);
        if let Some(meta) = primary_meta {
            primary.open_tabs = meta.open_tabs;
            primary.active_tab_index = meta.active_tab_index;
            primary.env = meta.env;
            primary.created = meta.created;
            if !meta.assistant.is_empty() {
                primary.assistant = meta.assistant;
            }
        }
        workspaces.insert(0, primary);
        Ok(workspaces)
    }

    /// Transient primary checkout for a project, rebuilt from the repo's
    /// current branch on every load.
    fn primary_workspace(&self, project: &Project) -> Workspace {
        let branch = self
            .git
            .current_branch(&project.path)
            .unwrap_or_else(|| "HEAD".to_string());
        let mut ws = Workspace::new(&project.name, &branch, "", &project.path, &project.path);
        ws.assistant = self.store.resolved_default_assistant().to_string();
        ws
    }

    /// Reconcile on-disk discovery into the store for every project:
    /// archive vanished worktrees, import managed ones the store has not
    /// seen. External worktrees stay external.
    pub fn rescan_workspaces(&self) -> Result<()> {
        for path in self.registry.projects() {
            if !self.git.is_git_repository(&path) {
                continue;
            }
            let project = Project::new(&path);
            let managed = self.managed_project_root(&project.name)?;
            let discovered = self.git.discover_workspaces(&path);
            self.store
                .upsert_from_discovery(&path, &discovered, &managed)?;
        }
        Ok(())
    }

    /// The workspace `create_workspace` would persist for these inputs,
    /// without side effects. The UI keys its "creating" spinner by this
    /// ID; the service guarantees the eventual result uses the same one.
    pub fn pending_workspace(&self, project: &Project, name: &str) -> Option<Workspace> {
        let name = name.trim();
        if name.is_empty() || validate_workspace_name(name).is_err() {
            return None;
        }
        let root = self.managed_project_root(&project.name).ok()?.join(name);
        let mut ws = Workspace::new(name, name, "", &project.path, &root);
        ws.assistant = self.store.resolved_default_assistant().to_string();
        Some(ws)
    }

    pub fn create_workspace(
        &self,
        project: &Project,
        name: &str,
        base: &str,
    ) -> Result<Workspace, CreateFailure> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CreateFailure::invalid("workspace name is required"));
        }
        validate_workspace_name(name).map_err(|e| CreateFailure::invalid(e.to_string()))?;

        let base = base.trim();
        let base = if base.is_empty() {
            self.git
                .base_branch(&project.path)
                .unwrap_or_else(|| "HEAD".to_string())
        } else {
            base.to_string()
        };
        validate_base_ref(&base).map_err(|e| CreateFailure::invalid(e.to_string()))?;

        let managed = self
            .managed_project_root(&project.name)
            .map_err(|e| CreateFailure::invalid(e.to_string()))?;
        let root = managed.join(name);
        if !canonical_path(&root).starts_with(canonical_path(&managed)) {
            return Err(CreateFailure::invalid(format!(
                "workspace path {} escapes the managed root",
                root.display()
            )));
        }

        let mut pending = Workspace::new(name, name, &base, &project.path, &root);
        pending.assistant = self.store.resolved_default_assistant().to_string();

        if let Err(e) = self
            .git
            .create_workspace(&project.path, name, &base, &root)
        {
            return Err(CreateFailure::pending(pending, format!("{e:#}")));
        }

        if !self.wait_for_git_entry(&root) {
            self.rollback_create(project, name, &root);
            return Err(CreateFailure::pending(
                pending,
                format!("worktree at {} never produced a .git entry", root.display()),
            ));
        }

        if let Err(e) = self.store.save(&pending) {
            self.rollback_create(project, name, &root);
            return Err(CreateFailure::pending(
                pending,
                format!("failed to persist workspace metadata: {e:#}"),
            ));
        }

        Ok(pending)
    }

    fn wait_for_git_entry(&self, root: &Path) -> bool {
        let deadline = Instant::now() + self.git_poll_timeout;
        loop {
            if root.join(".git").exists() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(self.git_poll_interval);
        }
    }

    fn rollback_create(&self, project: &Project, branch: &str, root: &Path) {
        if let Err(e) = self.git.remove_workspace(&project.path, root) {
            log::warn!("rollback: remove worktree {}: {e:#}", root.display());
        }
        if let Err(e) = self.git.delete_branch(&project.path, branch) {
            log::warn!("rollback: delete branch {branch}: {e:#}");
        }
    }

    pub fn delete_workspace(&self, project: &Project, workspace: &Workspace) -> Result<()> {
        if workspace.is_primary() {
            bail!("cannot delete the primary checkout");
        }
        if project.path.as_os_str().is_empty() || workspace.repo.as_os_str().is_empty() {
            bail!("workspace is missing its repository reference");
        }

        if !same_canonical(&project.path, &workspace.repo)
            && !self.still_discovered(project, &workspace.root)
        {
            bail!(
                "workspace belongs to {}, not {}",
                workspace.repo.display(),
                project.path.display()
            );
        }

        let managed = canonical_path(&self.managed_project_root(&project.name)?);
        if !canonical_path(&workspace.root).starts_with(&managed)
            && !self.still_discovered(project, &workspace.root)
        {
            bail!(
                "workspace root {} is outside the managed root",
                workspace.root.display()
            );
        }

        if let Err(remove_err) = self.git.remove_workspace(&project.path, &workspace.root) {
            // A directory that lost its `.git` is a stale leftover git
            // refuses to touch; remove it ourselves. Anything still
            // carrying `.git` is surfaced, not deleted.
            self.cleanup_stale_root(&workspace.root)
                .map_err(|cleanup_err| anyhow!("{remove_err:#}; {cleanup_err:#}"))?;
        }

        if let Err(e) = self.git.delete_branch(&project.path, &workspace.branch) {
            log::warn!("delete branch {}: {e:#}", workspace.branch);
        }
        if let Err(e) = self.store.delete(&workspace.id()) {
            log::warn!("delete metadata for {}: {e:#}", workspace.id());
        }
        Ok(())
    }

    fn still_discovered(&self, project: &Project, root: &Path) -> bool {
        let root = canonical_path(root);
        self.git
            .discover_workspaces(&project.path)
            .iter()
            .any(|w| canonical_path(&w.root) == root)
    }

    fn cleanup_stale_root(&self, root: &Path) -> Result<()> {
        if !root.exists() {
            return Ok(());
        }
        if root.join(".git").exists() {
            bail!("{} still contains a .git entry", root.display());
        }
        std::fs::remove_dir_all(root)?;
        Ok(())
    }

    pub fn run_setup(&self, workspace: &Workspace) -> Result<()> {
        self.scripts.run_setup(workspace)
    }
}

/// Workspace names become branch names and path segments, so the rules
/// are the intersection of both: no separators, no traversal, no
/// whitespace, no ref-breaking characters.
fn validate_workspace_name(name: &str) -> Result<()> {
    if name == "." || name == ".." {
        bail!("workspace name may not be a directory reference");
    }
    if name.starts_with('-') {
        bail!("workspace name may not start with '-'");
    }
    for c in name.chars() {
        if !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')) {
            bail!("workspace name may not contain {c:?}");
        }
    }
    Ok(())
}

/// Base refs allow the slashes branch names carry, but nothing that
/// could splice extra git arguments or escape a revision parse.
fn validate_base_ref(base: &str) -> Result<()> {
    if base.contains("..") {
        bail!("base ref may not contain '..'");
    }
    if base.starts_with('-') {
        bail!("base ref may not start with '-'");
    }
    for c in base.chars() {
        if !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/')) {
            bail!("base ref may not contain {c:?}");
        }
    }
    Ok(())
}

/// The project-name path segment under the workspaces root.
fn validate_project_segment(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." {
        bail!("unusable project name {name:?}");
    }
    if name.contains('/') || name.contains('\\') {
        bail!("project name {name:?} contains a path separator");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{DiscoveredWorktree, MockGitOps};
    use crate::script::MockScriptRunner;
    use crate::suppress::SuppressionMap;

    struct Fixture {
        _tmp: tempfile::TempDir,
        git: Arc<MockGitOps>,
        store: Arc<WorkspaceStore>,
        registry: Arc<ProjectRegistry>,
        scripts: Arc<MockScriptRunner>,
        workspaces_root: PathBuf,
        repo: PathBuf,
    }

    impl Fixture {
        fn new(git: MockGitOps) -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let data_root = tmp.path().join("data");
            let workspaces_root = tmp.path().join("workspaces");
            let repo = tmp.path().join("repo");
            std::fs::create_dir_all(repo.join(".git")).unwrap();

            let store = Arc::new(WorkspaceStore::new(
                &data_root,
                "claude",
                Arc::new(SuppressionMap::new()),
            ));
            let registry = Arc::new(ProjectRegistry::new(&data_root));
            registry.add_project(&repo).unwrap();
            Self {
                _tmp: tmp,
                git: Arc::new(git),
                store,
                registry,
                scripts: Arc::new(MockScriptRunner::default()),
                workspaces_root,
                repo,
            }
        }

        fn service(&self) -> WorkspaceService {
            WorkspaceService::new(
                Arc::clone(&self.git) as Arc<dyn GitOps>,
                Arc::clone(&self.store),
                Arc::clone(&self.registry),
                Arc::clone(&self.scripts) as Arc<dyn ScriptRunner>,
                &self.workspaces_root,
            )
            .with_git_poll(Duration::from_millis(50), Duration::from_millis(5))
        }

        fn project(&self) -> Project {
            Project::new(&self.repo)
        }
    }

    #[test]
    fn create_succeeds_and_persists() {
        let f = Fixture::new(MockGitOps::materialising());
        let service = f.service();
        let ws = service
            .create_workspace(&f.project(), "feature", "main")
            .unwrap();

        assert_eq!(ws.root, f.workspaces_root.join("repo").join("feature"));
        assert_eq!(ws.branch, "feature");
        assert_eq!(ws.base, "main");
        assert_eq!(ws.assistant, "claude");
        assert!(f.store.load(&ws.id()).is_some());
    }

    #[test]
    fn create_git_failure_reports_pending_without_rollback() {
        let git = MockGitOps::default();
        *git.create_result.lock().unwrap() = Some(Err(anyhow!("fail")));
        let f = Fixture::new(git);
        let service = f.service();

        let failure = service
            .create_workspace(&f.project(), "feature", "main")
            .unwrap_err();
        let pending = failure.workspace.expect("pending workspace");
        assert_eq!(
            pending.root,
            f.workspaces_root.join("repo").join("feature")
        );
        // CreateWorkspace itself failed: nothing to roll back.
        assert!(f.git.remove_calls.lock().unwrap().is_empty());
        assert!(f.git.delete_branch_calls.lock().unwrap().is_empty());
        assert!(f.store.load(&pending.id()).is_none());
    }

    #[test]
    fn create_missing_git_entry_rolls_back() {
        // Mock reports success but never materialises `.git`.
        let f = Fixture::new(MockGitOps::default());
        let service = f.service();

        let failure = service
            .create_workspace(&f.project(), "feature", "main")
            .unwrap_err();
        assert!(failure.workspace.is_some());
        assert_eq!(f.git.remove_calls.lock().unwrap().len(), 1);
        assert_eq!(
            f.git.delete_branch_calls.lock().unwrap().as_slice(),
            ["feature"]
        );
    }

    #[test]
    fn create_validation_failures_have_no_side_effects() {
        let f = Fixture::new(MockGitOps::materialising());
        let service = f.service();

        for (name, base) in [("", "main"), ("  ", "main"), ("..", "main"), ("a b", "main"),
            ("feature", "bad..ref"), ("feature", "-rev")]
        {
            let failure = service
                .create_workspace(&f.project(), name, base)
                .unwrap_err();
            assert!(failure.workspace.is_none(), "{name:?}/{base:?}");
        }
        assert!(f.git.create_calls.lock().unwrap().is_empty());
    }

    #[test]
    fn create_blank_base_resolves_to_default_branch() {
        let git = MockGitOps {
            base_branch: Some("develop".to_string()),
            create_materialises: true,
            ..MockGitOps::default()
        };
        let f = Fixture::new(git);
        let ws = f
            .service()
            .create_workspace(&f.project(), "feature", "")
            .unwrap();
        assert_eq!(ws.base, "develop");
        let calls = f.git.create_calls.lock().unwrap();
        assert_eq!(calls[0].2, "develop");
    }

    #[test]
    fn create_rejects_traversal_project_name() {
        let f = Fixture::new(MockGitOps::materialising());
        let service = f.service();
        let mut project = f.project();
        project.name = "..".to_string();

        let failure = service
            .create_workspace(&project, "feature", "main")
            .unwrap_err();
        assert!(failure.workspace.is_none());
        assert!(f.git.create_calls.lock().unwrap().is_empty());
    }

    #[test]
    fn pending_workspace_matches_create_identity() {
        let f = Fixture::new(MockGitOps::materialising());
        let service = f.service();
        let pending = service
            .pending_workspace(&f.project(), "feature")
            .unwrap();
        let created = service
            .create_workspace(&f.project(), "feature", "main")
            .unwrap();
        assert_eq!(pending.id(), created.id());
    }

    #[test]
    fn delete_rejects_primary_without_side_effects() {
        let f = Fixture::new(MockGitOps::default());
        let service = f.service();
        let primary = Workspace::new("repo", "main", "", &f.repo, &f.repo);

        assert!(service.delete_workspace(&f.project(), &primary).is_err());
        assert!(f.git.remove_calls.lock().unwrap().is_empty());
        assert!(f.git.delete_branch_calls.lock().unwrap().is_empty());
    }

    #[test]
    fn delete_rejects_repo_mismatch_unless_discovered() {
        let f = Fixture::new(MockGitOps::default());
        let service = f.service();
        let root = f.workspaces_root.join("repo").join("feat");
        let foreign = Workspace::new("feat", "feat", "main", Path::new("/somewhere/else"), &root);

        assert!(service.delete_workspace(&f.project(), &foreign).is_err());
        assert!(f.git.remove_calls.lock().unwrap().is_empty());

        // Same mismatch, but discovery still reports the worktree:
        // the legacy exception lets the delete proceed.
        f.git.worktrees.lock().unwrap().push(DiscoveredWorktree {
            root: root.clone(),
            branch: Some("feat".to_string()),
        });
        service.delete_workspace(&f.project(), &foreign).unwrap();
        assert_eq!(f.git.remove_calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn delete_stale_root_without_git_entry_is_cleaned_up() {
        let git = MockGitOps::default();
        *git.remove_result.lock().unwrap() = Some(Err(anyhow!("not a working tree")));
        let f = Fixture::new(git);
        let service = f.service();

        let root = f.workspaces_root.join("repo").join("stale");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("leftover.txt"), "x").unwrap();
        let ws = Workspace::new("stale", "stale", "main", &f.repo, &root);

        service.delete_workspace(&f.project(), &ws).unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn delete_stale_root_with_git_entry_surfaces_joined_error() {
        let git = MockGitOps::default();
        *git.remove_result.lock().unwrap() = Some(Err(anyhow!("remove refused")));
        let f = Fixture::new(git);
        let service = f.service();

        let root = f.workspaces_root.join("repo").join("half-alive");
        std::fs::create_dir_all(root.join(".git")).unwrap();
        let ws = Workspace::new("half-alive", "half-alive", "main", &f.repo, &root);

        let err = service.delete_workspace(&f.project(), &ws).unwrap_err();
        assert!(err.to_string().contains("remove refused"));
        assert!(err.to_string().contains(".git"));
        assert!(root.exists());
    }

    #[test]
    fn delete_branch_failure_is_not_fatal() {
        let git = MockGitOps::default();
        *git.delete_branch_result.lock().unwrap() = Some(Err(anyhow!("branch busy")));
        let f = Fixture::new(git);
        let service = f.service();

        let root = f.workspaces_root.join("repo").join("feat");
        std::fs::create_dir_all(&root).unwrap();
        let ws = Workspace::new("feat", "feat", "main", &f.repo, &root);
        service.delete_workspace(&f.project(), &ws).unwrap();
    }

    #[test]
    fn load_projects_prepends_primary_and_scopes_workspaces() {
        let git = MockGitOps {
            current_branch: Some("main".to_string()),
            ..MockGitOps::default()
        };
        let f = Fixture::new(git);
        let service = f.service();

        let managed = Workspace::new(
            "feat",
            "feat",
            "main",
            &f.repo,
            &f.workspaces_root.join("repo").join("feat"),
        );
        let external = Workspace::new("ext", "ext", "main", &f.repo, Path::new("/elsewhere/ext"));
        f.store.save(&managed).unwrap();
        f.store.save(&external).unwrap();

        let projects = service.load_projects().unwrap();
        assert_eq!(projects.len(), 1);
        let names: Vec<&str> = projects[0]
            .workspaces
            .iter()
            .map(|w| w.name.as_str())
            .collect();
        assert_eq!(names[0], "repo"); // primary first
        assert!(names.contains(&"feat"));
        assert!(!names.contains(&"ext"));
        assert!(projects[0].workspaces[0].is_primary());
        assert_eq!(projects[0].workspaces[0].branch, "main");
    }

    #[test]
    fn load_projects_keeps_stored_entry_with_missing_directory() {
        let git = MockGitOps {
            current_branch: Some("main".to_string()),
            ..MockGitOps::default()
        };
        let f = Fixture::new(git);
        let ghost = Workspace::new(
            "ghost",
            "ghost",
            "main",
            &f.repo,
            &f.workspaces_root.join("repo").join("ghost"),
        );
        f.store.save(&ghost).unwrap();

        let projects = f.service().load_projects().unwrap();
        assert!(
            projects[0]
                .workspaces
                .iter()
                .any(|w| w.name == "ghost")
        );
    }

    #[test]
    fn load_projects_retains_legacy_only_while_discovered() {
        let git = MockGitOps {
            current_branch: Some("main".to_string()),
            ..MockGitOps::default()
        };
        let f = Fixture::new(git);
        let root = f.workspaces_root.join("repo").join("old");
        let legacy = Workspace::new("old", "old", "main", Path::new("./repo"), &root);
        f.store.save(&legacy).unwrap();

        // Not discovered: dropped.
        let projects = f.service().load_projects().unwrap();
        assert!(!projects[0].workspaces.iter().any(|w| w.name == "old"));

        // Discovered: retained as-is.
        f.git.worktrees.lock().unwrap().push(DiscoveredWorktree {
            root,
            branch: Some("old".to_string()),
        });
        let projects = f.service().load_projects().unwrap();
        assert!(projects[0].workspaces.iter().any(|w| w.name == "old"));
    }

    #[test]
    fn load_projects_rehydrates_primary_ui_state() {
        let git = MockGitOps {
            current_branch: Some("main".to_string()),
            ..MockGitOps::default()
        };
        let f = Fixture::new(git);
        let mut primary_meta = Workspace::new("repo", "main", "", &f.repo, &f.repo);
        primary_meta.open_tabs.push(crate::model::TabDescriptor {
            assistant: "claude".to_string(),
            name: "claude 1".to_string(),
            session: "agentmux-x-0".to_string(),
            detached: false,
            status: String::new(),
        });
        primary_meta.active_tab_index = 0;
        f.store.save(&primary_meta).unwrap();

        let projects = f.service().load_projects().unwrap();
        let primary = &projects[0].workspaces[0];
        assert!(primary.is_primary());
        assert_eq!(primary.open_tabs.len(), 1);
        // The list holds exactly one entry for the primary checkout.
        assert_eq!(
            projects[0]
                .workspaces
                .iter()
                .filter(|w| w.is_primary())
                .count(),
            1
        );
    }

    #[test]
    fn load_projects_skips_non_git_registry_entries() {
        let f = Fixture::new(MockGitOps::default());
        f.registry
            .add_project(&f.workspaces_root.join("not-a-repo"))
            .unwrap();
        let projects = f.service().load_projects().unwrap();
        assert_eq!(projects.len(), 1);
    }

    #[test]
    fn rescan_feeds_discovery_into_store() {
        let f = Fixture::new(MockGitOps::default());
        f.git.worktrees.lock().unwrap().extend([
            DiscoveredWorktree {
                root: f.repo.clone(),
                branch: Some("main".to_string()),
            },
            DiscoveredWorktree {
                root: f.workspaces_root.join("repo").join("found"),
                branch: Some("found".to_string()),
            },
        ]);

        f.service().rescan_workspaces().unwrap();
        let stored = f.store.list_by_repo(&f.repo);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].name, "found");
    }

    #[test]
    fn run_setup_delegates_to_runner() {
        let f = Fixture::new(MockGitOps::default());
        let service = f.service();
        let ws = Workspace::new("feat", "feat", "main", &f.repo, Path::new("/tmp/x"));
        service.run_setup(&ws).unwrap();
        assert_eq!(f.scripts.runs.lock().unwrap().as_slice(), [ws.id()]);
    }

    #[test]
    fn workspace_name_rules() {
        assert!(validate_workspace_name("feature-1_x.y").is_ok());
        assert!(validate_workspace_name("..").is_err());
        assert!(validate_workspace_name("a/b").is_err());
        assert!(validate_workspace_name("-flag").is_err());
        assert!(validate_workspace_name("sp ace").is_err());
    }

    #[test]
    fn base_ref_rules() {
        assert!(validate_base_ref("main").is_ok());
        assert!(validate_base_ref("feat/thing").is_ok());
        assert!(validate_base_ref("HEAD").is_ok());
        assert!(validate_base_ref("a..b").is_err());
        assert!(validate_base_ref("-rev").is_err());
        assert!(validate_base_ref("bad ref").is_err());
    }
}
