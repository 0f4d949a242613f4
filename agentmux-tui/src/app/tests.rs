use super::*;
use agentmux_core::git::MockGitOps;
use agentmux_core::ids::workspace_id;
use agentmux_core::model::{TabDescriptor, Workspace};
use agentmux_core::msg::StateReason;
use agentmux_core::registry::ProjectRegistry;
use agentmux_core::script::MockScriptRunner;
use agentmux_core::status::GitStatus;
use agentmux_core::tmux::MockTmux;
use agentmux_core::watch::{MockFileWatcher, WatchError};
use std::fs;
use std::path::Path;

struct Fixture {
    _tmp: tempfile::TempDir,
    app: App,
    bus: Bus,
    sender: MsgSender,
    git: Arc<MockGitOps>,
    tmux: Arc<MockTmux>,
    watcher: Arc<MockFileWatcher>,
    repo: PathBuf,
    workspaces_root: PathBuf,
}

fn fixture() -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let data_root = tmp.path().join("data");
    let workspaces_root = tmp.path().join("workspaces");
    let repo = tmp.path().join("repo");
    fs::create_dir_all(repo.join(".git")).unwrap();

    let suppression = Arc::new(SuppressionMap::new());
    let git = Arc::new(MockGitOps::materialising());
    let tmux = Arc::new(MockTmux::default());
    let watcher = Arc::new(MockFileWatcher::default());
    let store = Arc::new(WorkspaceStore::new(
        &data_root,
        "claude",
        Arc::clone(&suppression),
    ));
    let registry = Arc::new(ProjectRegistry::new(&data_root));
    registry.add_project(&repo).unwrap();
    let service = Arc::new(
        WorkspaceService::new(
            Arc::clone(&git) as Arc<dyn GitOps>,
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::new(MockScriptRunner::default()) as Arc<dyn ScriptRunner>,
            &workspaces_root,
        )
        .with_git_poll(Duration::from_millis(50), Duration::from_millis(5)),
    );
    let (bus, sender) = Bus::new();
    let state_watcher = Arc::new(StateWatcher::new(
        &data_root,
        &data_root.join("projects.json"),
        &store.workspaces_dir(),
        sender.clone(),
    ));
    let scanner = Arc::new(ActivityScanner::new(Arc::clone(&tmux) as Arc<dyn Tmux>));

    let services = Arc::new(Services {
        git: Arc::clone(&git) as Arc<dyn GitOps>,
        tmux: Arc::clone(&tmux) as Arc<dyn Tmux>,
        service,
        store,
        watcher: Arc::clone(&watcher) as Arc<dyn FileWatcher>,
        state_watcher,
        status_cache: Arc::new(StatusCache::new()),
        suppression,
        scripts: Arc::new(MockScriptRunner::default()) as Arc<dyn ScriptRunner>,
        scanner,
        logs_dir: data_root.join("logs"),
    });

    Fixture {
        app: App::new(services),
        bus,
        sender,
        git,
        tmux,
        watcher,
        repo,
        workspaces_root,
        _tmp: tmp,
    }
}

impl Fixture {
    fn workspace(&self, name: &str) -> Workspace {
        let root = self.workspaces_root.join("repo").join(name);
        Workspace::new(name, name, "main", &self.repo, &root)
    }

    fn project_with(&self, workspaces: Vec<Workspace>) -> Project {
        let mut project = Project::new(&self.repo);
        project.workspaces = workspaces;
        project
    }

    fn load(&mut self, workspaces: Vec<Workspace>) {
        let project = self.project_with(workspaces);
        let cmds = handlers::update(&mut self.app, Msg::ProjectsLoaded(vec![project]));
        drop(cmds); // status/scan follow-ups are irrelevant unless a test runs them
    }

    fn recv(&self) -> Msg {
        self.bus
            .recv_timeout(Duration::from_secs(2))
            .expect("expected a message")
    }
}

fn tab(session: &str) -> TabDescriptor {
    TabDescriptor {
        assistant: "claude".to_string(),
        name: session.to_string(),
        session: session.to_string(),
        detached: false,
        status: String::new(),
    }
}

#[test]
fn projects_loaded_shows_welcome_when_empty() {
    let mut f = fixture();
    let cmds = handlers::update(&mut f.app, Msg::ProjectsLoaded(Vec::new()));
    assert!(f.app.show_welcome);
    // Still schedules the orphan-session sweep.
    assert_eq!(cmds.len(), 1);
}

#[test]
fn activation_sets_selection_watches_root_and_requests_full_status() {
    let mut f = fixture();
    let ws = f.workspace("feat");
    let id = ws.id();
    let root = ws.root.clone();
    f.load(vec![ws]);

    let cmds = handlers::update(&mut f.app, Msg::WorkspaceActivated { id: id.clone() });
    assert_eq!(f.app.active.as_ref().unwrap().workspace_id, id);
    assert!(!f.app.show_welcome);
    assert!(f.watcher.is_watching(&root));

    cmd::run_all(cmds, &f.sender);
    match f.recv() {
        Msg::GitStatusResult { root: r, status: Some(s), .. } => {
            assert_eq!(r, root);
            assert!(s.has_line_stats);
        }
        other => panic!("expected full GitStatusResult, got {other:?}"),
    }
}

#[test]
fn activation_adopts_live_tmux_sessions() {
    let mut f = fixture();
    let ws = f.workspace("feat");
    let id = ws.id();
    f.tmux
        .create_session(&format!("agentmux-{id}-0"), Path::new("/tmp"), None)
        .unwrap();
    f.load(vec![ws]);

    handlers::update(&mut f.app, Msg::WorkspaceActivated { id: id.clone() });
    let tabs = f.app.center.tabs_for(&id).unwrap();
    assert_eq!(tabs.tabs.len(), 1);
    assert_eq!(tabs.tabs[0].descriptor.session, format!("agentmux-{id}-0"));
}

#[test]
fn rebind_migrates_every_id_keyed_index() {
    let mut f = fixture();

    // Record the active selection through a spelling that cannot be
    // resolved yet: an alias directory that does not exist. Once the
    // alias becomes a symlink, the same spelling canonicalises to the
    // real path and the workspace ID changes.
    let alias = f._tmp.path().join("alias");
    let real = f._tmp.path().join("real");
    let alias_repo = alias.join("repo");
    let alias_root = alias.join("ws").join("feat");
    let old_id = workspace_id(&alias_repo, &alias_root);

    fs::create_dir_all(real.join("repo")).unwrap();
    fs::create_dir_all(real.join("ws").join("feat")).unwrap();
    #[cfg(unix)]
    std::os::unix::fs::symlink(&real, &alias).unwrap();
    #[cfg(not(unix))]
    return;

    f.app.active = Some(ActiveSelection {
        project_path: alias_repo.clone(),
        workspace_id: old_id.clone(),
        repo: alias_repo.clone(),
        root: alias_root.clone(),
    });
    f.app.dirty.insert(old_id.clone());
    f.app.center.add_tab(&old_id, tab("agentmux-x-0"));
    f.app.sidebar.add_terminal(&old_id, "term-1");
    f.watcher.watch(&alias_root).unwrap();

    let new_repo = real.join("repo");
    let new_root = real.join("ws").join("feat");
    let ws = Workspace::new("feat", "feat", "main", &new_repo, &new_root);
    let new_id = ws.id();
    assert_ne!(new_id, old_id);
    let mut project = Project::new(&new_repo);
    project.workspaces = vec![ws];
    handlers::update(&mut f.app, Msg::ProjectsLoaded(vec![project]));

    let active = f.app.active.as_ref().expect("still bound");
    assert_eq!(active.workspace_id, new_id);
    assert!(f.app.dirty.contains(&new_id));
    assert!(!f.app.dirty.contains(&old_id));
    assert!(f.app.center.has_state(&new_id));
    assert!(!f.app.center.has_state(&old_id));
    assert_eq!(f.app.sidebar.terminals_for(&new_id).len(), 1);
    assert!(
        f.watcher
            .unwatch_calls
            .lock()
            .unwrap()
            .contains(&alias_root)
    );
    assert!(f.watcher.is_watching(&new_root));
}

#[test]
fn rebind_clears_selection_when_workspace_is_gone() {
    let mut f = fixture();
    let ws = f.workspace("feat");
    let id = ws.id();
    let root = ws.root.clone();
    f.load(vec![ws]);
    handlers::update(&mut f.app, Msg::WorkspaceActivated { id });

    f.load(Vec::new());
    assert!(f.app.active.is_none());
    assert!(f.app.show_welcome);
    assert!(f.watcher.unwatch_calls.lock().unwrap().contains(&root));
}

#[test]
fn rebind_fallback_never_prefers_archived() {
    let mut f = fixture();
    let live = f.workspace("feat");
    let id = live.id();
    f.load(vec![live.clone()]);
    handlers::update(&mut f.app, Msg::WorkspaceActivated { id: id.clone() });

    // Same canonical pair twice: archived first in list, live second.
    // Force the ID-miss path by pretending the previous selection used a
    // different ID.
    f.app.active.as_mut().unwrap().workspace_id = "0000ffff0000".to_string();
    let mut archived = live.clone();
    archived.archive();
    f.load(vec![archived, live]);

    let active = f.app.active.as_ref().expect("rebound");
    assert_eq!(active.workspace_id, id);
}

#[test]
fn watch_limit_warns_exactly_once() {
    let mut f = fixture();
    let a = f.workspace("a");
    let b = f.workspace("b");
    let (id_a, id_b) = (a.id(), b.id());
    f.watcher.push_watch_result(Err(WatchError::Limit));
    f.watcher.push_watch_result(Err(WatchError::Limit));
    f.load(vec![a, b]);

    handlers::update(&mut f.app, Msg::WorkspaceActivated { id: id_a });
    assert!(f.app.watch_limit_hit);
    assert!(f.app.error.as_deref().unwrap_or("").contains("file watching"));

    f.app.clear_error();
    handlers::update(&mut f.app, Msg::WorkspaceActivated { id: id_b });
    assert!(f.app.error.is_none());
}

#[test]
fn created_clears_pending_and_schedules_setup_and_reload() {
    let mut f = fixture();
    let ws = f.workspace("feat");
    let id = ws.id();
    f.app.pending.insert(id.clone());

    let cmds = handlers::update(
        &mut f.app,
        Msg::WorkspaceCreated {
            workspace: Box::new(ws),
            warning: None,
        },
    );
    assert!(!f.app.pending.contains(&id));
    assert_eq!(cmds.len(), 2); // run_setup + load_projects
}

#[test]
fn create_failed_clears_pending_by_the_service_id() {
    let mut f = fixture();
    let ws = f.workspace("feat");
    let id = ws.id();
    f.app.pending.insert(id.clone());

    handlers::update(
        &mut f.app,
        Msg::WorkspaceCreateFailed {
            workspace: Some(Box::new(ws)),
            error: "fail".to_string(),
        },
    );
    assert!(f.app.pending.is_empty());
    assert_eq!(f.app.error.as_deref(), Some("fail"));
}

#[test]
fn deleted_cleans_indexes_and_reloads() {
    let mut f = fixture();
    let ws = f.workspace("feat");
    let id = ws.id();
    f.app.deleting.insert(id.clone());
    f.app.dirty.insert(id.clone());
    f.app.center.add_tab(&id, tab("s"));

    let cmds = handlers::update(&mut f.app, Msg::WorkspaceDeleted { id: id.clone() });
    assert!(f.app.deleting.is_empty());
    assert!(f.app.dirty.is_empty());
    assert!(!f.app.center.has_state(&id));
    assert_eq!(cmds.len(), 1);
}

#[test]
fn self_saved_metadata_event_is_suppressed() {
    let mut f = fixture();
    let ws = f.workspace("feat");
    let id = ws.id();
    f.app.services.store.save(&ws).unwrap();
    let path = f.app.services.store.metadata_path_for(&id);

    let cmds = handlers::update(
        &mut f.app,
        Msg::StateFileChanged {
            reason: StateReason::Workspaces,
            paths: vec![path.clone()],
        },
    );
    // Watcher restart only; no reload.
    assert_eq!(cmds.len(), 1);

    // A foreign process rewrites the file: the fingerprint mismatches
    // and the reload happens.
    fs::write(&path, "{\"name\":\"edited\"}").unwrap();
    let cmds = handlers::update(
        &mut f.app,
        Msg::StateFileChanged {
            reason: StateReason::Workspaces,
            paths: vec![path],
        },
    );
    assert_eq!(cmds.len(), 2);
}

#[test]
fn registry_change_always_reloads() {
    let mut f = fixture();
    let cmds = handlers::update(
        &mut f.app,
        Msg::StateFileChanged {
            reason: StateReason::Projects,
            paths: vec![PathBuf::from("/data/projects.json")],
        },
    );
    assert_eq!(cmds.len(), 2);
}

#[test]
fn persist_debounce_drops_stale_tokens() {
    let mut f = fixture();
    let ws = f.workspace("feat");
    let id = ws.id();
    f.load(vec![ws]);

    let cmds = handlers::update(&mut f.app, Msg::TabDetached { id: id.clone() });
    assert_eq!(cmds.len(), 1);
    let first_token = f.app.persist_token;
    handlers::update(&mut f.app, Msg::TabDetached { id: id.clone() });
    assert!(f.app.persist_token > first_token);

    // The superseded tick is dropped and the dirty set survives.
    let cmds = handlers::update(&mut f.app, Msg::PersistTick { token: first_token });
    assert!(cmds.is_empty());
    assert!(f.app.dirty.contains(&id));

    // The current tick flushes exactly one save per dirty workspace.
    let token = f.app.persist_token;
    let cmds = handlers::update(&mut f.app, Msg::PersistTick { token });
    assert_eq!(cmds.len(), 1);
    assert!(f.app.dirty.is_empty());
}

#[test]
fn persist_tick_folds_center_tabs_into_saved_metadata() {
    let mut f = fixture();
    let ws = f.workspace("feat");
    let id = ws.id();
    f.load(vec![ws]);
    f.app.center.add_tab(&id, tab("agentmux-feat-0"));

    handlers::update(&mut f.app, Msg::TabDetached { id: id.clone() });
    let token = f.app.persist_token;
    let cmds = handlers::update(&mut f.app, Msg::PersistTick { token });
    cmd::run_all(cmds, &f.sender);

    // The save runs on a worker thread; wait for the file to appear.
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if let Some(saved) = f.app.services.store.load(&id)
            && !saved.open_tabs.is_empty()
        {
            assert_eq!(saved.open_tabs[0].session, "agentmux-feat-0");
            break;
        }
        assert!(Instant::now() < deadline, "save never landed");
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn shutdown_persists_explicit_empty_as_zero_tabs() {
    let mut f = fixture();
    let mut ws = f.workspace("feat");
    ws.open_tabs.push(tab("agentmux-feat-0"));
    let id = ws.id();
    f.app.services.store.save(&ws).unwrap();
    f.load(vec![ws]);

    // The user closes the last tab, then the process shuts down.
    f.app.center.add_tab(&id, tab("agentmux-feat-0"));
    f.app.center.close_tab(&id, 0);
    handlers::update(&mut f.app, Msg::Shutdown);

    assert!(f.app.should_quit);
    let saved = f.app.services.store.load(&id).unwrap();
    assert!(saved.open_tabs.is_empty());
}

#[test]
fn file_event_on_active_root_requests_full_status() {
    let mut f = fixture();
    let ws = f.workspace("feat");
    let id = ws.id();
    let root = ws.root.clone();
    f.load(vec![ws]);
    handlers::update(&mut f.app, Msg::WorkspaceActivated { id });
    // Drain nothing; run only the file-event follow-up.
    let cmds = handlers::update(&mut f.app, Msg::FileChanged { root: root.clone() });
    cmd::run_all(cmds, &f.sender);
    match f.recv() {
        Msg::GitStatusResult { status: Some(s), .. } => assert!(s.has_line_stats),
        other => panic!("expected GitStatusResult, got {other:?}"),
    }
}

#[test]
fn file_event_on_other_root_requests_fast_status() {
    let mut f = fixture();
    let a = f.workspace("a");
    let b = f.workspace("b");
    let id_a = a.id();
    let root_b = b.root.clone();
    f.load(vec![a, b]);
    handlers::update(&mut f.app, Msg::WorkspaceActivated { id: id_a });

    let cmds = handlers::update(&mut f.app, Msg::FileChanged { root: root_b });
    cmd::run_all(cmds, &f.sender);
    match f.recv() {
        Msg::GitStatusResult { status: Some(s), .. } => assert!(!s.has_line_stats),
        other => panic!("expected GitStatusResult, got {other:?}"),
    }
}

#[test]
fn status_tick_reemits_cached_full_result() {
    let mut f = fixture();
    let ws = f.workspace("feat");
    let id = ws.id();
    let root = ws.root.clone();
    f.load(vec![ws]);
    handlers::update(&mut f.app, Msg::WorkspaceActivated { id });

    let cached = GitStatus {
        additions: 42,
        has_line_stats: true,
        ..GitStatus::default()
    };
    f.app.services.status_cache.put(&root, cached.clone());

    let cmds = handlers::update(&mut f.app, Msg::StatusTick);
    cmd::run_all(cmds, &f.sender);
    match f.recv() {
        Msg::GitStatusResult { status: Some(s), .. } => assert_eq!(s, cached),
        other => panic!("expected GitStatusResult, got {other:?}"),
    }
}

#[test]
fn status_result_updates_sidebar_only_for_active_root() {
    let mut f = fixture();
    let a = f.workspace("a");
    let b = f.workspace("b");
    let id_a = a.id();
    let (root_a, root_b) = (a.root.clone(), b.root.clone());
    f.load(vec![a, b]);
    handlers::update(&mut f.app, Msg::WorkspaceActivated { id: id_a });

    let status = GitStatus {
        unstaged: 3,
        has_line_stats: true,
        ..GitStatus::default()
    };
    handlers::update(
        &mut f.app,
        Msg::GitStatusResult {
            root: root_b,
            status: Some(status.clone()),
            error: None,
        },
    );
    assert!(f.app.sidebar.status().is_none());

    handlers::update(
        &mut f.app,
        Msg::GitStatusResult {
            root: root_a,
            status: Some(status),
            error: None,
        },
    );
    assert_eq!(f.app.sidebar.status().unwrap().unstaged, 3);
}

#[test]
fn activity_updates_flow_to_dashboard() {
    let mut f = fixture();
    let ws = f.workspace("feat");
    let id = ws.id();
    f.load(vec![ws]);

    handlers::update(
        &mut f.app,
        Msg::ActivityUpdated {
            active: HashSet::from([id.clone()]),
            reaped: vec!["agentmux-dead-0".to_string()],
        },
    );
    assert!(f.app.dashboard.is_active(&id));
    assert!(f.app.dashboard.any_working());
}

#[test]
fn watchdog_restarts_readers_once_per_session() {
    let mut f = fixture();
    let ws = f.workspace("feat");
    let id = ws.id();
    f.load(vec![ws]);
    f.app.center.add_tab(&id, tab("agentmux-feat-0"));

    let cmds = handlers::update(&mut f.app, Msg::WatchdogTick);
    assert_eq!(cmds.len(), 1);
    cmd::run_all(cmds, &f.sender);
    let deadline = Instant::now() + Duration::from_secs(2);
    while f.tmux.piped.lock().unwrap().is_empty() {
        assert!(Instant::now() < deadline, "pipe-pane never ran");
        std::thread::sleep(Duration::from_millis(10));
    }

    // Next tick: reader is bookkept as running, nothing to do.
    let cmds = handlers::update(&mut f.app, Msg::WatchdogTick);
    assert!(cmds.is_empty());
}

#[test]
fn confirm_delete_marks_deleting_and_schedules_cleanup() {
    let mut f = fixture();
    let ws = f.workspace("feat");
    let id = ws.id();
    f.load(vec![ws]);
    f.app.center.add_tab(&id, tab("agentmux-feat-0"));
    f.tmux
        .create_session("agentmux-feat-0", Path::new("/tmp"), None)
        .unwrap();

    let cmds = confirm_delete(&mut f.app, &id);
    assert!(f.app.deleting.contains(&id));
    assert_eq!(cmds.len(), 2); // session cleanup + delete
    cmd::run_all(cmds, &f.sender);

    loop {
        if let Msg::WorkspaceDeleted { id: deleted } = f.recv() {
            assert_eq!(deleted, id);
            break;
        }
    }
    assert_eq!(f.git.remove_calls.lock().unwrap().len(), 1);
    let deadline = Instant::now() + Duration::from_secs(2);
    while !f.tmux.killed.lock().unwrap().contains(&"agentmux-feat-0".to_string()) {
        assert!(Instant::now() < deadline, "session was never killed");
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn command_panic_is_reported_not_fatal() {
    let mut f = fixture();
    handlers::update(
        &mut f.app,
        Msg::CommandPanicked {
            context: "boom".to_string(),
        },
    );
    assert!(f.app.error.as_deref().unwrap_or("").contains("boom"));
    assert!(!f.app.should_quit);
}
