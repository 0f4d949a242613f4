use super::{ActiveSelection, App, cmd, cmd::Cmd, persist, watchdog};
use agentmux_core::model::{Project, Workspace};
use agentmux_core::msg::{Msg, StateReason};
use agentmux_core::paths::same_canonical;
use agentmux_core::tmux::workspace_id_of_session;
use agentmux_core::watch::WatchError;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// The lifecycle dispatcher: apply one message to the state, return the
/// follow-up commands. Synchronous; every blocking operation lives in
/// the returned commands.
pub fn update(app: &mut App, msg: Msg) -> Vec<Cmd> {
    match msg {
        Msg::ProjectsLoaded(projects) => handle_projects_loaded(app, projects),
        Msg::ProjectsLoadFailed(error) => {
            app.set_error(&error);
            Vec::new()
        }
        Msg::RefreshDashboard => vec![cmd::load_projects(Arc::clone(&app.services.service))],
        Msg::WorkspaceActivated { id } => handle_workspace_activated(app, &id),
        Msg::WorkspaceCreated { workspace, warning } => {
            handle_workspace_created(app, *workspace, warning)
        }
        Msg::WorkspaceCreateFailed { workspace, error } => {
            if let Some(workspace) = workspace {
                app.pending.remove(&workspace.id());
            }
            app.set_error(&error);
            Vec::new()
        }
        Msg::WorkspaceDeleted { id } => handle_workspace_deleted(app, &id),
        Msg::WorkspaceDeleteFailed { id, error } => {
            app.deleting.remove(&id);
            app.set_error(&error);
            Vec::new()
        }
        Msg::WorkspaceSetupComplete { id, error } => {
            if let Some(error) = error {
                app.set_error(&format!("setup for {id} failed: {error}"));
            }
            Vec::new()
        }
        Msg::FileChanged { root } => handle_file_changed(app, &root),
        Msg::StateFileChanged { reason, paths } => handle_state_file_changed(app, reason, &paths),
        Msg::GitStatusResult { root, status, error } => {
            if let Some(error) = error {
                log::debug!("git status for {}: {error}", root.display());
            }
            if let Some(status) = status {
                app.dashboard.set_status(&root, status.clone());
                let active_root = app.active.as_ref().map(|a| a.root.clone());
                app.sidebar
                    .update_status(active_root.as_deref(), &root, status);
            }
            Vec::new()
        }
        Msg::StatusTick => handle_status_tick(app),
        Msg::ActivityTick => vec![cmd::scan_activity(
            Arc::clone(&app.services.scanner),
            workspace_ids(&app.projects),
        )],
        Msg::ActivityUpdated { active, reaped } => {
            for session in &reaped {
                log::info!("reaped orphaned session {session}");
            }
            app.dashboard.set_active_workspaces(active);
            Vec::new()
        }
        Msg::WatchdogTick => watchdog::handle_tick(app),
        Msg::PersistTick { token } => persist::handle_tick(app, token),
        Msg::TabDetached { id } => persist::mark_dirty(app, &id),
        Msg::CommandPanicked { context } => {
            log::error!("command panicked: {context}");
            app.set_error(&format!("internal error: {context}"));
            Vec::new()
        }
        Msg::Shutdown => handle_shutdown(app),
    }
}

fn workspace_ids(projects: &[Project]) -> HashSet<String> {
    projects
        .iter()
        .flat_map(|p| p.workspaces.iter().map(Workspace::id))
        .collect()
}

fn handle_projects_loaded(app: &mut App, projects: Vec<Project>) -> Vec<Cmd> {
    app.projects = projects;
    app.show_welcome = app.projects.is_empty();
    app.dashboard.set_projects(&app.projects);

    let mut cmds = rebind_active(app);

    // Fold externally-authored tab changes into workspaces the Center
    // already tracks; untouched workspaces rehydrate on activation.
    for project in &app.projects {
        for workspace in &project.workspaces {
            let id = workspace.id();
            if app.center.has_state(&id) {
                app.center.merge_external(&id, &workspace.open_tabs);
            }
        }
    }

    let live = workspace_ids(&app.projects);
    app.center.retain_workspaces(&live);
    let orphaned = app.sidebar.prune_stale(&live);
    if !orphaned.is_empty() {
        cmds.push(cmd::kill_sessions(Arc::clone(&app.services.tmux), orphaned));
    }
    // Sweep tmux for sessions whose workspaces vanished with this reload.
    cmds.push(cmd::scan_activity(
        Arc::clone(&app.services.scanner),
        live,
    ));

    let active_root = app.active.as_ref().map(|a| a.root.clone());
    for project in &app.projects {
        for workspace in &project.workspaces {
            if workspace.archived {
                continue;
            }
            let full = active_root
                .as_ref()
                .is_some_and(|r| same_canonical(r, &workspace.root));
            cmds.push(cmd::git_status(
                Arc::clone(&app.services.git),
                Arc::clone(&app.services.status_cache),
                workspace.root.clone(),
                full,
            ));
        }
    }
    cmds
}

/// Re-resolve the active selection after the projects list was replaced.
/// Match by workspace ID first, then by canonical (repo, root) pair,
/// never preferring an archived workspace over a live one. A canonical
/// match with a different ID means the paths changed spelling across the
/// reload; every ID-keyed index migrates to the new key.
fn rebind_active(app: &mut App) -> Vec<Cmd> {
    let Some(prev) = app.active.take() else {
        return Vec::new();
    };

    let mut found: Option<(std::path::PathBuf, Workspace)> = None;
    for project in &app.projects {
        if let Some(ws) = project
            .workspaces
            .iter()
            .find(|w| w.id() == prev.workspace_id)
        {
            found = Some((project.path.clone(), ws.clone()));
            break;
        }
    }
    if found.is_none() {
        let mut archived_match: Option<(std::path::PathBuf, Workspace)> = None;
        'outer: for project in &app.projects {
            for ws in &project.workspaces {
                if same_canonical(&ws.repo, &prev.repo) && same_canonical(&ws.root, &prev.root) {
                    if ws.archived {
                        archived_match.get_or_insert((project.path.clone(), ws.clone()));
                    } else {
                        found = Some((project.path.clone(), ws.clone()));
                        break 'outer;
                    }
                }
            }
        }
        found = found.or(archived_match);
    }

    let Some((project_path, workspace)) = found else {
        // The active workspace is gone. Stop watching its root and fall
        // back to the welcome screen.
        if let Err(e) = app.services.watcher.unwatch(&prev.root) {
            log::debug!("unwatch {}: {e}", prev.root.display());
        }
        app.sidebar.clear_status();
        app.show_welcome = true;
        return Vec::new();
    };

    let new_id = workspace.id();
    if new_id != prev.workspace_id {
        if app.dirty.remove(&prev.workspace_id) {
            app.dirty.insert(new_id.clone());
        }
        app.center.rekey(&prev.workspace_id, &new_id);
        app.sidebar.rekey(&prev.workspace_id, &new_id);
        if let Err(e) = app.services.watcher.unwatch(&prev.root) {
            log::debug!("unwatch {}: {e}", prev.root.display());
        }
        watch_root(app, &workspace.root);
        app.services.status_cache.invalidate(&prev.root);
        app.services.status_cache.invalidate(&workspace.root);
    }

    app.dashboard.select_workspace(&new_id);
    app.active = Some(ActiveSelection {
        project_path,
        workspace_id: new_id,
        repo: workspace.repo.clone(),
        root: workspace.root.clone(),
    });
    Vec::new()
}

fn handle_workspace_activated(app: &mut App, id: &str) -> Vec<Cmd> {
    let Some((project, workspace)) = find_workspace(&app.projects, id) else {
        app.set_error("workspace no longer exists");
        return Vec::new();
    };
    let project_path = project.path.clone();
    let workspace = workspace.clone();

    app.show_welcome = false;
    if let Some(prev) = &app.active
        && prev.workspace_id != id
        && let Err(e) = app.services.watcher.unwatch(&prev.root)
    {
        log::debug!("unwatch {}: {e}", prev.root.display());
    }
    app.active = Some(ActiveSelection {
        project_path,
        workspace_id: id.to_string(),
        repo: workspace.repo.clone(),
        root: workspace.root.clone(),
    });
    app.dashboard.select_workspace(id);
    app.sidebar.clear_status();

    // Adopt live sessions (from a previous process, or launched by hand)
    // alongside the persisted tabs.
    let live: Vec<String> = app
        .services
        .tmux
        .list_sessions()
        .into_iter()
        .filter(|s| workspace_id_of_session(s) == Some(id))
        .collect();
    let assistant = if workspace.assistant.is_empty() {
        app.services.store.resolved_default_assistant().to_string()
    } else {
        workspace.assistant.clone()
    };
    app.center.sync_tabs(
        id,
        &workspace.open_tabs,
        workspace.active_tab_index,
        &live,
        &assistant,
    );

    watch_root(app, &workspace.root);

    vec![cmd::git_status(
        Arc::clone(&app.services.git),
        Arc::clone(&app.services.status_cache),
        workspace.root.clone(),
        true,
    )]
}

fn handle_workspace_created(
    app: &mut App,
    workspace: Workspace,
    warning: Option<String>,
) -> Vec<Cmd> {
    app.pending.remove(&workspace.id());
    if let Some(warning) = warning {
        app.set_error(&warning);
    }
    vec![
        cmd::run_setup(Arc::clone(&app.services.service), workspace),
        cmd::load_projects(Arc::clone(&app.services.service)),
    ]
}

fn handle_workspace_deleted(app: &mut App, id: &str) -> Vec<Cmd> {
    app.deleting.remove(id);
    app.dirty.remove(id);
    app.center.remove(id);
    vec![cmd::load_projects(Arc::clone(&app.services.service))]
}

fn handle_file_changed(app: &mut App, root: &Path) -> Vec<Cmd> {
    app.services.status_cache.invalidate(root);

    let is_active = app
        .active
        .as_ref()
        .is_some_and(|a| same_canonical(&a.root, root));
    let (status_root, full) = if is_active {
        let active = app.active.as_ref().unwrap();
        app.services.status_cache.invalidate(&active.root);
        (active.root.clone(), true)
    } else {
        (root.to_path_buf(), false)
    };

    // Re-arm the watch on the active root; a backend that dropped it
    // after delivering gets rebuilt here, and the watch-limit one-shot
    // applies as usual.
    if is_active {
        let active_root = app.active.as_ref().unwrap().root.clone();
        if !app.services.watcher.is_watching(&active_root) {
            watch_root(app, &active_root);
        }
    }

    vec![cmd::git_status(
        Arc::clone(&app.services.git),
        Arc::clone(&app.services.status_cache),
        status_root,
        full,
    )]
}

fn handle_state_file_changed(
    app: &mut App,
    reason: StateReason,
    paths: &[std::path::PathBuf],
) -> Vec<Cmd> {
    let mut cmds = vec![cmd::restart_state_watcher(Arc::clone(
        &app.services.state_watcher,
    ))];
    match reason {
        StateReason::Workspaces => {
            if app.services.suppression.should_suppress(paths) {
                log::debug!("suppressed self-originated metadata event");
            } else {
                cmds.push(cmd::load_projects(Arc::clone(&app.services.service)));
            }
        }
        StateReason::Projects => {
            cmds.push(cmd::load_projects(Arc::clone(&app.services.service)));
        }
        StateReason::Other(what) => {
            log::debug!("ignoring state change: {what}");
        }
    }
    cmds
}

fn handle_status_tick(app: &mut App) -> Vec<Cmd> {
    let Some(active) = &app.active else {
        return Vec::new();
    };
    // A cached full snapshot is re-emitted as-is; only a cache miss costs
    // a git subprocess. Other workspaces refresh through watcher events.
    if let Some(cached) = app.services.status_cache.get_full(&active.root) {
        vec![cmd::cached_status(active.root.clone(), cached)]
    } else {
        vec![cmd::git_status(
            Arc::clone(&app.services.git),
            Arc::clone(&app.services.status_cache),
            active.root.clone(),
            true,
        )]
    }
}

fn handle_shutdown(app: &mut App) -> Vec<Cmd> {
    persist::persist_all_now(app);
    app.services.scripts.stop_all();
    app.services.watcher.close();
    app.services.state_watcher.stop();
    app.should_quit = true;
    Vec::new()
}

/// Start watching a root, with the watch-limit degradation protocol:
/// the first limit error latches a one-shot flag and warns the user;
/// later ones are silent. Other errors are logged and non-fatal.
pub(super) fn watch_root(app: &mut App, root: &Path) {
    match app.services.watcher.watch(root) {
        Ok(()) => {}
        Err(WatchError::Limit) => {
            if !app.watch_limit_hit {
                app.watch_limit_hit = true;
                app.set_error("file watching disabled; git status may be stale");
            }
        }
        Err(e) => log::warn!("watch {}: {e}", root.display()),
    }
}

pub(super) fn find_workspace<'a>(
    projects: &'a [Project],
    id: &str,
) -> Option<(&'a Project, &'a Workspace)> {
    projects.iter().find_map(|project| {
        project
            .workspaces
            .iter()
            .find(|w| w.id() == id)
            .map(|w| (project, w))
    })
}
