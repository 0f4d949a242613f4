use super::{App, cmd, cmd::Cmd};
use agentmux_core::model::Workspace;
use std::sync::Arc;
use std::time::Duration;

/// Debounce window between a dirty mark and the save it schedules.
pub(super) const PERSIST_DEBOUNCE: Duration = Duration::from_millis(500);

/// Mark a workspace dirty and arm a debounced save. Every mark bumps the
/// token; the scheduled tick carries its token, so a tick that was
/// superseded by a later mark is recognisably stale and dropped. No
/// cancellable timers needed.
pub(super) fn mark_dirty(app: &mut App, id: &str) -> Vec<Cmd> {
    app.dirty.insert(id.to_string());
    app.persist_token += 1;
    vec![cmd::persist_tick(app.persist_token, PERSIST_DEBOUNCE)]
}

/// Debounce arm fired. Stale tokens drop; the current token snapshots
/// the dirty set, folds Center tab state into each workspace, clears the
/// set, and emits one save per workspace.
pub(super) fn handle_tick(app: &mut App, token: u64) -> Vec<Cmd> {
    if token != app.persist_token {
        return Vec::new();
    }
    let ids: Vec<String> = app.dirty.drain().collect();
    let mut cmds = Vec::new();
    for id in ids {
        if let Some(workspace) = sync_workspace_tabs(app, &id) {
            cmds.push(cmd::save_workspace(Arc::clone(&app.services.store), workspace));
        }
    }
    cmds
}

/// Shutdown flush: every workspace of every project is written
/// synchronously with its Center tab state applied. A workspace whose
/// Center entry is explicitly empty is persisted with zero tabs; that
/// is how closing the last tab sticks.
pub(super) fn persist_all_now(app: &mut App) {
    let ids: Vec<String> = app
        .projects
        .iter()
        .flat_map(|p| p.workspaces.iter().map(Workspace::id))
        .collect();
    for id in ids {
        let Some(workspace) = sync_workspace_tabs(app, &id) else {
            continue;
        };
        if let Err(e) = app.services.store.save(&workspace) {
            log::warn!("shutdown save for {}: {e:#}", workspace.name);
        }
    }
    app.dirty.clear();
}

/// Fold the Center's runtime tab state into the stored workspace and
/// return a copy ready to save. Workspaces the Center has never touched
/// keep their persisted tabs as-is.
fn sync_workspace_tabs(app: &mut App, id: &str) -> Option<Workspace> {
    let mut persistable = app.center.persistable(id);
    for project in &mut app.projects {
        for workspace in &mut project.workspaces {
            if workspace.id() == id {
                if let Some((tabs, active)) = persistable.take() {
                    workspace.open_tabs = tabs;
                    workspace.active_tab_index = active;
                }
                return Some(workspace.clone());
            }
        }
    }
    None
}
