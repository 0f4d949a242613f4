use super::scanner::ActivityScanner;
use agentmux_core::bus::MsgSender;
use agentmux_core::git::GitOps;
use agentmux_core::model::{Project, Workspace};
use agentmux_core::msg::Msg;
use agentmux_core::service::WorkspaceService;
use agentmux_core::statewatch::StateWatcher;
use agentmux_core::status::{GitStatus, StatusCache};
use agentmux_core::store::WorkspaceStore;
use agentmux_core::tmux::Tmux;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// A follow-up command: runs off-loop on a worker thread and reports
/// back, if at all, by posting messages. Handlers return these instead
/// of doing I/O themselves.
pub type Cmd = Box<dyn FnOnce(&MsgSender) + Send + 'static>;

/// Execute commands on worker threads. Panics are recovered into a typed
/// message; nothing a command does can take the update loop down.
pub fn run_all(cmds: Vec<Cmd>, sender: &MsgSender) {
    for cmd in cmds {
        let sender = sender.clone();
        std::thread::spawn(move || {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| cmd(&sender)));
            if let Err(panic) = result {
                sender.post(Msg::CommandPanicked {
                    context: panic_message(&panic),
                });
            }
        });
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub fn load_projects(service: Arc<WorkspaceService>) -> Cmd {
    Box::new(move |sender| match service.load_projects() {
        Ok(projects) => sender.post(Msg::ProjectsLoaded(projects)),
        Err(e) => sender.post(Msg::ProjectsLoadFailed(format!("{e:#}"))),
    })
}

pub fn rescan_workspaces(service: Arc<WorkspaceService>) -> Cmd {
    Box::new(move |sender| match service.rescan_workspaces() {
        Ok(()) => sender.post(Msg::RefreshDashboard),
        Err(e) => sender.post(Msg::ProjectsLoadFailed(format!("rescan failed: {e:#}"))),
    })
}

pub fn create_workspace(
    service: Arc<WorkspaceService>,
    project: Project,
    name: String,
    base: String,
) -> Cmd {
    Box::new(move |sender| {
        match service.create_workspace(&project, &name, &base) {
            Ok(workspace) => sender.post(Msg::WorkspaceCreated {
                workspace: Box::new(workspace),
                warning: None,
            }),
            Err(failure) => sender.post(Msg::WorkspaceCreateFailed {
                workspace: failure.workspace,
                error: failure.error,
            }),
        }
    })
}

pub fn run_setup(service: Arc<WorkspaceService>, workspace: Workspace) -> Cmd {
    Box::new(move |sender| {
        let id = workspace.id();
        let error = service.run_setup(&workspace).err().map(|e| format!("{e:#}"));
        sender.post(Msg::WorkspaceSetupComplete { id, error });
    })
}

pub fn delete_workspace(
    service: Arc<WorkspaceService>,
    project: Project,
    workspace: Workspace,
) -> Cmd {
    Box::new(move |sender| {
        let id = workspace.id();
        match service.delete_workspace(&project, &workspace) {
            Ok(()) => sender.post(Msg::WorkspaceDeleted { id }),
            Err(e) => sender.post(Msg::WorkspaceDeleteFailed {
                id,
                error: format!("{e:#}"),
            }),
        }
    })
}

/// Refresh git status for one root and publish the result. Successful
/// results land in the shared cache before the message is posted.
pub fn git_status(
    git: Arc<dyn GitOps>,
    cache: Arc<StatusCache>,
    root: PathBuf,
    line_stats: bool,
) -> Cmd {
    Box::new(move |sender| match git.status(&root, line_stats) {
        Ok(status) => {
            cache.put(&root, status.clone());
            sender.post(Msg::GitStatusResult {
                root,
                status: Some(status),
                error: None,
            });
        }
        Err(e) => sender.post(Msg::GitStatusResult {
            root,
            status: None,
            error: Some(format!("{e:#}")),
        }),
    })
}

/// Re-emit an already-cached status without touching git.
pub fn cached_status(root: PathBuf, status: GitStatus) -> Cmd {
    Box::new(move |sender| {
        sender.post(Msg::GitStatusResult {
            root,
            status: Some(status),
            error: None,
        });
    })
}

/// The debounce arm: sleep, then deliver the token for staleness
/// comparison on-loop.
pub fn persist_tick(token: u64, delay: Duration) -> Cmd {
    Box::new(move |sender| {
        std::thread::sleep(delay);
        sender.post(Msg::PersistTick { token });
    })
}

/// Best-effort background save; failures are logged, the next dirty mark
/// retries.
pub fn save_workspace(store: Arc<WorkspaceStore>, workspace: Workspace) -> Cmd {
    Box::new(move |_sender| {
        if let Err(e) = store.save(&workspace) {
            log::warn!("failed to save workspace {}: {e:#}", workspace.name);
        }
    })
}

pub fn restart_state_watcher(state_watcher: Arc<StateWatcher>) -> Cmd {
    Box::new(move |_sender| state_watcher.restart())
}

pub fn scan_activity(scanner: Arc<ActivityScanner>, known_ids: HashSet<String>) -> Cmd {
    Box::new(move |sender| {
        let outcome = scanner.scan(&known_ids);
        sender.post(Msg::ActivityUpdated {
            active: outcome.active,
            reaped: outcome.reaped,
        });
    })
}

pub fn kill_sessions(tmux: Arc<dyn Tmux>, sessions: Vec<String>) -> Cmd {
    Box::new(move |_sender| {
        for session in sessions {
            tmux.kill_session(&session);
        }
    })
}

/// Attach PTY readers (`pipe-pane`) for the given sessions, logging each
/// session's output under the logs dir.
pub fn start_readers(tmux: Arc<dyn Tmux>, sessions: Vec<String>, logs_dir: PathBuf) -> Cmd {
    Box::new(move |_sender| {
        if let Err(e) = std::fs::create_dir_all(&logs_dir) {
            log::warn!("cannot create logs dir {}: {e}", logs_dir.display());
            return;
        }
        for session in sessions {
            let log_path = logs_dir.join(format!("{session}.log"));
            if let Err(e) = tmux.pipe_pane(&session, &log_path) {
                log::debug!("pipe-pane {session}: {e:#}");
            }
        }
    })
}
