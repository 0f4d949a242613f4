use crate::model::{Project, Workspace};
use crate::status::GitStatus;
use std::collections::HashSet;
use std::path::PathBuf;

/// Which part of the on-disk state a state-watcher event refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateReason {
    /// Per-workspace metadata under the workspaces dir changed.
    Workspaces,
    /// The project registry file changed.
    Projects,
    /// Something else under the data root changed.
    Other(String),
}

/// Messages that arrive asynchronously from background producers (PTY
/// readers, watchers, scanners, timers, command completions). These get
/// merged into the main update loop alongside keyboard input; every state
/// mutation happens on the loop in response to exactly one of these.
#[derive(Debug, Clone)]
pub enum Msg {
    /// Full projects list rebuilt from the registry and workspace store.
    ProjectsLoaded(Vec<Project>),
    ProjectsLoadFailed(String),
    /// Rescan upserted discovery results into the store; the dashboard
    /// should re-derive its rows.
    RefreshDashboard,

    WorkspaceActivated {
        id: String,
    },
    WorkspaceCreated {
        workspace: Box<Workspace>,
        warning: Option<String>,
    },
    /// `workspace` is the pending struct the service constructed before
    /// the failure, so the UI can clear its "creating" indicator keyed by
    /// the same ID a success would have persisted. `None` only for
    /// validation failures that precede path construction.
    WorkspaceCreateFailed {
        workspace: Option<Box<Workspace>>,
        error: String,
    },
    WorkspaceDeleted {
        id: String,
    },
    WorkspaceDeleteFailed {
        id: String,
        error: String,
    },
    WorkspaceSetupComplete {
        id: String,
        error: Option<String>,
    },

    /// Something changed inside a watched worktree.
    FileChanged {
        root: PathBuf,
    },
    /// Coalesced metadata-tree change from the state watcher.
    StateFileChanged {
        reason: StateReason,
        paths: Vec<PathBuf>,
    },
    /// Result of a fast or full status command for one root.
    GitStatusResult {
        root: PathBuf,
        status: Option<GitStatus>,
        error: Option<String>,
    },

    /// Periodic: refresh the active workspace's status (3 s cadence).
    StatusTick,
    /// Periodic: scan tmux for pane activity (2 s cadence).
    ActivityTick,
    /// Scanner result: workspace IDs considered active right now.
    ActivityUpdated {
        active: HashSet<String>,
        /// Orphaned sessions the scanner killed, for logging only.
        reaped: Vec<String>,
    },
    /// Periodic: ensure PTY readers are attached (5 s cadence).
    WatchdogTick,
    /// Debounced-save tick carrying the token it was scheduled with.
    PersistTick {
        token: u64,
    },

    /// A tab moved out of its workspace; the source workspace needs a
    /// debounced save.
    TabDetached {
        id: String,
    },

    /// A command thunk panicked; recovered off-loop into this message.
    CommandPanicked {
        context: String,
    },
    Shutdown,
}

impl Msg {
    /// Messages that must never be coalesced or dropped under queue
    /// pressure; they go through the critical queue.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Msg::Shutdown
                | Msg::WorkspaceCreated { .. }
                | Msg::WorkspaceCreateFailed { .. }
                | Msg::WorkspaceDeleted { .. }
                | Msg::WorkspaceDeleteFailed { .. }
                | Msg::WorkspaceSetupComplete { .. }
        )
    }
}
