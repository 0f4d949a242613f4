use agentmux_core::paths::same_canonical;
use agentmux_core::status::GitStatus;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// The Sidebar model: git status for the active workspace plus the
/// per-workspace shell-terminal sessions it hosts. Terminal sessions are
/// keyed by workspace ID like everything else, and re-keyed on canonical
/// ID migration.
#[derive(Debug, Default)]
pub struct Sidebar {
    status: Option<(PathBuf, GitStatus)>,
    terminals: HashMap<String, Vec<TerminalSession>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalSession {
    pub session: String,
    pub reader_running: bool,
}

impl Sidebar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a status result only when it refers to the root currently
    /// displayed, compared canonically rather than textually.
    pub fn update_status(&mut self, active_root: Option<&Path>, root: &Path, status: GitStatus) {
        let Some(active_root) = active_root else {
            return;
        };
        if same_canonical(active_root, root) {
            self.status = Some((root.to_path_buf(), status));
        }
    }

    pub fn status(&self) -> Option<&GitStatus> {
        self.status.as_ref().map(|(_, s)| s)
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    pub fn add_terminal(&mut self, id: &str, session: &str) {
        self.terminals
            .entry(id.to_string())
            .or_default()
            .push(TerminalSession {
                session: session.to_string(),
                reader_running: false,
            });
    }

    pub fn terminals_for(&self, id: &str) -> &[TerminalSession] {
        self.terminals.get(id).map_or(&[], Vec::as_slice)
    }

    pub fn rekey(&mut self, old_id: &str, new_id: &str) {
        if old_id == new_id {
            return;
        }
        if let Some(sessions) = self.terminals.remove(old_id) {
            self.terminals.insert(new_id.to_string(), sessions);
        }
    }

    /// Drop terminal bookkeeping for workspaces that no longer exist and
    /// return the orphaned session names so the caller can kill them.
    pub fn prune_stale(&mut self, live: &HashSet<String>) -> Vec<String> {
        let mut orphaned = Vec::new();
        self.terminals.retain(|id, sessions| {
            if live.contains(id) {
                true
            } else {
                orphaned.extend(sessions.iter().map(|s| s.session.clone()));
                false
            }
        });
        orphaned
    }

    pub fn sessions_without_reader(&self) -> Vec<String> {
        self.terminals
            .values()
            .flatten()
            .filter(|s| !s.reader_running)
            .map(|s| s.session.clone())
            .collect()
    }

    pub fn mark_reader_running(&mut self, session: &str) {
        for sessions in self.terminals.values_mut() {
            for s in sessions {
                if s.session == session {
                    s.reader_running = true;
                }
            }
        }
    }
}
