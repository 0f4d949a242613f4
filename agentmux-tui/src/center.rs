use agentmux_core::model::TabDescriptor;
use std::collections::HashMap;

/// Runtime view of one tab: the persisted descriptor plus whether a PTY
/// reader is currently attached to its tmux session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabRuntime {
    pub descriptor: TabDescriptor,
    pub reader_running: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabsState {
    pub tabs: Vec<TabRuntime>,
    pub active: usize,
}

impl TabsState {
    fn descriptors(&self) -> Vec<TabDescriptor> {
        self.tabs.iter().map(|t| t.descriptor.clone()).collect()
    }
}

/// The Center model: runtime owner of per-workspace tab state, keyed by
/// workspace ID. An entry with zero tabs is meaningful: it records that
/// the user closed the last tab, and persists as an empty list rather
/// than being skipped.
#[derive(Debug, Default)]
pub struct Center {
    state: HashMap<String, TabsState>,
}

impl Center {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_state(&self, id: &str) -> bool {
        self.state.contains_key(id)
    }

    pub fn is_explicitly_empty(&self, id: &str) -> bool {
        self.state.get(id).is_some_and(|s| s.tabs.is_empty())
    }

    pub fn tabs_for(&self, id: &str) -> Option<&TabsState> {
        self.state.get(id)
    }

    /// The (tabs, active index) pair the persistence scheduler writes
    /// back into workspace metadata. `None` when the Center holds no
    /// state for the workspace at all.
    pub fn persistable(&self, id: &str) -> Option<(Vec<TabDescriptor>, usize)> {
        self.state.get(id).map(|s| (s.descriptors(), s.active))
    }

    /// Activation-time sync: restore persisted tabs, then adopt any live
    /// tmux sessions for this workspace that the persisted list does not
    /// know (e.g. launched by a previous crashed process).
    ///
    /// When the Center already has state for the workspace, persisted and
    /// live tabs are merged into it; an explicitly-empty entry stays
    /// empty so a close-all is not resurrected by stale metadata.
    pub fn sync_tabs(
        &mut self,
        id: &str,
        persisted: &[TabDescriptor],
        active: usize,
        live_sessions: &[String],
        assistant: &str,
    ) {
        if self.is_explicitly_empty(id) && !live_sessions.is_empty() {
            // Live sessions always win over an empty entry: the user can
            // see them running.
        } else if self.is_explicitly_empty(id) {
            return;
        }

        let fresh = !self.state.contains_key(id);
        let entry = self.state.entry(id.to_string()).or_default();
        for descriptor in persisted {
            if !entry
                .tabs
                .iter()
                .any(|t| t.descriptor.session == descriptor.session)
            {
                entry.tabs.push(TabRuntime {
                    descriptor: descriptor.clone(),
                    reader_running: false,
                });
            }
        }
        for session in live_sessions {
            if !entry
                .tabs
                .iter()
                .any(|t| t.descriptor.session == *session)
            {
                entry.tabs.push(TabRuntime {
                    descriptor: TabDescriptor {
                        assistant: assistant.to_string(),
                        name: format!("{assistant} {}", entry.tabs.len() + 1),
                        session: session.clone(),
                        detached: false,
                        status: String::new(),
                    },
                    reader_running: false,
                });
            }
        }
        if fresh || entry.active >= entry.tabs.len() {
            entry.active = active.min(entry.tabs.len().saturating_sub(1));
        }
    }

    /// Merge externally-authored tabs (metadata edited by another
    /// process) into existing state. Only workspaces the Center already
    /// tracks are touched; union is by tmux session name with the
    /// persisted order first.
    pub fn merge_external(&mut self, id: &str, external: &[TabDescriptor]) {
        let Some(entry) = self.state.get_mut(id) else {
            return;
        };
        if entry.tabs.is_empty() {
            // Explicitly empty stays empty until the user acts.
            return;
        }
        for descriptor in external {
            if !entry
                .tabs
                .iter()
                .any(|t| t.descriptor.session == descriptor.session)
            {
                entry.tabs.push(TabRuntime {
                    descriptor: descriptor.clone(),
                    reader_running: false,
                });
            }
        }
    }

    pub fn close_tab(&mut self, id: &str, index: usize) -> Option<TabDescriptor> {
        let entry = self.state.get_mut(id)?;
        if index >= entry.tabs.len() {
            return None;
        }
        let removed = entry.tabs.remove(index);
        if entry.active >= entry.tabs.len() && entry.active > 0 {
            entry.active -= 1;
        }
        Some(removed.descriptor)
    }

    pub fn add_tab(&mut self, id: &str, descriptor: TabDescriptor) {
        let entry = self.state.entry(id.to_string()).or_default();
        entry.tabs.push(TabRuntime {
            descriptor,
            reader_running: false,
        });
        entry.active = entry.tabs.len() - 1;
    }

    /// Re-key a workspace's state after canonical ID migration.
    pub fn rekey(&mut self, old_id: &str, new_id: &str) {
        if old_id == new_id {
            return;
        }
        if let Some(state) = self.state.remove(old_id) {
            self.state.insert(new_id.to_string(), state);
        }
    }

    pub fn remove(&mut self, id: &str) {
        self.state.remove(id);
    }

    /// Drop state for workspaces that no longer exist.
    pub fn retain_workspaces(&mut self, live: &std::collections::HashSet<String>) {
        self.state.retain(|id, _| live.contains(id));
    }

    /// Attached tabs whose readers are not running, across all
    /// workspaces. The watchdog re-attaches these.
    pub fn tabs_without_reader(&self) -> Vec<String> {
        self.state
            .values()
            .flat_map(|s| &s.tabs)
            .filter(|t| !t.descriptor.detached && !t.reader_running)
            .map(|t| t.descriptor.session.clone())
            .collect()
    }

    pub fn mark_reader_running(&mut self, session: &str) {
        for state in self.state.values_mut() {
            for tab in &mut state.tabs {
                if tab.descriptor.session == session {
                    tab.reader_running = true;
                }
            }
        }
    }

    /// Mark a tab detached so the watchdog stops re-attaching it.
    pub fn detach_tab(&mut self, id: &str, session: &str) {
        if let Some(state) = self.state.get_mut(id) {
            for tab in &mut state.tabs {
                if tab.descriptor.session == session {
                    tab.descriptor.detached = true;
                }
            }
        }
    }
}
