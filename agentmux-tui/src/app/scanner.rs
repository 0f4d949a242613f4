use agentmux_core::ids::content_hash;
use agentmux_core::tmux::{Tmux, workspace_id_of_session};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Pane lines captured per probe; enough to catch assistant output
/// scrolling by without hauling whole scrollback buffers around.
const CAPTURE_LINES: usize = 50;

/// How long a workspace stays "active" after the last observed change.
const ACTIVITY_HOLD: Duration = Duration::from_secs(6);

#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub active: HashSet<String>,
    /// Sessions killed because their workspace no longer exists.
    pub reaped: Vec<String>,
}

#[derive(Default)]
struct ScanState {
    last_hashes: HashMap<String, String>,
    hold_until: HashMap<String, Instant>,
}

/// Probes tmux for assistant activity: captures the tail of every
/// agentmux session, hashes it, and treats a changed hash as activity
/// with a hold so brief pauses do not flicker the dashboard. Orphaned
/// sessions (workspace gone) are garbage-collected on sight.
///
/// Probe state lives behind a mutex because scans run from command
/// threads off the update loop.
pub struct ActivityScanner {
    tmux: Arc<dyn Tmux>,
    inner: Mutex<ScanState>,
    hold: Duration,
}

impl ActivityScanner {
    pub fn new(tmux: Arc<dyn Tmux>) -> Self {
        Self {
            tmux,
            inner: Mutex::new(ScanState::default()),
            hold: ACTIVITY_HOLD,
        }
    }

    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    /// One scan pass over all of our tmux sessions. `known_ids` is the
    /// set of workspace IDs that currently exist; sessions pointing
    /// anywhere else are orphans.
    pub fn scan(&self, known_ids: &HashSet<String>) -> ScanOutcome {
        let now = Instant::now();
        let mut reaped = Vec::new();
        let mut live_sessions = HashSet::new();

        for session in self.tmux.list_sessions() {
            let Some(workspace_id) = workspace_id_of_session(&session) else {
                continue;
            };
            if !known_ids.contains(workspace_id) {
                self.tmux.kill_session(&session);
                reaped.push(session);
                continue;
            }
            let workspace_id = workspace_id.to_string();
            live_sessions.insert(session.clone());

            let content = match self.tmux.capture_pane(&session, CAPTURE_LINES) {
                Ok(content) => content,
                Err(e) => {
                    log::debug!("capture {session}: {e:#}");
                    continue;
                }
            };
            let hash = content_hash(&content);
            let mut state = self.inner.lock().unwrap();
            // The first probe of a session establishes a baseline; only a
            // subsequent change counts as activity.
            if let Some(previous) = state.last_hashes.insert(session, hash.clone())
                && previous != hash
            {
                state.hold_until.insert(workspace_id, now + self.hold);
            }
        }

        let mut state = self.inner.lock().unwrap();
        state.last_hashes.retain(|s, _| live_sessions.contains(s));
        state
            .hold_until
            .retain(|id, until| known_ids.contains(id) && *until > now);
        ScanOutcome {
            active: state.hold_until.keys().cloned().collect(),
            reaped,
        }
    }

    /// Workspaces inside their activity hold right now, without probing.
    pub fn currently_active(&self) -> HashSet<String> {
        let now = Instant::now();
        self.inner
            .lock()
            .unwrap()
            .hold_until
            .iter()
            .filter(|(_, until)| **until > now)
            .map(|(id, _)| id.clone())
            .collect()
    }
}
