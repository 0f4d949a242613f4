mod cli;
mod mock;

pub use cli::CliTmux;
pub use mock::MockTmux;

use anyhow::Result;
use std::path::Path;

/// Prefix for every tmux session this process creates.
pub const SESSION_PREFIX: &str = "agentmux-";

/// Session name for a workspace tab: `agentmux-<workspace-id>-<n>`.
pub fn session_name(workspace_id: &str, tab_index: usize) -> String {
    format!("{SESSION_PREFIX}{workspace_id}-{tab_index}")
}

/// Extract the workspace ID from one of our session names. Returns
/// `None` for foreign sessions, which the scanner leaves alone.
pub fn workspace_id_of_session(session: &str) -> Option<&str> {
    let rest = session.strip_prefix(SESSION_PREFIX)?;
    let (id, _) = rest.rsplit_once('-')?;
    if id.is_empty() { None } else { Some(id) }
}

/// Tmux operations the kernel consumes. Implementations shell out with a
/// wall-clock timeout so a hung tmux server cannot stall producers.
pub trait Tmux: Send + Sync {
    fn list_sessions(&self) -> Vec<String>;
    fn session_exists(&self, name: &str) -> bool;
    fn create_session(&self, name: &str, dir: &Path, command: Option<&str>) -> Result<()>;
    /// Last `lines` of pane output for change detection.
    fn capture_pane(&self, session: &str, lines: usize) -> Result<String>;
    /// Attach a persistent output reader (`pipe-pane`) to a session.
    fn pipe_pane(&self, session: &str, log_path: &Path) -> Result<()>;
    fn kill_session(&self, name: &str);
}
