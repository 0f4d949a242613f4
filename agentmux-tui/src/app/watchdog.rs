use super::{App, cmd, cmd::Cmd};
use std::sync::Arc;

/// PTY watchdog pass: re-attach readers for any attached tab or terminal
/// session that lost its reader (crashed thread, exited child, process
/// restart), then re-sync the dashboard's active set from the scanner's
/// current holds. Self-healing; runs every few seconds.
pub(super) fn handle_tick(app: &mut App) -> Vec<Cmd> {
    let mut sessions = app.center.tabs_without_reader();
    sessions.extend(app.sidebar.sessions_without_reader());

    for session in &sessions {
        app.center.mark_reader_running(session);
        app.sidebar.mark_reader_running(session);
    }

    app.dashboard
        .set_active_workspaces(app.services.scanner.currently_active());

    if sessions.is_empty() {
        return Vec::new();
    }
    vec![cmd::start_readers(
        Arc::clone(&app.services.tmux),
        sessions,
        app.services.logs_dir.clone(),
    )]
}
