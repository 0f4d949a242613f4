pub mod cmd;
pub mod handlers;
mod persist;
pub mod scanner;
mod watchdog;

use crate::center::Center;
use crate::components;
use crate::dashboard::Dashboard;
use crate::sidebar::Sidebar;
use crate::theme::Theme;
use agentmux_core::bus::{Bus, MsgSender};
use agentmux_core::git::GitOps;
use agentmux_core::model::Project;
use agentmux_core::msg::Msg;
use agentmux_core::paths::same_canonical;
use agentmux_core::script::ScriptRunner;
use agentmux_core::service::WorkspaceService;
use agentmux_core::statewatch::StateWatcher;
use agentmux_core::status::StatusCache;
use agentmux_core::store::WorkspaceStore;
use agentmux_core::suppress::SuppressionMap;
use agentmux_core::tmux::Tmux;
use agentmux_core::watch::FileWatcher;
use cmd::Cmd;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{
    DefaultTerminal, Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use scanner::ActivityScanner;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

const STATUS_TICK: Duration = Duration::from_secs(3);
const ACTIVITY_TICK: Duration = Duration::from_secs(2);
const WATCHDOG_TICK: Duration = Duration::from_secs(5);
const ERROR_DISMISS: Duration = Duration::from_secs(5);

/// Everything the kernel drives: providers, services, caches, watchers.
/// Shared references held for the process lifetime; the App owns the
/// only handle.
pub struct Services {
    pub git: Arc<dyn GitOps>,
    pub tmux: Arc<dyn Tmux>,
    pub service: Arc<WorkspaceService>,
    pub store: Arc<WorkspaceStore>,
    pub watcher: Arc<dyn FileWatcher>,
    pub state_watcher: Arc<StateWatcher>,
    pub status_cache: Arc<StatusCache>,
    pub suppression: Arc<SuppressionMap>,
    pub scripts: Arc<dyn ScriptRunner>,
    pub scanner: Arc<ActivityScanner>,
    pub logs_dir: PathBuf,
}

/// The active workspace, denormalised so rebinding after a projects-list
/// replacement never chases stale pointers.
#[derive(Debug, Clone)]
pub struct ActiveSelection {
    pub project_path: PathBuf,
    pub workspace_id: String,
    pub repo: PathBuf,
    pub root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Normal,
    CreateInput { name: String },
    ConfirmDelete { id: String, name: String },
}

/// The App kernel: sole owner of all mutable process state. Mutation
/// happens exclusively on the update loop, one message at a time; the
/// few exceptions (status cache, suppression map, scanner state) carry
/// their own locks and are documented where they live.
pub struct App {
    pub projects: Vec<Project>,
    pub active: Option<ActiveSelection>,
    pub show_welcome: bool,
    pub mode: Mode,
    /// Workspace IDs with a creation in flight, keyed identically to the
    /// ID the service will persist, so spinners clear on any outcome.
    pub pending: HashSet<String>,
    pub deleting: HashSet<String>,
    /// Workspace IDs scheduled for a debounced save.
    pub dirty: HashSet<String>,
    pub persist_token: u64,
    /// One-shot: the watch-limit warning fires once per process.
    pub watch_limit_hit: bool,
    pub error: Option<String>,
    pub error_set_at: Option<Instant>,
    pub should_quit: bool,
    pub center: Center,
    pub sidebar: Sidebar,
    pub dashboard: Dashboard,
    pub services: Arc<Services>,
}

impl App {
    pub fn new(services: Arc<Services>) -> Self {
        Self {
            projects: Vec::new(),
            active: None,
            show_welcome: false,
            mode: Mode::Normal,
            pending: HashSet::new(),
            deleting: HashSet::new(),
            dirty: HashSet::new(),
            persist_token: 0,
            watch_limit_hit: false,
            error: None,
            error_set_at: None,
            should_quit: false,
            center: Center::new(),
            sidebar: Sidebar::new(),
            dashboard: Dashboard::new(),
            services,
        }
    }

    pub fn set_error(&mut self, message: &str) {
        self.error = Some(message.to_string());
        self.error_set_at = Some(Instant::now());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
        self.error_set_at = None;
    }
}

/// Run the update loop until shutdown: drain the bus (critical first),
/// apply handlers, fire follow-up commands, poll the keyboard, render.
pub fn run(
    terminal: &mut DefaultTerminal,
    app: &mut App,
    bus: &Bus,
    sender: &MsgSender,
) -> anyhow::Result<()> {
    let theme = Theme::default();
    let spinner_start = Instant::now();

    if let Err(e) = app.services.state_watcher.start() {
        log::warn!("state watcher failed to start: {e:#}");
    }
    spawn_tickers(sender);
    cmd::run_all(
        vec![cmd::load_projects(Arc::clone(&app.services.service))],
        sender,
    );

    loop {
        terminal.draw(|f| draw(f, app, &theme, &spinner_start))?;

        if let Some(set_at) = app.error_set_at
            && set_at.elapsed() >= ERROR_DISMISS
        {
            app.clear_error();
        }

        if let Some(msg) = bus.try_recv() {
            let cmds = handlers::update(app, msg);
            cmd::run_all(cmds, sender);
            if app.should_quit {
                sender.cancel();
                return Ok(());
            }
            continue;
        }

        if event::poll(Duration::from_millis(80))?
            && let Event::Key(key) = event::read()?
        {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                sender.post(Msg::Shutdown);
                continue;
            }
            let cmds = handle_key(app, key.code, sender);
            cmd::run_all(cmds, sender);
        }

        if app.should_quit {
            sender.cancel();
            return Ok(());
        }
    }
}

fn spawn_tickers(sender: &MsgSender) {
    spawn_ticker(sender, STATUS_TICK, || Msg::StatusTick);
    spawn_ticker(sender, ACTIVITY_TICK, || Msg::ActivityTick);
    spawn_ticker(sender, WATCHDOG_TICK, || Msg::WatchdogTick);
}

fn spawn_ticker(
    sender: &MsgSender,
    period: Duration,
    make: impl Fn() -> Msg + Send + 'static,
) {
    let sender = sender.clone();
    std::thread::spawn(move || {
        loop {
            // Sleep in small increments so cancellation lands promptly.
            let mut remaining = period;
            while !remaining.is_zero() {
                if sender.is_cancelled() {
                    return;
                }
                let nap = remaining.min(Duration::from_millis(200));
                std::thread::sleep(nap);
                remaining = remaining.saturating_sub(nap);
            }
            if sender.is_cancelled() {
                return;
            }
            sender.post(make());
        }
    });
}

fn handle_key(app: &mut App, code: KeyCode, sender: &MsgSender) -> Vec<Cmd> {
    match app.mode.clone() {
        Mode::Normal => handle_normal_key(app, code, sender),
        Mode::CreateInput { mut name } => {
            match code {
                KeyCode::Esc => app.mode = Mode::Normal,
                KeyCode::Enter => {
                    app.mode = Mode::Normal;
                    return submit_create(app, &name);
                }
                KeyCode::Backspace => {
                    name.pop();
                    app.mode = Mode::CreateInput { name };
                }
                KeyCode::Char(c) if !c.is_control() => {
                    name.push(c);
                    app.mode = Mode::CreateInput { name };
                }
                _ => {}
            }
            Vec::new()
        }
        Mode::ConfirmDelete { id, .. } => {
            match code {
                KeyCode::Enter | KeyCode::Char('y') => {
                    app.mode = Mode::Normal;
                    return confirm_delete(app, &id);
                }
                KeyCode::Esc | KeyCode::Char('n') => app.mode = Mode::Normal,
                _ => {}
            }
            Vec::new()
        }
    }
}

fn handle_normal_key(app: &mut App, code: KeyCode, sender: &MsgSender) -> Vec<Cmd> {
    match code {
        KeyCode::Char('q') => {
            sender.post(Msg::Shutdown);
            Vec::new()
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.dashboard.move_selection(1);
            Vec::new()
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.dashboard.move_selection(-1);
            Vec::new()
        }
        KeyCode::Enter => {
            let Some(row) = app.dashboard.selected_row() else {
                return Vec::new();
            };
            let id = row.workspace_id.clone();
            handlers::update(app, Msg::WorkspaceActivated { id })
        }
        KeyCode::Char('c') => {
            if app.dashboard.selected_row().is_some() {
                app.clear_error();
                app.mode = Mode::CreateInput {
                    name: String::new(),
                };
            }
            Vec::new()
        }
        KeyCode::Char('d') => {
            let Some(row) = app.dashboard.selected_row() else {
                return Vec::new();
            };
            if row.is_primary {
                app.set_error("the primary checkout cannot be deleted");
                return Vec::new();
            }
            if app.deleting.contains(&row.workspace_id) {
                app.set_error("deletion already in progress");
                return Vec::new();
            }
            app.mode = Mode::ConfirmDelete {
                id: row.workspace_id.clone(),
                name: row.workspace_name.clone(),
            };
            Vec::new()
        }
        KeyCode::Char('r') => vec![cmd::rescan_workspaces(Arc::clone(&app.services.service))],
        _ => Vec::new(),
    }
}

fn submit_create(app: &mut App, name: &str) -> Vec<Cmd> {
    let Some(row) = app.dashboard.selected_row() else {
        return Vec::new();
    };
    let project_path = row.project_path.clone();
    let Some(project) = app
        .projects
        .iter()
        .find(|p| same_canonical(&p.path, &project_path))
        .cloned()
    else {
        return Vec::new();
    };
    // Key the spinner by the same ID the service will persist.
    if let Some(pending) = app.services.service.pending_workspace(&project, name) {
        app.pending.insert(pending.id());
    }
    vec![cmd::create_workspace(
        Arc::clone(&app.services.service),
        project,
        name.to_string(),
        String::new(),
    )]
}

fn confirm_delete(app: &mut App, id: &str) -> Vec<Cmd> {
    let Some((project, workspace)) = handlers::find_workspace(&app.projects, id) else {
        return Vec::new();
    };
    let project = project.clone();
    let workspace = workspace.clone();
    app.deleting.insert(id.to_string());

    // Kill this workspace's sessions before git touches the worktree.
    let mut sessions: Vec<String> = app
        .center
        .tabs_for(id)
        .map(|s| s.tabs.iter().map(|t| t.descriptor.session.clone()).collect())
        .unwrap_or_default();
    sessions.extend(
        app.sidebar
            .terminals_for(id)
            .iter()
            .map(|t| t.session.clone()),
    );

    let mut cmds: Vec<Cmd> = Vec::new();
    if !sessions.is_empty() {
        cmds.push(cmd::kill_sessions(Arc::clone(&app.services.tmux), sessions));
    }
    cmds.push(cmd::delete_workspace(
        Arc::clone(&app.services.service),
        project,
        workspace,
    ));
    cmds
}

fn draw(f: &mut Frame, app: &App, theme: &Theme, spinner_start: &Instant) {
    let outer = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(1),
        Constraint::Length(1),
    ])
    .split(f.area());

    draw_header(f, outer[0], app, theme, spinner_start);

    let main = Layout::horizontal([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(outer[1]);
    draw_workspace_table(f, main[0], app, theme);
    draw_sidebar(f, main[1], app, theme);

    draw_footer(f, outer[2], app, theme);

    if app.show_welcome {
        components::popup::Popup::new(" welcome ", theme.accent)
            .line("No projects registered yet.")
            .blank()
            .line("Run `agentmux projects add <path>` to register a repository.")
            .centered_text()
            .render(f, f.area());
    }

    match &app.mode {
        Mode::CreateInput { name } => {
            components::popup::Popup::new(" new workspace ", theme.accent)
                .line(Line::from(vec![
                    Span::raw("name: "),
                    Span::styled(format!("{name}▏"), Style::default().fg(theme.accent)),
                ]))
                .blank()
                .hint("enter creates from the default branch · esc cancels", theme.hint)
                .render(f, f.area());
        }
        Mode::ConfirmDelete { name, .. } => {
            components::popup::Popup::new(" delete workspace ", theme.warning)
                .line(Line::from(vec![
                    Span::raw("Remove "),
                    Span::styled(
                        format!("\"{name}\""),
                        Style::default()
                            .fg(theme.accent)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(" and delete its branch?"),
                ]))
                .blank()
                .hint("enter confirms · esc cancels", theme.hint)
                .centered_text()
                .render(f, f.area());
        }
        Mode::Normal => {}
    }

    components::error_toast::draw(f, f.area(), app.error.as_deref(), theme);
}

fn draw_header(f: &mut Frame, area: Rect, app: &App, theme: &Theme, spinner_start: &Instant) {
    let mut spans = vec![Span::styled(
        " agentmux ",
        Style::default()
            .fg(theme.accent)
            .add_modifier(Modifier::BOLD),
    )];
    if app.dashboard.any_working() {
        let elapsed = spinner_start.elapsed().as_millis() as usize;
        let frame_idx = (elapsed / 80) % SPINNER_FRAMES.len();
        spans.push(Span::styled(
            format!("{} agents working", SPINNER_FRAMES[frame_idx]),
            Style::default().fg(theme.success),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_workspace_table(f: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let mut lines = Vec::new();
    let mut last_project = None;
    for (index, row) in app.dashboard.rows().iter().enumerate() {
        if last_project != Some(&row.project_name) {
            lines.push(Line::from(Span::styled(
                row.project_name.clone(),
                Style::default()
                    .fg(theme.secondary)
                    .add_modifier(Modifier::BOLD),
            )));
            last_project = Some(&row.project_name);
        }

        let mut spans = vec![Span::raw("  ")];
        let marker = if app.dashboard.is_active(&row.workspace_id) {
            Span::styled("● ", Style::default().fg(theme.success))
        } else {
            Span::styled("  ", Style::default())
        };
        spans.push(marker);

        let mut name_style = Style::default();
        if index == app.dashboard.selected_index() {
            name_style = name_style
                .bg(theme.accent)
                .fg(theme.highlight_fg)
                .add_modifier(Modifier::BOLD);
        }
        spans.push(Span::styled(row.workspace_name.clone(), name_style));
        spans.push(Span::styled(
            format!("  {}", row.branch),
            Style::default().fg(theme.muted),
        ));

        if row.archived {
            spans.push(Span::styled(
                "  archived",
                Style::default().fg(theme.muted),
            ));
        }
        if app.pending.contains(&row.workspace_id) {
            spans.push(Span::styled(
                "  creating…",
                Style::default().fg(theme.warning),
            ));
        }
        if app.deleting.contains(&row.workspace_id) {
            spans.push(Span::styled(
                "  deleting…",
                Style::default().fg(theme.warning),
            ));
        }
        if let Some(status) = app.dashboard.status_for(&row.root) {
            if !status.is_clean() {
                spans.push(Span::styled(
                    format!(
                        "  ~{} +{} ?{}",
                        status.unstaged, status.staged, status.untracked
                    ),
                    Style::default().fg(theme.warning),
                ));
            }
        }
        lines.push(Line::from(spans));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border))
        .title(" Workspaces ");
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_sidebar(f: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let mut lines = Vec::new();
    if let Some(active) = &app.active {
        lines.push(Line::from(vec![
            Span::styled("workspace ", Style::default().fg(theme.muted)),
            Span::styled(
                active.workspace_id.clone(),
                Style::default().fg(theme.secondary),
            ),
        ]));
        lines.push(Line::from(Span::raw(active.root.display().to_string())));
        lines.push(Line::from(""));

        if let Some(status) = app.sidebar.status() {
            if let Some(branch) = &status.branch {
                lines.push(Line::from(vec![
                    Span::styled("branch ", Style::default().fg(theme.muted)),
                    Span::raw(branch.clone()),
                ]));
            }
            lines.push(Line::from(format!(
                "staged {}  unstaged {}  untracked {}",
                status.staged, status.unstaged, status.untracked
            )));
            if status.has_line_stats {
                lines.push(Line::from(vec![
                    Span::styled(
                        format!("+{}", status.additions),
                        Style::default().fg(theme.success),
                    ),
                    Span::raw(" "),
                    Span::styled(
                        format!("-{}", status.deletions),
                        Style::default().fg(theme.error),
                    ),
                ]));
            }
        } else {
            lines.push(Line::from(Span::styled(
                "status pending…",
                Style::default().fg(theme.muted),
            )));
        }

        lines.push(Line::from(""));
        if let Some(tabs) = app.center.tabs_for(&active.workspace_id) {
            lines.push(Line::from(Span::styled(
                "tabs",
                Style::default().fg(theme.muted),
            )));
            for (i, tab) in tabs.tabs.iter().enumerate() {
                let marker = if i == tabs.active { "▸" } else { " " };
                lines.push(Line::from(format!(
                    "{marker} {} ({})",
                    tab.descriptor.name, tab.descriptor.assistant
                )));
            }
        }
    } else {
        lines.push(Line::from(Span::styled(
            "no active workspace",
            Style::default().fg(theme.muted),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border))
        .title(" Detail ");
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_footer(f: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let hints: &[(&str, &str)] = match app.mode {
        Mode::Normal => &[
            ("enter", "open"),
            ("c", "new"),
            ("d", "delete"),
            ("r", "rescan"),
            ("q", "quit"),
        ],
        Mode::CreateInput { .. } | Mode::ConfirmDelete { .. } => {
            &[("enter", "confirm"), ("esc", "cancel")]
        }
    };
    let spans: Vec<Span> = hints
        .iter()
        .enumerate()
        .flat_map(|(i, (key, desc))| {
            let mut spans = Vec::new();
            if i > 0 {
                spans.push(Span::styled(" │ ", Style::default().fg(theme.border)));
            }
            spans.push(Span::styled(
                *key,
                Style::default().fg(theme.hint).add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::raw(format!(": {desc}")));
            spans
        })
        .collect();
    f.render_widget(
        Paragraph::new(Line::from(spans)).alignment(Alignment::Center),
        area,
    );
}

#[cfg(test)]
mod tests;
