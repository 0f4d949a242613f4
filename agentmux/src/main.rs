mod cli;
mod logging;

use agentmux_core::bus::Bus;
use agentmux_core::config::Config;
use agentmux_core::git::{CliGitOps, GitOps};
use agentmux_core::registry::ProjectRegistry;
use agentmux_core::script::{ScriptRunner, ShellScriptRunner};
use agentmux_core::service::WorkspaceService;
use agentmux_core::statewatch::StateWatcher;
use agentmux_core::status::StatusCache;
use agentmux_core::store::WorkspaceStore;
use agentmux_core::suppress::SuppressionMap;
use agentmux_core::tmux::{CliTmux, Tmux};
use agentmux_core::watch::{FileWatcher, NotifyFileWatcher};
use agentmux_tui::app::scanner::ActivityScanner;
use agentmux_tui::{App, Services};
use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    let args = cli::Cli::parse();
    if let Err(e) = logging::init() {
        eprintln!("Warning: failed to initialise logging: {e:#}");
    }

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: cli::Cli) -> Result<ExitCode> {
    let config = Config::load(args.config.as_deref())?;
    match args.command {
        Some(command) => cli::run_command(command, &config),
        None => run_tui(&config),
    }
}

fn run_tui(config: &Config) -> Result<ExitCode> {
    let (bus, sender) = Bus::new();

    let data_root = config.resolved_data_root();
    let git: Arc<dyn GitOps> = Arc::new(CliGitOps);
    let tmux: Arc<dyn Tmux> = Arc::new(CliTmux);
    let suppression = Arc::new(SuppressionMap::new());
    let store = Arc::new(WorkspaceStore::new(
        &data_root,
        &config.resolved_default_assistant(),
        Arc::clone(&suppression),
    ));
    let registry = Arc::new(ProjectRegistry::new(&data_root));
    let scripts: Arc<dyn ScriptRunner> = Arc::new(ShellScriptRunner::new(config.setup_command()));
    let service = Arc::new(WorkspaceService::new(
        Arc::clone(&git),
        Arc::clone(&store),
        Arc::clone(&registry),
        Arc::clone(&scripts),
        &config.resolved_workspaces_root(),
    ));
    let watcher: Arc<dyn FileWatcher> = Arc::new(NotifyFileWatcher::new(sender.clone()));
    let state_watcher = Arc::new(StateWatcher::new(
        &data_root,
        registry.file_path(),
        &store.workspaces_dir(),
        sender.clone(),
    ));
    let scanner = Arc::new(ActivityScanner::new(Arc::clone(&tmux)));

    let services = Arc::new(Services {
        git,
        tmux,
        service,
        store,
        watcher,
        state_watcher,
        status_cache: Arc::new(StatusCache::new()),
        suppression,
        scripts,
        scanner,
        logs_dir: agentmux_core::config::cache_dir().join("sessions"),
    });
    let mut app = App::new(services);

    let mut terminal = ratatui::init();
    let result = agentmux_tui::app::run(&mut terminal, &mut app, &bus, &sender);
    ratatui::restore();
    result.map(|()| ExitCode::SUCCESS)
}
