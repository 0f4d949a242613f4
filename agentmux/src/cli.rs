use agentmux_core::config::Config;
use agentmux_core::git::{CliGitOps, GitOps};
use agentmux_core::model::Project;
use agentmux_core::paths::{canonical_path, expand_tilde, same_canonical};
use agentmux_core::registry::ProjectRegistry;
use agentmux_core::script::ShellScriptRunner;
use agentmux_core::service::WorkspaceService;
use agentmux_core::store::WorkspaceStore;
use agentmux_core::suppress::SuppressionMap;
use anyhow::{Result, anyhow, bail};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    version,
    about = "Terminal multiplexer for AI coding agents. Run without a subcommand for the dashboard, or use subcommands for scripting."
)]
pub struct Cli {
    /// Override path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage registered project repositories
    Projects {
        #[command(subcommand)]
        command: ProjectsCommand,
    },
    /// List all workspaces across registered projects
    Workspaces {
        /// Output result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a workspace (git worktree + metadata) under a project
    Create {
        /// Project name (as shown by 'agentmux workspaces')
        project: String,
        /// Workspace name; also becomes the branch name
        name: String,
        /// Base ref for the new branch (default: the repo's default branch)
        #[arg(long)]
        base: Option<String>,
        /// Output result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a workspace: worktree, branch, and metadata
    Delete {
        /// Project name (as shown by 'agentmux workspaces')
        project: String,
        /// Workspace name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum ProjectsCommand {
    /// List registered repository paths
    List {
        /// Output result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Register a repository by path
    Add { path: String },
    /// Unregister a repository (files untouched)
    Remove { path: String },
}

struct Deps {
    registry: Arc<ProjectRegistry>,
    service: WorkspaceService,
    git: Arc<dyn GitOps>,
}

fn build_deps(config: &Config) -> Deps {
    let data_root = config.resolved_data_root();
    let git: Arc<dyn GitOps> = Arc::new(CliGitOps);
    let suppression = Arc::new(SuppressionMap::new());
    let store = Arc::new(WorkspaceStore::new(
        &data_root,
        &config.resolved_default_assistant(),
        suppression,
    ));
    let registry = Arc::new(ProjectRegistry::new(&data_root));
    let scripts = Arc::new(ShellScriptRunner::new(config.setup_command()));
    let service = WorkspaceService::new(
        Arc::clone(&git),
        store,
        Arc::clone(&registry),
        scripts,
        &config.resolved_workspaces_root(),
    );
    Deps {
        registry,
        service,
        git,
    }
}

pub fn run_command(command: Commands, config: &Config) -> Result<ExitCode> {
    let deps = build_deps(config);
    match command {
        Commands::Projects { command } => run_projects(command, &deps),
        Commands::Workspaces { json } => run_workspaces(&deps, json),
        Commands::Create {
            project,
            name,
            base,
            json,
        } => run_create(&deps, &project, &name, base.as_deref().unwrap_or(""), json),
        Commands::Delete { project, name } => run_delete(&deps, &project, &name),
    }
}

fn run_projects(command: ProjectsCommand, deps: &Deps) -> Result<ExitCode> {
    match command {
        ProjectsCommand::List { json } => {
            let projects = deps.registry.projects();
            if json {
                let value: Vec<_> = projects
                    .iter()
                    .map(|p| json!({ "path": p, "name": Project::new(p).name }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                for path in projects {
                    println!("{}", path.display());
                }
            }
        }
        ProjectsCommand::Add { path } => {
            let path = expand_tilde(&path)
                .ok_or_else(|| anyhow!("cannot resolve home directory for {path}"))?;
            let canonical = canonical_path(&path);
            if !deps.git.is_git_repository(&canonical) {
                bail!("{} is not a git repository", canonical.display());
            }
            deps.registry.add_project(&canonical)?;
            println!("added {}", canonical.display());
        }
        ProjectsCommand::Remove { path } => {
            let path = expand_tilde(&path)
                .ok_or_else(|| anyhow!("cannot resolve home directory for {path}"))?;
            deps.registry.remove_project(&path)?;
            println!("removed {}", path.display());
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_workspaces(deps: &Deps, json: bool) -> Result<ExitCode> {
    let projects = deps.service.load_projects()?;
    if json {
        let value: Vec<_> = projects
            .iter()
            .flat_map(|project| {
                project.workspaces.iter().map(|ws| {
                    json!({
                        "project": project.name,
                        "workspace": ws.name,
                        "id": ws.id(),
                        "branch": ws.branch,
                        "root": ws.root,
                        "primary": ws.is_primary(),
                        "archived": ws.archived,
                    })
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        for project in &projects {
            println!("{}", project.name);
            for ws in &project.workspaces {
                let mut flags = String::new();
                if ws.is_primary() {
                    flags.push_str(" (primary)");
                }
                if ws.archived {
                    flags.push_str(" (archived)");
                }
                println!("  {} [{}]{}", ws.name, ws.branch, flags);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn find_project(deps: &Deps, name: &str) -> Result<Project> {
    let wanted = expand_tilde(name);
    deps.service
        .load_projects()?
        .into_iter()
        .find(|p| {
            p.name == name
                || wanted
                    .as_deref()
                    .is_some_and(|w| same_canonical(&p.path, w))
        })
        .ok_or_else(|| anyhow!("no project named {name:?}; see 'agentmux projects list'"))
}

fn run_create(deps: &Deps, project: &str, name: &str, base: &str, json: bool) -> Result<ExitCode> {
    let project = find_project(deps, project)?;
    match deps.service.create_workspace(&project, name, base) {
        Ok(ws) => {
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "workspace": ws.name,
                        "id": ws.id(),
                        "branch": ws.branch,
                        "base": ws.base,
                        "root": ws.root,
                    }))?
                );
            } else {
                println!("created {} at {}", ws.name, ws.root.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => bail!("{}", failure.error),
    }
}

fn run_delete(deps: &Deps, project: &str, name: &str) -> Result<ExitCode> {
    let project = find_project(deps, project)?;
    let workspace = project
        .workspaces
        .iter()
        .find(|w| w.name == name)
        .ok_or_else(|| anyhow!("no workspace named {name:?} in {}", project.name))?
        .clone();
    deps.service.delete_workspace(&project, &workspace)?;
    println!("deleted {name}");
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_create_with_base() {
        let cli = Cli::parse_from(["agentmux", "create", "repo", "feat", "--base", "main"]);
        match cli.command {
            Some(Commands::Create { project, name, base, json }) => {
                assert_eq!(project, "repo");
                assert_eq!(name, "feat");
                assert_eq!(base.as_deref(), Some("main"));
                assert!(!json);
            }
            _ => panic!("expected create"),
        }
    }

    #[test]
    fn parses_projects_add() {
        let cli = Cli::parse_from(["agentmux", "projects", "add", "~/dev/repo"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Projects {
                command: ProjectsCommand::Add { .. }
            })
        ));
    }

    #[test]
    fn no_subcommand_means_tui() {
        let cli = Cli::parse_from(["agentmux"]);
        assert!(cli.command.is_none());
    }
}
