use crate::paths::expand_tilde;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "agentmux";

/// Resolve one of the app's base directories: the XDG environment
/// override when set and non-empty, otherwise the conventional dotdir
/// under home. agentmux fronts tmux, so these are unix conventions
/// everywhere; with no resolvable home we land in the system temp dir
/// rather than aborting.
fn base_dir(env_var: &str, home_segments: &[&str]) -> PathBuf {
    if let Ok(override_dir) = std::env::var(env_var)
        && !override_dir.is_empty()
    {
        return PathBuf::from(override_dir).join(APP_NAME);
    }
    let mut dir = dirs::home_dir().unwrap_or_else(std::env::temp_dir);
    for segment in home_segments {
        dir.push(segment);
    }
    dir.join(APP_NAME)
}

/// `$XDG_CONFIG_HOME/agentmux` or `~/.config/agentmux`.
pub fn config_dir() -> PathBuf {
    base_dir("XDG_CONFIG_HOME", &[".config"])
}

fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default data root: `$XDG_DATA_HOME/agentmux` or
/// `~/.local/share/agentmux`. Holds the project registry and
/// per-workspace metadata.
pub fn default_data_root() -> PathBuf {
    base_dir("XDG_DATA_HOME", &[".local", "share"])
}

/// `$XDG_CACHE_HOME/agentmux` or `~/.cache/agentmux`. Log files and
/// session output capture live here.
pub fn cache_dir() -> PathBuf {
    base_dir("XDG_CACHE_HOME", &[".cache"])
}

pub const DEFAULT_ASSISTANT: &str = "claude";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory under which managed worktrees are created, laid out as
    /// `<workspaces_root>/<project>/<workspace>`. Supports `~`. Defaults
    /// to `~/agentmux`.
    pub workspaces_root: Option<String>,

    /// Override for the metadata root (registry + workspace.json tree).
    pub data_root: Option<String>,

    /// Assistant launched in new tabs when a workspace has no preference
    /// of its own (e.g. "claude", "codex").
    pub default_assistant: Option<String>,

    /// Per-workspace setup behaviour.
    #[serde(default)]
    pub setup: SetupConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct SetupConfig {
    /// Shell command run in a freshly created workspace root, e.g.
    /// ```toml
    /// [setup]
    /// command = "npm install"
    /// ```
    pub command: Option<String>,
}

impl Config {
    /// Load from an explicit path, or the default config file. A missing
    /// file yields the default config; a malformed one is an error.
    pub fn load(path_override: Option<&Path>) -> Result<Self> {
        let path = path_override.map_or_else(config_file, Path::to_path_buf);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn resolved_workspaces_root(&self) -> PathBuf {
        self.workspaces_root
            .as_deref()
            .and_then(expand_tilde)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(std::env::temp_dir)
                    .join(APP_NAME)
            })
    }

    pub fn resolved_data_root(&self) -> PathBuf {
        self.data_root
            .as_deref()
            .and_then(expand_tilde)
            .unwrap_or_else(default_data_root)
    }

    pub fn resolved_default_assistant(&self) -> String {
        self.default_assistant
            .clone()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ASSISTANT.to_string())
    }

    pub fn setup_command(&self) -> Option<String> {
        self.setup
            .command
            .clone()
            .filter(|c| !c.trim().is_empty())
    }
}
