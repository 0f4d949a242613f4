use crate::paths::{canonical_path, same_canonical};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const REGISTRY_FILE_NAME: &str = "projects.json";
const REGISTRY_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    version: u32,
    projects: Vec<PathBuf>,
}

/// Ordered list of registered repository paths, persisted as one JSON
/// file under the data root. Paths are stored absolute; identity is the
/// canonical path, so add/remove are idempotent under symlinked or
/// relative spellings.
pub struct ProjectRegistry {
    path: PathBuf,
}

impl ProjectRegistry {
    pub fn new(data_root: &Path) -> Self {
        Self {
            path: data_root.join(REGISTRY_FILE_NAME),
        }
    }

    pub fn projects(&self) -> Vec<PathBuf> {
        let Ok(contents) = fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        let Ok(parsed) = serde_json::from_str::<RegistryFile>(&contents) else {
            log::warn!("unreadable project registry at {}", self.path.display());
            return Vec::new();
        };
        if parsed.version != REGISTRY_VERSION {
            return Vec::new();
        }
        parsed.projects
    }

    pub fn add_project(&self, path: &Path) -> Result<()> {
        let canonical = canonical_path(path);
        let mut projects = self.projects();
        if projects.iter().any(|p| same_canonical(p, &canonical)) {
            return Ok(());
        }
        projects.push(canonical);
        self.write(projects)
    }

    pub fn remove_project(&self, path: &Path) -> Result<()> {
        let mut projects = self.projects();
        projects.retain(|p| !same_canonical(p, path));
        self.write(projects)
    }

    pub fn file_path(&self) -> &Path {
        &self.path
    }

    fn write(&self, projects: Vec<PathBuf>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = RegistryFile {
            version: REGISTRY_VERSION,
            projects,
        };
        let serialized = serde_json::to_string_pretty(&file)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("failed to write registry {}", self.path.display()))?;
        Ok(())
    }
}
