use agentmux_core::model::Project;
use agentmux_core::paths::canonical_path;
use agentmux_core::status::GitStatus;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// One selectable row in the dashboard: a workspace under its project.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub project_name: String,
    pub project_path: PathBuf,
    pub workspace_id: String,
    pub workspace_name: String,
    pub branch: String,
    pub root: PathBuf,
    pub is_primary: bool,
    pub archived: bool,
}

/// The Dashboard model: a flattened project/workspace table with the
/// activity and status annotations the scanners feed in.
#[derive(Debug, Default)]
pub struct Dashboard {
    rows: Vec<Row>,
    selected: usize,
    active_workspaces: HashSet<String>,
    statuses: HashMap<PathBuf, GitStatus>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild rows from a fresh projects list, keeping the selection on
    /// the same workspace ID when it survived the reload.
    pub fn set_projects(&mut self, projects: &[Project]) {
        let previous_id = self.selected_row().map(|r| r.workspace_id.clone());
        self.rows = projects
            .iter()
            .flat_map(|project| {
                project.workspaces.iter().map(|ws| Row {
                    project_name: project.name.clone(),
                    project_path: project.path.clone(),
                    workspace_id: ws.id(),
                    workspace_name: ws.name.clone(),
                    branch: ws.branch.clone(),
                    root: ws.root.clone(),
                    is_primary: ws.is_primary(),
                    archived: ws.archived,
                })
            })
            .collect();
        self.selected = previous_id
            .and_then(|id| self.rows.iter().position(|r| r.workspace_id == id))
            .unwrap_or(0);
        self.statuses
            .retain(|root, _| self.rows.iter().any(|r| canonical_path(&r.root) == *root));
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn selected_row(&self) -> Option<&Row> {
        self.rows.get(self.selected)
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn move_selection(&mut self, delta: i32) {
        if self.rows.is_empty() {
            return;
        }
        let len = self.rows.len() as i32;
        let next = (self.selected as i32 + delta).rem_euclid(len);
        self.selected = next as usize;
    }

    pub fn select_workspace(&mut self, id: &str) {
        if let Some(index) = self.rows.iter().position(|r| r.workspace_id == id) {
            self.selected = index;
        }
    }

    pub fn set_active_workspaces(&mut self, active: HashSet<String>) {
        self.active_workspaces = active;
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active_workspaces.contains(id)
    }

    /// Whether any workspace currently shows assistant activity; drives
    /// the header spinner.
    pub fn any_working(&self) -> bool {
        !self.active_workspaces.is_empty()
    }

    pub fn set_status(&mut self, root: &Path, status: GitStatus) {
        self.statuses.insert(canonical_path(root), status);
    }

    pub fn status_for(&self, root: &Path) -> Option<&GitStatus> {
        self.statuses.get(&canonical_path(root))
    }
}
