use super::Tmux;
use anyhow::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// In-memory tmux double: sessions are names with scripted pane content.
#[derive(Default)]
pub struct MockTmux {
    pub sessions: Mutex<Vec<String>>,
    pub pane_content: Mutex<HashMap<String, String>>,
    pub killed: Mutex<Vec<String>>,
    pub piped: Mutex<Vec<(String, PathBuf)>>,
}

impl MockTmux {
    pub fn with_sessions(names: &[&str]) -> Self {
        Self {
            sessions: Mutex::new(names.iter().map(ToString::to_string).collect()),
            ..Self::default()
        }
    }

    pub fn set_pane_content(&self, session: &str, content: &str) {
        self.pane_content
            .lock()
            .unwrap()
            .insert(session.to_string(), content.to_string());
    }
}

impl Tmux for MockTmux {
    fn list_sessions(&self) -> Vec<String> {
        self.sessions.lock().unwrap().clone()
    }

    fn session_exists(&self, name: &str) -> bool {
        self.sessions.lock().unwrap().iter().any(|s| s == name)
    }

    fn create_session(&self, name: &str, _dir: &Path, _command: Option<&str>) -> Result<()> {
        let mut sessions = self.sessions.lock().unwrap();
        if !sessions.iter().any(|s| s == name) {
            sessions.push(name.to_string());
        }
        Ok(())
    }

    fn capture_pane(&self, session: &str, _lines: usize) -> Result<String> {
        Ok(self
            .pane_content
            .lock()
            .unwrap()
            .get(session)
            .cloned()
            .unwrap_or_default())
    }

    fn pipe_pane(&self, session: &str, log_path: &Path) -> Result<()> {
        self.piped
            .lock()
            .unwrap()
            .push((session.to_string(), log_path.to_path_buf()));
        Ok(())
    }

    fn kill_session(&self, name: &str) {
        self.killed.lock().unwrap().push(name.to_string());
        self.sessions.lock().unwrap().retain(|s| s != name);
    }
}
