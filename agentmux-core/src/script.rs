use crate::model::Workspace;
use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Runs configured setup scripts for freshly created workspaces.
pub trait ScriptRunner: Send + Sync {
    fn run_setup(&self, workspace: &Workspace) -> Result<()>;
    /// Kill any still-running setup children, used on shutdown.
    fn stop_all(&self);
}

/// Shell-based runner: executes the configured command via `sh -c` in the
/// workspace root with the workspace env applied. Children are tracked so
/// shutdown can reap them.
pub struct ShellScriptRunner {
    command: Option<String>,
    children: Arc<Mutex<HashMap<u32, std::process::Child>>>,
    stopping: Arc<AtomicBool>,
}

impl ShellScriptRunner {
    pub fn new(command: Option<String>) -> Self {
        Self {
            command,
            children: Arc::new(Mutex::new(HashMap::new())),
            stopping: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl ScriptRunner for ShellScriptRunner {
    fn run_setup(&self, workspace: &Workspace) -> Result<()> {
        let Some(command) = self.command.as_deref() else {
            return Ok(());
        };
        if self.stopping.load(Ordering::Relaxed) {
            return Ok(());
        }

        let child = Command::new("sh")
            .args(["-c", command])
            .current_dir(&workspace.root)
            .envs(&workspace.env)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to run setup for {}", workspace.name))?;
        let pid = child.id();
        self.children.lock().unwrap().insert(pid, child);

        // Wait in increments so stop_all can interleave a kill.
        loop {
            let status = {
                let mut children = self.children.lock().unwrap();
                let Some(child) = children.get_mut(&pid) else {
                    // Reaped by stop_all.
                    return Ok(());
                };
                child.try_wait()?
            };
            match status {
                Some(status) => {
                    self.children.lock().unwrap().remove(&pid);
                    if !status.success() {
                        bail!("setup command exited with {status}");
                    }
                    return Ok(());
                }
                None => std::thread::sleep(Duration::from_millis(100)),
            }
        }
    }

    fn stop_all(&self) {
        self.stopping.store(true, Ordering::Relaxed);
        let mut children = self.children.lock().unwrap();
        for (pid, mut child) in children.drain() {
            if let Err(e) = child.kill() {
                log::debug!("kill setup child {pid}: {e}");
            }
            let _ = child.wait();
        }
    }
}

/// Recording double for kernel tests.
#[derive(Default)]
pub struct MockScriptRunner {
    pub runs: Mutex<Vec<String>>,
    pub result: Mutex<Option<Result<()>>>,
}

impl ScriptRunner for MockScriptRunner {
    fn run_setup(&self, workspace: &Workspace) -> Result<()> {
        self.runs.lock().unwrap().push(workspace.id());
        self.result.lock().unwrap().take().unwrap_or(Ok(()))
    }

    fn stop_all(&self) {}
}
