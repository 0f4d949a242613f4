use crate::bus::MsgSender;
use crate::msg::{Msg, StateReason};
use crate::paths::clean_path;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, channel};
use std::sync::Mutex;
use std::time::Duration;

/// Raw backend events are batched for this long before one coalesced
/// message is posted. External editors tend to write several files in
/// quick succession; one reload should cover all of them.
const COALESCE_WINDOW: Duration = Duration::from_millis(200);

const METADATA_FILE_NAME: &str = "workspace.json";

/// Watches the metadata tree for externally-authored changes: workspace
/// metadata files and the project registry. Self-originated writes are
/// filtered later by the suppression map, not here.
pub struct StateWatcher {
    data_root: PathBuf,
    registry_file: PathBuf,
    workspaces_dir: PathBuf,
    sender: MsgSender,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl StateWatcher {
    pub fn new(
        data_root: &Path,
        registry_file: &Path,
        workspaces_dir: &Path,
        sender: MsgSender,
    ) -> Self {
        Self {
            data_root: data_root.to_path_buf(),
            registry_file: clean_path(registry_file),
            workspaces_dir: clean_path(workspaces_dir),
            sender,
            watcher: Mutex::new(None),
        }
    }

    /// Arm the watcher over the data root and start the coalescing
    /// thread. Idempotent: an armed watcher is torn down first.
    pub fn start(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.data_root)?;
        let (raw_tx, raw_rx) = channel::<PathBuf>();
        let mut watcher = notify::recommended_watcher(
            move |result: notify::Result<notify::Event>| match result {
                Ok(event) => {
                    // Writes only. Access events would echo our own
                    // suppression-check reads back as changes.
                    if !matches!(
                        event.kind,
                        notify::EventKind::Create(_)
                            | notify::EventKind::Modify(_)
                            | notify::EventKind::Remove(_)
                    ) {
                        return;
                    }
                    for path in event.paths {
                        let _ = raw_tx.send(path);
                    }
                }
                Err(e) => log::warn!("state watcher error: {e}"),
            },
        )?;
        watcher.watch(&self.data_root, RecursiveMode::Recursive)?;

        self.spawn_coalescer(raw_rx);
        *self.watcher.lock().unwrap() = Some(watcher);
        Ok(())
    }

    /// Tear down and re-arm. Invoked by the kernel after every handled
    /// (or suppressed) state event; failures are logged, the next event
    /// source is the periodic reload anyway.
    pub fn restart(&self) {
        self.stop();
        if let Err(e) = self.start() {
            log::warn!("state watcher restart failed: {e:#}");
        }
    }

    pub fn stop(&self) {
        // Dropping the backend drops the raw sender, which ends the
        // coalescer thread on its next recv.
        *self.watcher.lock().unwrap() = None;
    }

    fn spawn_coalescer(&self, raw_rx: Receiver<PathBuf>) {
        let sender = self.sender.clone();
        let registry_file = self.registry_file.clone();
        let workspaces_dir = self.workspaces_dir.clone();
        std::thread::spawn(move || {
            while let Ok(first) = raw_rx.recv() {
                let mut paths = vec![clean_path(&first)];
                // Collect everything arriving inside the window.
                let deadline = std::time::Instant::now() + COALESCE_WINDOW;
                while let Some(remaining) = deadline.checked_duration_since(std::time::Instant::now())
                    && let Ok(next) = raw_rx.recv_timeout(remaining)
                {
                    let next = clean_path(&next);
                    if !paths.contains(&next) {
                        paths.push(next);
                    }
                }

                let mut workspace_paths = Vec::new();
                let mut registry_changed = false;
                for path in paths {
                    if path == registry_file {
                        registry_changed = true;
                    } else if path.starts_with(&workspaces_dir)
                        && path.file_name().is_some_and(|n| n == METADATA_FILE_NAME)
                    {
                        workspace_paths.push(path);
                    }
                    // Anything else (lock files, editor temp files) is noise.
                }

                if registry_changed {
                    sender.post(Msg::StateFileChanged {
                        reason: StateReason::Projects,
                        paths: vec![registry_file.clone()],
                    });
                }
                if !workspace_paths.is_empty() {
                    sender.post(Msg::StateFileChanged {
                        reason: StateReason::Workspaces,
                        paths: workspace_paths,
                    });
                }
            }
        });
    }
}
