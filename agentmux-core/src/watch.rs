use crate::bus::MsgSender;
use crate::msg::Msg;
use crate::paths::same_canonical;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use thiserror::Error;

/// Fixed backoff before rebuilding a watcher that died unexpectedly.
const RESTART_BACKOFF: Duration = Duration::from_millis(500);

/// Errors from the file-watching layer. `Limit` is distinguished because
/// the kernel degrades differently on watch-descriptor exhaustion (one
/// warning, then silence) than on ordinary failures (log and carry on).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatchError {
    #[error("file watch limit reached")]
    Limit,
    #[error("watch failed: {0}")]
    Other(String),
}

/// Worktree watcher the kernel consumes. At most one root is watched at
/// a time: the active workspace's.
pub trait FileWatcher: Send + Sync {
    fn watch(&self, root: &Path) -> Result<(), WatchError>;
    fn unwatch(&self, root: &Path) -> Result<(), WatchError>;
    fn is_watching(&self, root: &Path) -> bool;
    fn close(&self);
}

struct State {
    watcher: Option<RecommendedWatcher>,
    root: Option<PathBuf>,
}

struct Inner {
    state: Mutex<State>,
    sender: MsgSender,
}

/// notify-backed watcher posting [`Msg::FileChanged`] for the watched
/// root. Restarts itself with a fixed backoff when the backend reports a
/// fatal error while a root is still supposed to be watched.
pub struct NotifyFileWatcher {
    inner: Arc<Inner>,
}

impl NotifyFileWatcher {
    pub fn new(sender: MsgSender) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    watcher: None,
                    root: None,
                }),
                sender,
            }),
        }
    }

    fn build_watcher(inner: &Arc<Inner>) -> Result<RecommendedWatcher, WatchError> {
        let weak: Weak<Inner> = Arc::downgrade(inner);
        notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
            let Some(inner) = weak.upgrade() else { return };
            match result {
                Ok(event) => {
                    if !matters(&event.kind) {
                        return;
                    }
                    let root = inner.state.lock().unwrap().root.clone();
                    if let Some(root) = root {
                        inner.sender.post(Msg::FileChanged { root });
                    }
                }
                Err(e) => {
                    log::warn!("file watcher error: {e}");
                    let weak = Arc::downgrade(&inner);
                    std::thread::spawn(move || {
                        std::thread::sleep(RESTART_BACKOFF);
                        if let Some(inner) = weak.upgrade() {
                            Self::restart(&inner);
                        }
                    });
                }
            }
        })
        .map_err(|e| map_notify_err(&e))
    }

    /// Tear down and rebuild the backend, re-arming the current root.
    /// Failures here are logged; the next activation retries.
    fn restart(inner: &Arc<Inner>) {
        let mut state = inner.state.lock().unwrap();
        state.watcher = None;
        let Some(root) = state.root.clone() else {
            return;
        };
        match Self::build_watcher(inner) {
            Ok(mut watcher) => {
                if let Err(e) = watcher.watch(&root, RecursiveMode::Recursive) {
                    log::warn!("file watcher restart failed for {}: {e}", root.display());
                    state.root = None;
                    return;
                }
                state.watcher = Some(watcher);
            }
            Err(e) => {
                log::warn!("file watcher rebuild failed: {e}");
                state.root = None;
            }
        }
    }
}

/// Event kinds that can change git status. Access-only events are noise.
fn matters(kind: &notify::EventKind) -> bool {
    use notify::EventKind;
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    )
}

fn map_notify_err(e: &notify::Error) -> WatchError {
    match &e.kind {
        notify::ErrorKind::MaxFilesWatch => WatchError::Limit,
        // inotify reports descriptor exhaustion as ENOSPC.
        notify::ErrorKind::Io(io) if io.raw_os_error() == Some(28) => WatchError::Limit,
        _ => WatchError::Other(e.to_string()),
    }
}

impl FileWatcher for NotifyFileWatcher {
    fn watch(&self, root: &Path) -> Result<(), WatchError> {
        let mut state = self.inner.state.lock().unwrap();
        if state.watcher.is_none() {
            state.watcher = Some(Self::build_watcher(&self.inner)?);
        }
        let watcher = state.watcher.as_mut().unwrap();
        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| map_notify_err(&e))?;
        state.root = Some(root.to_path_buf());
        Ok(())
    }

    fn unwatch(&self, root: &Path) -> Result<(), WatchError> {
        let mut state = self.inner.state.lock().unwrap();
        let was_watching = state
            .root
            .as_ref()
            .is_some_and(|r| same_canonical(r, root));
        if let Some(watcher) = state.watcher.as_mut() {
            watcher.unwatch(root).map_err(|e| map_notify_err(&e))?;
        }
        if was_watching {
            state.root = None;
        }
        Ok(())
    }

    fn is_watching(&self, root: &Path) -> bool {
        self.inner
            .state
            .lock()
            .unwrap()
            .root
            .as_ref()
            .is_some_and(|r| same_canonical(r, root))
    }

    fn close(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.watcher = None;
        state.root = None;
    }
}

/// Test double with scripted results and a recorded watch history.
#[derive(Default)]
pub struct MockFileWatcher {
    pub watch_results: Mutex<Vec<Result<(), WatchError>>>,
    pub watched: Mutex<Option<PathBuf>>,
    pub watch_calls: Mutex<Vec<PathBuf>>,
    pub unwatch_calls: Mutex<Vec<PathBuf>>,
}

impl MockFileWatcher {
    /// Queue the result for the next `watch` call (FIFO).
    pub fn push_watch_result(&self, result: Result<(), WatchError>) {
        self.watch_results.lock().unwrap().push(result);
    }
}

impl FileWatcher for MockFileWatcher {
    fn watch(&self, root: &Path) -> Result<(), WatchError> {
        self.watch_calls.lock().unwrap().push(root.to_path_buf());
        let mut results = self.watch_results.lock().unwrap();
        let result = if results.is_empty() {
            Ok(())
        } else {
            results.remove(0)
        };
        if result.is_ok() {
            *self.watched.lock().unwrap() = Some(root.to_path_buf());
        }
        result
    }

    fn unwatch(&self, root: &Path) -> Result<(), WatchError> {
        self.unwatch_calls.lock().unwrap().push(root.to_path_buf());
        let mut watched = self.watched.lock().unwrap();
        if watched.as_ref().is_some_and(|r| same_canonical(r, root)) {
            *watched = None;
        }
        Ok(())
    }

    fn is_watching(&self, root: &Path) -> bool {
        self.watched
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|r| same_canonical(r, root))
    }

    fn close(&self) {
        *self.watched.lock().unwrap() = None;
    }
}
