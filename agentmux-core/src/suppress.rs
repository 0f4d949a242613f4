use crate::paths::clean_path;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// How long a self-save marker can suppress a watcher event before it is
/// reclaimed.
const SUPPRESSION_WINDOW: Duration = Duration::from_millis(800);

/// Identity of a file's content at a point in time. Modtime alone is not
/// enough on coarse-timestamp filesystems, so size and digest back it up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub mtime_nanos: u128,
    pub size: u64,
    pub digest: String,
}

/// Fingerprint a file as it currently exists on disk.
pub fn fingerprint(path: &Path) -> Result<Fingerprint> {
    let meta = fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?;
    let mtime_nanos = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_nanos());
    let contents = fs::read(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let digest = Sha256::digest(&contents);
    Ok(Fingerprint {
        mtime_nanos,
        size: meta.len(),
        digest: format!("{digest:x}"),
    })
}

#[derive(Debug, Clone)]
struct Marker {
    written_at: SystemTime,
    fingerprint: Fingerprint,
}

/// Markers for metadata files this process wrote itself, so the state
/// watcher can tell self-originated events from externally-authored ones.
///
/// The map is touched from save operations running off-loop, hence the
/// mutex. The suppression decision does its filesystem work outside the
/// critical section; the TOCTOU window that opens is benign because a
/// fingerprint mismatch fails open into a reload.
pub struct SuppressionMap {
    window: Duration,
    inner: Mutex<HashMap<PathBuf, Marker>>,
}

impl Default for SuppressionMap {
    fn default() -> Self {
        Self::new()
    }
}

impl SuppressionMap {
    pub fn new() -> Self {
        Self::with_window(SUPPRESSION_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Record that this process just wrote `path`. Called immediately
    /// after every metadata save; a fingerprint failure just means no
    /// suppression for the write that follows.
    pub fn record(&self, path: &Path) {
        let key = clean_path(path);
        match fingerprint(&key) {
            Ok(fp) => {
                self.inner.lock().unwrap().insert(
                    key,
                    Marker {
                        written_at: SystemTime::now(),
                        fingerprint: fp,
                    },
                );
            }
            Err(e) => log::warn!("could not fingerprint {}: {e:#}", key.display()),
        }
    }

    /// Decide whether a watcher event covering exactly `paths` was caused
    /// by our own writes. Every path must carry a fresh marker whose
    /// fingerprint still matches the file on disk; anything else fails
    /// open (the event is processed and state reloads).
    pub fn should_suppress(&self, paths: &[PathBuf]) -> bool {
        if paths.is_empty() {
            return false;
        }
        let now = SystemTime::now();
        let mut pending: Vec<(PathBuf, Fingerprint)> = Vec::with_capacity(paths.len());
        {
            let mut inner = self.inner.lock().unwrap();
            let window = self.window;
            inner.retain(|_, marker| {
                now.duration_since(marker.written_at)
                    .is_ok_and(|age| age <= window)
            });
            for path in paths {
                let key = clean_path(path);
                let Some(marker) = inner.get(&key) else {
                    return false;
                };
                // Markers written "in the future" mean a clock step;
                // retain() above already dropped the too-old ones.
                if now.duration_since(marker.written_at).is_err() {
                    return false;
                }
                pending.push((key, marker.fingerprint.clone()));
            }
        }
        // Re-fingerprint off-lock. A file changed since our write (or now
        // unreadable) means the event was not purely self-originated.
        pending.into_iter().all(|(path, recorded)| {
            fingerprint(&path).is_ok_and(|current| current == recorded)
        })
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}
