//! Temp file cleanup
//!
//! Inputs are deleted as soon as a request finishes. Results are deleted after
//! the configured delay, and a periodic sweep catches anything a restart left
//! behind.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct Janitor {
    delay: Duration,
}

impl Janitor {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Delete `paths` now; missing files are ignored
    pub async fn remove_now(&self, paths: &[PathBuf]) {
        for path in paths {
            remove_quietly(path).await;
        }
    }

    /// Delete `path` once the retention delay has passed
    pub fn schedule_removal(&self, path: PathBuf) -> JoinHandle<()> {
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if remove_quietly(&path).await {
                tracing::info!(path = %path.display(), "Cleaned up expired result");
            }
        })
    }

    /// Periodically delete files in `root` older than the retention delay
    pub fn spawn_sweeper(&self, root: PathBuf, interval: Duration) -> JoinHandle<()> {
        let max_age = self.delay;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match sweep(&root, max_age).await {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!(removed, "Swept stale temp files"),
                    Err(e) => tracing::warn!(error = %e, "Temp directory sweep failed"),
                }
            }
        })
    }
}

/// Delete regular files in `root` whose last modification is at least `max_age` ago.
/// Returns how many were removed.
pub async fn sweep(root: &Path, max_age: Duration) -> std::io::Result<usize> {
    let mut removed = 0;
    let mut entries = tokio::fs::read_dir(root).await?;
    let now = SystemTime::now();

    while let Some(entry) = entries.next_entry().await? {
        let meta = match entry.metadata().await {
            Ok(meta) if meta.is_file() => meta,
            _ => continue,
        };
        let age = meta
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();

        if age >= max_age && remove_quietly(&entry.path()).await {
            removed += 1;
        }
    }

    Ok(removed)
}

/// Returns true if a file was deleted
async fn remove_quietly(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Removed temp file");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove temp file");
            false
        }
    }
}
