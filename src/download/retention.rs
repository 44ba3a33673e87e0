//! Retention of downloaded artifacts
//!
//! Files are deleted once they are older than the retention threshold, and
//! served files are deleted shortly after serving. A file waiting for its
//! post-serve deletion is left alone by the periodic sweep.

use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Outcome of one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub removed: usize,
    pub retained: usize,
    pub failed: usize,
}

/// File count and total size of the downloads directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Occupancy {
    pub files: usize,
    pub bytes: u64,
}

enum Removal {
    Removed,
    Missing,
    Failed(io::Error),
}

fn remove_quietly(path: &Path) -> Removal {
    match fs::remove_file(path) {
        Ok(()) => Removal::Removed,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Removal::Missing,
        Err(e) => Removal::Failed(e),
    }
}

/// Deletes old and already-served files from the downloads directory
pub struct RetentionSweeper {
    dir: PathBuf,
    max_age: Duration,
    grace: Duration,
    pending: Mutex<HashSet<PathBuf>>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl RetentionSweeper {
    pub fn new(
        dir: impl Into<PathBuf>,
        max_age: Duration,
        grace: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            dir: dir.into(),
            max_age,
            grace,
            pending: Mutex::new(HashSet::new()),
            tracker: TaskTracker::new(),
            shutdown,
        }
    }

    /// Directory this sweeper manages
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Delete every file older than the retention threshold
    pub fn sweep_now(&self) -> SweepReport {
        self.sweep_at(SystemTime::now())
    }

    /// Sweep as if the current time were `now`
    pub fn sweep_at(&self, now: SystemTime) -> SweepReport {
        let mut report = SweepReport::default();

        for path in self.files() {
            if self.is_pending(&path) {
                report.retained += 1;
                continue;
            }

            let age = fs::metadata(&path)
                .and_then(|m| m.modified())
                .map(|modified| now.duration_since(modified).unwrap_or(Duration::ZERO));

            match age {
                Ok(age) if age > self.max_age => match remove_quietly(&path) {
                    Removal::Removed => {
                        debug!("Swept {}", path.display());
                        report.removed += 1;
                    }
                    Removal::Missing => {}
                    Removal::Failed(e) => {
                        warn!("Failed to remove {}: {}", path.display(), e);
                        report.failed += 1;
                    }
                },
                Ok(_) => report.retained += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("Cannot stat {}: {}", path.display(), e);
                    report.failed += 1;
                }
            }
        }

        if report.removed > 0 {
            info!("Retention sweep removed {} file(s)", report.removed);
        }
        report
    }

    /// Delete `path` once the grace period, counted from this call, has passed.
    ///
    /// Until then the file is exempt from periodic sweeps. Shutdown cancels
    /// the wait and leaves the file for the next sweep.
    pub fn schedule_removal(self: &Arc<Self>, path: PathBuf) {
        self.lock_pending().insert(path.clone());
        let deadline = tokio::time::Instant::now() + self.grace;

        let sweeper = Arc::clone(self);
        self.tracker.spawn(async move {
            tokio::select! {
                _ = sweeper.shutdown.cancelled() => {
                    sweeper.lock_pending().remove(&path);
                    return;
                }
                _ = tokio::time::sleep_until(deadline) => {}
            }

            match remove_quietly(&path) {
                Removal::Removed => debug!("Removed served file {}", path.display()),
                Removal::Missing => {}
                Removal::Failed(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
            sweeper.lock_pending().remove(&path);
        });
    }

    /// Whether `path` is waiting for its post-serve deletion
    pub fn is_pending(&self, path: &Path) -> bool {
        self.lock_pending().contains(path)
    }

    /// Remove and recreate the whole directory
    pub fn purge(&self) -> io::Result<()> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        fs::create_dir_all(&self.dir)?;
        self.lock_pending().clear();
        info!("Purged {}", self.dir.display());
        Ok(())
    }

    /// Current file count and total size
    pub fn occupancy(&self) -> Occupancy {
        self.files()
            .iter()
            .filter_map(|path| fs::metadata(path).ok())
            .fold(Occupancy::default(), |acc, meta| Occupancy {
                files: acc.files + 1,
                bytes: acc.bytes + meta.len(),
            })
    }

    /// Run [`RetentionSweeper::sweep_now`] every `interval` until shutdown
    pub fn spawn_periodic(self: &Arc<Self>, interval: Duration) {
        let sweeper = Arc::clone(self);
        self.tracker.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = sweeper.shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let worker = Arc::clone(&sweeper);
                        match tokio::task::spawn_blocking(move || worker.sweep_now()).await {
                            Ok(report) => debug!("Periodic sweep: {:?}", report),
                            Err(e) => warn!("Periodic sweep task failed: {}", e),
                        }
                    }
                }
            }
        });
    }

    /// Stop background work and wait for it to finish
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }

    fn files(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect()
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashSet<PathBuf>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sweeper(dir: &TempDir) -> Arc<RetentionSweeper> {
        Arc::new(RetentionSweeper::new(
            dir.path(),
            Duration::from_secs(3600),
            Duration::from_secs(60),
            CancellationToken::new(),
        ))
    }

    fn touch(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_sweep_removes_only_old_files() {
        let dir = tempfile::tempdir().unwrap();
        let sweeper = sweeper(&dir);
        let path = touch(&dir, "a.mp4", b"1234");

        let report = sweeper.sweep_now();
        assert_eq!(report, SweepReport { removed: 0, retained: 1, failed: 0 });
        assert!(path.exists());

        let later = SystemTime::now() + Duration::from_secs(2 * 3600);
        let report = sweeper.sweep_at(later);
        assert_eq!(report.removed, 1);
        assert!(!path.exists());
    }

    #[test]
    fn test_occupancy_and_purge() {
        let dir = tempfile::tempdir().unwrap();
        let sweeper = sweeper(&dir);
        touch(&dir, "a.mp4", b"1234");
        touch(&dir, "b.mp3", b"56");

        assert_eq!(sweeper.occupancy(), Occupancy { files: 2, bytes: 6 });

        sweeper.purge().unwrap();
        assert!(dir.path().is_dir());
        assert_eq!(sweeper.occupancy(), Occupancy::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_served_file_survives_sweep_until_grace_elapses() {
        let dir = tempfile::tempdir().unwrap();
        let sweeper = sweeper(&dir);
        let path = touch(&dir, "served.mp4", b"data");

        sweeper.schedule_removal(path.clone());
        assert!(sweeper.is_pending(&path));

        // Pending files are exempt even when old enough to sweep
        let later = SystemTime::now() + Duration::from_secs(2 * 3600);
        assert_eq!(sweeper.sweep_at(later).removed, 0);
        assert!(path.exists());

        tokio::time::advance(Duration::from_secs(59)).await;
        tokio::task::yield_now().await;
        assert!(path.exists());

        tokio::time::advance(Duration::from_secs(2)).await;
        for _ in 0..10 {
            if !path.exists() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!path.exists());
        assert!(!sweeper.is_pending(&path));
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_counts_from_scheduling() {
        let dir = tempfile::tempdir().unwrap();
        let sweeper = sweeper(&dir);
        let path = touch(&dir, "served.mp4", b"data");

        sweeper.schedule_removal(path.clone());

        // The task first runs here, 45s after the file was served
        tokio::time::advance(Duration::from_secs(45)).await;
        tokio::task::yield_now().await;
        assert!(path.exists());

        tokio::time::advance(Duration::from_secs(16)).await;
        for _ in 0..10 {
            if !path.exists() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_removal() {
        let dir = tempfile::tempdir().unwrap();
        let sweeper = sweeper(&dir);
        let path = touch(&dir, "served.mp4", b"data");

        sweeper.schedule_removal(path.clone());
        sweeper.shutdown().await;

        assert!(path.exists());
        assert!(!sweeper.is_pending(&path));
    }
}
