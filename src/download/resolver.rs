//! Locating and naming the file an engine run produced

use crate::error::ServiceError;
use crate::utils::{is_partial_artifact, numbered_filename, to_safe_filename};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Give up on collision suffixes after this many candidates
const MAX_NAME_ATTEMPTS: usize = 10_000;

/// Which heuristic located the produced file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStep {
    /// Path printed by the engine after post-processing
    Reported,
    /// `<expected stem>.<ext>`
    Stem,
    /// Any name containing the job token
    Token,
    /// Most recently modified file inside the recency window
    Recent,
}

/// Finds the output of a download inside the downloads directory
pub struct FileResolver {
    dir: PathBuf,
    recent_window: Duration,
    rename_lock: Mutex<()>,
}

impl FileResolver {
    pub fn new(dir: impl Into<PathBuf>, recent_window: Duration) -> Self {
        Self {
            dir: dir.into(),
            recent_window,
            rename_lock: Mutex::new(()),
        }
    }

    /// Downloads directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Locate the output of a job, trying each heuristic in order
    pub fn locate(
        &self,
        expected_stem: &str,
        token: &str,
        reported: Option<&Path>,
    ) -> Option<(PathBuf, ResolutionStep)> {
        self.locate_at(expected_stem, token, reported, SystemTime::now())
    }

    /// [`FileResolver::locate`] with an explicit notion of "now"
    pub fn locate_at(
        &self,
        expected_stem: &str,
        token: &str,
        reported: Option<&Path>,
        now: SystemTime,
    ) -> Option<(PathBuf, ResolutionStep)> {
        if let Some(path) = reported.filter(|path| is_candidate(path)) {
            return Some((path.to_path_buf(), ResolutionStep::Reported));
        }

        let entries = self.candidates();
        let stem_prefix = format!("{}.", expected_stem);

        if let Some(path) = entries.iter().find(|path| {
            file_name(path).is_some_and(|name| name.starts_with(&stem_prefix))
        }) {
            return Some((path.clone(), ResolutionStep::Stem));
        }

        if !token.is_empty() {
            if let Some(path) = entries
                .iter()
                .find(|path| file_name(path).is_some_and(|name| name.contains(token)))
            {
                return Some((path.clone(), ResolutionStep::Token));
            }
        }

        entries
            .iter()
            .filter_map(|path| {
                let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
                let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
                (age <= self.recent_window).then_some((path, modified))
            })
            .max_by_key(|(_, modified)| *modified)
            .map(|(path, _)| (path.clone(), ResolutionStep::Recent))
    }

    /// Move `found` to `<safe title>.<ext>`, suffixing ` (n)` on collision.
    ///
    /// An existing file is never overwritten: the target is created with a
    /// hard link, which fails if the name is already taken.
    pub fn claim_name(&self, found: &Path, title: &str) -> Result<PathBuf, ServiceError> {
        let _guard = self.rename_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let extension = found
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default();
        let base = to_safe_filename(title, &extension);

        for counter in 0..MAX_NAME_ATTEMPTS {
            let target = self.dir.join(numbered_filename(&base, counter));
            if target == found {
                return Ok(target);
            }

            match fs::hard_link(found, &target) {
                Ok(()) => {
                    if let Err(e) = fs::remove_file(found) {
                        warn!("Could not remove {} after linking: {}", found.display(), e);
                    }
                    debug!("Claimed {}", target.display());
                    return Ok(target);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    // Filesystems without hard links: checked rename under the lock
                    debug!("Hard link failed ({}), falling back to rename", e);
                    if target.exists() {
                        continue;
                    }
                    fs::rename(found, &target)?;
                    return Ok(target);
                }
            }
        }

        Err(ServiceError::FileNotResolved(format!(
            "no free name for {}",
            base
        )))
    }

    /// Regular, finished files directly inside the directory
    fn candidates(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| is_candidate(path))
            .collect()
    }
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

fn is_candidate(path: &Path) -> bool {
    path.is_file() && file_name(path).is_some_and(|name| !is_partial_artifact(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileResolver) {
        let dir = tempfile::tempdir().unwrap();
        let resolver = FileResolver::new(dir.path(), Duration::from_secs(60));
        (dir, resolver)
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"data").unwrap();
        path
    }

    #[test]
    fn test_reported_path_wins() {
        let (dir, resolver) = setup();
        let reported = touch(dir.path(), "whatever.mkv");
        touch(dir.path(), "Clip.tok.mp4");

        let (path, step) = resolver
            .locate("Clip.tok", "tok", Some(reported.as_path()))
            .unwrap();
        assert_eq!(path, reported);
        assert_eq!(step, ResolutionStep::Reported);
    }

    #[test]
    fn test_stem_then_token() {
        let (dir, resolver) = setup();
        let missing = dir.path().join("gone.mp4");
        touch(dir.path(), "Clip.tok.webm");

        let (path, step) = resolver.locate("Clip.tok", "tok", Some(missing.as_path())).unwrap();
        assert_eq!(path, dir.path().join("Clip.tok.webm"));
        assert_eq!(step, ResolutionStep::Stem);

        let (path, step) = resolver.locate("Other.tok2", "tok", None).unwrap();
        assert_eq!(path, dir.path().join("Clip.tok.webm"));
        assert_eq!(step, ResolutionStep::Token);
    }

    #[test]
    fn test_partial_artifacts_are_ignored() {
        let (dir, resolver) = setup();
        touch(dir.path(), "Clip.tok.mp4.part");
        touch(dir.path(), "Clip.tok.f137.mp4.ytdl");

        let far_future = SystemTime::now() + Duration::from_secs(3600);
        assert!(resolver
            .locate_at("Clip.tok", "tok", None, far_future)
            .is_none());
    }

    #[test]
    fn test_recent_fallback_respects_window() {
        let (dir, resolver) = setup();
        let path = touch(dir.path(), "renamed_by_engine.mp4");

        let (found, step) = resolver.locate("Clip.tok", "tok", None).unwrap();
        assert_eq!(found, path);
        assert_eq!(step, ResolutionStep::Recent);

        let later = SystemTime::now() + Duration::from_secs(120);
        assert!(resolver.locate_at("Clip.tok", "tok", None, later).is_none());
    }

    #[test]
    fn test_claim_name_never_overwrites() {
        let (dir, resolver) = setup();
        touch(dir.path(), "My Clip.mp4");
        let found = touch(dir.path(), "My_Clip.tok.mp4");

        let claimed = resolver.claim_name(&found, "My Clip").unwrap();
        assert_eq!(claimed, dir.path().join("My Clip (1).mp4"));
        assert!(!found.exists());
        assert_eq!(fs::read(dir.path().join("My Clip.mp4")).unwrap(), b"data");

        let second = touch(dir.path(), "My_Clip.tok2.mp4");
        let claimed = resolver.claim_name(&second, "My Clip").unwrap();
        assert_eq!(claimed, dir.path().join("My Clip (2).mp4"));
    }

    #[test]
    fn test_claim_name_keeps_real_extension() {
        let (dir, resolver) = setup();
        let found = touch(dir.path(), "a.tok.webm");
        let claimed = resolver.claim_name(&found, "Title: Part 1").unwrap();
        assert_eq!(claimed, dir.path().join("Title_ Part 1.webm"));
    }
}
