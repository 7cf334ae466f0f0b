//! File-system retention sweeper.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;

/// Errors raised while sweeping.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("failed to read {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Deletes files past a retention window.
pub trait RetentionSweeper {
    /// Removes files under `root` last modified more than `age` ago.
    /// Returns the number of files deleted.
    fn purge_older_than(&self, root: &Path, age: Duration) -> Result<usize, SweepError>;
}

/// Sweeper over the local file system.
///
/// Walks `root` recursively and deletes regular files only; directories
/// are left in place. A missing root is treated as empty.
#[derive(Debug, Clone, Default)]
pub struct FsRetentionSweeper {
    now: Option<SystemTime>,
}

impl FsRetentionSweeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixes the reference time instead of reading the clock.
    pub fn at(now: SystemTime) -> Self {
        Self { now: Some(now) }
    }

    fn sweep_dir(&self, dir: &Path, cutoff: SystemTime, deleted: &mut usize) -> Result<(), SweepError> {
        let entries = std::fs::read_dir(dir).map_err(|source| SweepError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), "Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Skipping entry without metadata: {}", e);
                    continue;
                }
            };

            if metadata.is_dir() {
                self.sweep_dir(&path, cutoff, deleted)?;
                continue;
            }
            if !metadata.is_file() {
                continue;
            }

            let expired = metadata.modified().map(|m| m < cutoff).unwrap_or(false);
            if !expired {
                continue;
            }

            match std::fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "Deleted expired clip");
                    *deleted += 1;
                }
                Err(e) => tracing::warn!(path = %path.display(), "Failed to delete expired clip: {}", e),
            }
        }

        Ok(())
    }
}

impl RetentionSweeper for FsRetentionSweeper {
    fn purge_older_than(&self, root: &Path, age: Duration) -> Result<usize, SweepError> {
        if !root.exists() {
            tracing::info!(root = %root.display(), "Retention root missing, nothing to delete");
            return Ok(0);
        }

        let now = self.now.unwrap_or_else(SystemTime::now);
        let cutoff = now.checked_sub(age).unwrap_or(SystemTime::UNIX_EPOCH);

        let mut deleted = 0;
        self.sweep_dir(root, cutoff, &mut deleted)?;

        if deleted > 0 {
            tracing::info!(deleted, root = %root.display(), "Deleted old files");
        } else {
            tracing::info!(root = %root.display(), "No old files to delete");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};

    const DAY: Duration = Duration::from_secs(86_400);

    fn touch(path: &Path, age: Duration) {
        let file = File::create(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[test]
    fn test_deletes_only_expired_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("2024");
        fs::create_dir(&nested).unwrap();

        touch(&dir.path().join("old.mjpeg"), 10 * DAY);
        touch(&nested.join("older.mjpeg"), 30 * DAY);
        touch(&dir.path().join("fresh.mjpeg"), DAY);

        let deleted = FsRetentionSweeper::new()
            .purge_older_than(dir.path(), 7 * DAY)
            .unwrap();

        assert_eq!(deleted, 2);
        assert!(dir.path().join("fresh.mjpeg").exists());
        assert!(!nested.join("older.mjpeg").exists());
        assert!(nested.is_dir());
    }

    #[test]
    fn test_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let deleted = FsRetentionSweeper::new()
            .purge_older_than(&dir.path().join("absent"), DAY)
            .unwrap();
        assert_eq!(deleted, 0);
    }

    #[test]
    fn test_fixed_clock() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("clip.mjpeg"), Duration::ZERO);

        let future = SystemTime::now() + 8 * DAY;
        let deleted = FsRetentionSweeper::at(future)
            .purge_older_than(dir.path(), 7 * DAY)
            .unwrap();
        assert_eq!(deleted, 1);
    }
}
