//! Per-user, per-job staging layout and commit marker files.
//!
//! The staging area is the only state shared between attempts of a job. It
//! lives on the shared filesystem at
//!
//! ```text
//! <staging_root>/<user>/.staging/<job>/
//! ```
//!
//! and holds three sentinel files whose existence (never their content)
//! records commit progress:
//!
//! | marker           | meaning                                        |
//! | ---------------- | ---------------------------------------------- |
//! | `COMMIT_STARTED` | a committing attempt entered the commit phase  |
//! | `COMMIT_SUCCESS` | the commit operation completed successfully    |
//! | `COMMIT_FAIL`    | the commit operation completed with a failure  |
//!
//! The committing attempt writes `COMMIT_STARTED` before the commit
//! operation begins and exactly one end marker after its outcome is known.
//! Marker writes sync both the file and its directory entry before
//! returning, so the start-before-end ordering that recovery relies on is
//! preserved at the storage layer and not just in program order.
//!
//! These filenames are a cross-process contract: recovery in attempt N reads
//! markers written by attempt N-1, possibly on a different host. Do not
//! rename them.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::identity::JobId;

/// Marker recording that a commit operation was started.
pub const COMMIT_STARTED: &str = "COMMIT_STARTED";
/// Marker recording that the commit operation succeeded.
pub const COMMIT_SUCCESS: &str = "COMMIT_SUCCESS";
/// Marker recording that the commit operation failed.
pub const COMMIT_FAIL: &str = "COMMIT_FAIL";

/// Name of the per-user staging subdirectory.
const STAGING_DIR_NAME: &str = ".staging";

/// Derived staging paths for one job. Purely derived from
/// (staging root, user, job id); never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingArea {
    user_staging_dir: PathBuf,
    job_dir: PathBuf,
}

impl StagingArea {
    /// Derive the staging area for a job submitted by `user`.
    #[must_use]
    pub fn for_job(staging_root: &Path, user: &str, job: JobId) -> Self {
        let user_staging_dir = staging_root.join(user).join(STAGING_DIR_NAME);
        let job_dir = user_staging_dir.join(job.to_string());
        Self {
            user_staging_dir,
            job_dir,
        }
    }

    /// The user's staging directory (`<root>/<user>/.staging`).
    #[must_use]
    pub fn user_staging_dir(&self) -> &Path {
        &self.user_staging_dir
    }

    /// The per-job directory holding the commit markers.
    #[must_use]
    pub fn job_dir(&self) -> &Path {
        &self.job_dir
    }

    /// Path of the `COMMIT_STARTED` marker.
    #[must_use]
    pub fn commit_started_file(&self) -> PathBuf {
        self.job_dir.join(COMMIT_STARTED)
    }

    /// Path of the `COMMIT_SUCCESS` marker.
    #[must_use]
    pub fn commit_success_file(&self) -> PathBuf {
        self.job_dir.join(COMMIT_SUCCESS)
    }

    /// Path of the `COMMIT_FAIL` marker.
    #[must_use]
    pub fn commit_fail_file(&self) -> PathBuf {
        self.job_dir.join(COMMIT_FAIL)
    }

    /// Write the `COMMIT_STARTED` marker.
    ///
    /// Must be called before the commit operation begins.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the marker cannot be created or
    /// made durable.
    pub fn mark_commit_started(&self) -> io::Result<()> {
        self.touch(COMMIT_STARTED)
    }

    /// Write the `COMMIT_SUCCESS` marker.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the marker cannot be created or
    /// made durable.
    pub fn mark_commit_succeeded(&self) -> io::Result<()> {
        self.touch(COMMIT_SUCCESS)
    }

    /// Write the `COMMIT_FAIL` marker.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the marker cannot be created or
    /// made durable.
    pub fn mark_commit_failed(&self) -> io::Result<()> {
        self.touch(COMMIT_FAIL)
    }

    /// Create an empty marker file and sync it and its directory entry.
    fn touch(&self, name: &str) -> io::Result<()> {
        fs::create_dir_all(&self.job_dir)?;
        let path = self.job_dir.join(name);
        let file = File::create(&path)?;
        file.sync_all()?;
        // Sync the directory so the new entry itself is durable before the
        // caller observes the marker as written.
        File::open(&self.job_dir)?.sync_all()?;
        debug!(marker = name, path = %path.display(), "wrote commit marker");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn job() -> JobId {
        "job_1317529182569_0004".parse().unwrap()
    }

    #[test]
    fn test_paths_derive_from_root_user_and_job() {
        let area = StagingArea::for_job(Path::new("/srv/staging"), "alice", job());
        assert_eq!(
            area.user_staging_dir(),
            Path::new("/srv/staging/alice/.staging")
        );
        assert_eq!(
            area.job_dir(),
            Path::new("/srv/staging/alice/.staging/job_1317529182569_0004")
        );
    }

    #[test]
    fn test_different_users_get_disjoint_areas() {
        let a = StagingArea::for_job(Path::new("/srv/staging"), "alice", job());
        let b = StagingArea::for_job(Path::new("/srv/staging"), "bob", job());
        assert_ne!(a.job_dir(), b.job_dir());
    }

    #[test]
    fn test_marker_filenames_are_stable() {
        let area = StagingArea::for_job(Path::new("/s"), "u", job());
        assert!(area.commit_started_file().ends_with("COMMIT_STARTED"));
        assert!(area.commit_success_file().ends_with("COMMIT_SUCCESS"));
        assert!(area.commit_fail_file().ends_with("COMMIT_FAIL"));
    }

    #[test]
    fn test_markers_are_created_on_disk() {
        let root = TempDir::new().unwrap();
        let area = StagingArea::for_job(root.path(), "alice", job());

        area.mark_commit_started().unwrap();
        assert!(area.commit_started_file().exists());
        assert!(!area.commit_success_file().exists());

        area.mark_commit_succeeded().unwrap();
        assert!(area.commit_success_file().exists());
    }
}
