//! Commit event dispatch and the writer side of the marker protocol.
//!
//! All commit-phase work for the job funnels through one
//! [`MarkerCommitDispatcher`], which serializes events and brackets the
//! actual commit operation with the staging markers in strict order:
//!
//! 1. `COMMIT_STARTED` is durable before the commit operation begins
//! 2. exactly one of `COMMIT_SUCCESS` / `COMMIT_FAIL` is written once the
//!    operation's outcome is known
//!
//! That ordering is what makes recovery's reasoning sound: a start marker
//! with no end marker can only mean the dispatching process died mid-commit
//! (see [`conductor_core::recovery`]).
//!
//! The commit operation itself is job-format specific and injected as an
//! [`OutputCommitter`]; the dispatcher owns *when* and *whether* it runs,
//! never *what* it does.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use conductor_core::staging::StagingArea;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Commit-phase events the lifecycle hands to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitEvent {
    /// Prepare the job's output location before tasks run.
    JobSetup,
    /// Commit the job's final output.
    JobCommit,
    /// Tear down without committing (kill or failure before the commit
    /// phase). Leaves no markers, so a later attempt starts clean.
    JobAbort,
}

/// Errors raised by commit event handling.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CommitError {
    /// A second commit was requested for the same job.
    ///
    /// At most one commit operation may ever start per controller process;
    /// a retry of a failed commit is a new attempt's decision, made through
    /// recovery, not a loop inside this one.
    #[error("a commit was already dispatched for this job")]
    CommitAlreadyDispatched,

    /// A commit marker could not be written durably.
    #[error("failed to write {marker} marker")]
    Marker {
        /// Which marker failed.
        marker: &'static str,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The output committer's setup operation failed.
    #[error("output setup failed")]
    Setup {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The commit operation itself failed. The `COMMIT_FAIL` marker was
    /// written before this was returned.
    #[error("commit operation failed")]
    Commit {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The abort operation failed.
    #[error("output abort failed")]
    Abort {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Handles commit-phase events for the job.
#[async_trait]
pub trait CommitHandler: Send + Sync {
    /// Process one commit event. Implementations guarantee at most one
    /// in-flight commit operation per job.
    async fn handle(&self, event: CommitEvent) -> Result<(), CommitError>;
}

/// Job-format-specific output operations, injected into the dispatcher.
#[async_trait]
pub trait OutputCommitter: Send + Sync {
    /// Prepare the output location before tasks run.
    async fn setup_job(&self) -> io::Result<()>;
    /// Promote the job's output to its final location.
    async fn commit_job(&self) -> io::Result<()>;
    /// Discard uncommitted output.
    async fn abort_job(&self) -> io::Result<()>;
}

/// Committer whose output needs no promotion step.
///
/// Used in single-host mode where tasks write directly to their final
/// location; every operation succeeds without touching the filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOutputCommitter;

#[async_trait]
impl OutputCommitter for NullOutputCommitter {
    async fn setup_job(&self) -> io::Result<()> {
        Ok(())
    }

    async fn commit_job(&self) -> io::Result<()> {
        Ok(())
    }

    async fn abort_job(&self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct DispatchState {
    commit_dispatched: bool,
}

/// The production [`CommitHandler`]: serializes commit events and writes
/// the staging markers around the injected committer.
pub struct MarkerCommitDispatcher {
    staging: StagingArea,
    committer: Arc<dyn OutputCommitter>,
    // Held across the committer calls so commit-phase work is serialized
    // structurally rather than by caller discipline.
    state: Mutex<DispatchState>,
}

impl MarkerCommitDispatcher {
    /// Create a dispatcher writing markers under `staging`.
    #[must_use]
    pub fn new(staging: StagingArea, committer: Arc<dyn OutputCommitter>) -> Self {
        Self {
            staging,
            committer,
            state: Mutex::new(DispatchState::default()),
        }
    }

    async fn commit_job(&self) -> Result<(), CommitError> {
        let mut state = self.state.lock().await;
        if state.commit_dispatched {
            return Err(CommitError::CommitAlreadyDispatched);
        }
        state.commit_dispatched = true;

        self.staging
            .mark_commit_started()
            .map_err(|source| CommitError::Marker {
                marker: conductor_core::staging::COMMIT_STARTED,
                source,
            })?;

        match self.committer.commit_job().await {
            Ok(()) => {
                self.staging
                    .mark_commit_succeeded()
                    .map_err(|source| CommitError::Marker {
                        marker: conductor_core::staging::COMMIT_SUCCESS,
                        source,
                    })?;
                info!(job_dir = %self.staging.job_dir().display(), "job output committed");
                Ok(())
            }
            Err(source) => {
                // The failure outcome must be durable before it is
                // reported; otherwise a crash right here would leave the
                // next attempt staring at an ambiguous start marker.
                self.staging
                    .mark_commit_failed()
                    .map_err(|marker_err| CommitError::Marker {
                        marker: conductor_core::staging::COMMIT_FAIL,
                        source: marker_err,
                    })?;
                error!(error = %source, "commit operation failed");
                Err(CommitError::Commit { source })
            }
        }
    }
}

#[async_trait]
impl CommitHandler for MarkerCommitDispatcher {
    async fn handle(&self, event: CommitEvent) -> Result<(), CommitError> {
        debug!(?event, "dispatching commit event");
        match event {
            CommitEvent::JobSetup => {
                let _state = self.state.lock().await;
                self.committer
                    .setup_job()
                    .await
                    .map_err(|source| CommitError::Setup { source })
            }
            CommitEvent::JobCommit => self.commit_job().await,
            CommitEvent::JobAbort => {
                let _state = self.state.lock().await;
                self.committer
                    .abort_job()
                    .await
                    .map_err(|source| CommitError::Abort { source })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    struct FailingCommitter;

    #[async_trait]
    impl OutputCommitter for FailingCommitter {
        async fn setup_job(&self) -> io::Result<()> {
            Ok(())
        }

        async fn commit_job(&self) -> io::Result<()> {
            Err(io::Error::other("output store rejected the rename"))
        }

        async fn abort_job(&self) -> io::Result<()> {
            Ok(())
        }
    }

    fn staging_in(root: &TempDir) -> StagingArea {
        let job = "job_1317529182569_0004".parse().unwrap();
        let area = StagingArea::for_job(root.path(), "alice", job);
        std::fs::create_dir_all(area.user_staging_dir()).unwrap();
        area
    }

    #[tokio::test]
    async fn test_successful_commit_writes_start_then_success() {
        let root = TempDir::new().unwrap();
        let staging = staging_in(&root);
        let dispatcher =
            MarkerCommitDispatcher::new(staging.clone(), Arc::new(NullOutputCommitter));

        dispatcher.handle(CommitEvent::JobCommit).await.unwrap();

        assert!(staging.commit_started_file().exists());
        assert!(staging.commit_success_file().exists());
        assert!(!staging.commit_fail_file().exists());
    }

    #[tokio::test]
    async fn test_failed_commit_writes_fail_marker_and_errors() {
        let root = TempDir::new().unwrap();
        let staging = staging_in(&root);
        let dispatcher = MarkerCommitDispatcher::new(staging.clone(), Arc::new(FailingCommitter));

        let err = dispatcher.handle(CommitEvent::JobCommit).await.unwrap_err();
        assert!(matches!(err, CommitError::Commit { .. }));

        assert!(staging.commit_started_file().exists());
        assert!(staging.commit_fail_file().exists());
        assert!(!staging.commit_success_file().exists());
    }

    #[tokio::test]
    async fn test_second_commit_rejected() {
        let root = TempDir::new().unwrap();
        let staging = staging_in(&root);
        let dispatcher = MarkerCommitDispatcher::new(staging, Arc::new(NullOutputCommitter));

        dispatcher.handle(CommitEvent::JobCommit).await.unwrap();
        let err = dispatcher.handle(CommitEvent::JobCommit).await.unwrap_err();
        assert!(matches!(err, CommitError::CommitAlreadyDispatched));
    }

    #[tokio::test]
    async fn test_setup_and_abort_leave_no_markers() {
        let root = TempDir::new().unwrap();
        let staging = staging_in(&root);
        let dispatcher =
            MarkerCommitDispatcher::new(staging.clone(), Arc::new(NullOutputCommitter));

        dispatcher.handle(CommitEvent::JobSetup).await.unwrap();
        dispatcher.handle(CommitEvent::JobAbort).await.unwrap();

        assert!(!staging.commit_started_file().exists());
        assert!(!staging.commit_success_file().exists());
        assert!(!staging.commit_fail_file().exists());
    }
}
