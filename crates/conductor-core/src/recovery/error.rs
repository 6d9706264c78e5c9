//! Recovery error taxonomy.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::RecoveryOutcome;

/// Errors that stop controller startup during recovery.
///
/// Every variant except [`Io`](Self::Io) corresponds to a
/// [`RecoveryOutcome`] that forbids this attempt from proceeding. The
/// lifecycle always forces the matching terminal job state *before*
/// returning one of these, so the hosting process observes both the state
/// and the error together, never one without the other.
///
/// None of these are retried internally. Whether the job gets another
/// attempt is the hosting process's decision, informed by
/// [`crate::retry::RetryContext`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecoveryError {
    /// A prior attempt committed the output successfully; this attempt must
    /// not re-execute or re-commit the job.
    #[error("prior attempt already committed this job successfully")]
    AlreadySucceeded,

    /// A prior attempt committed a failure outcome; this attempt must not
    /// re-execute the job.
    #[error("prior attempt already committed a failure outcome for this job")]
    AlreadyFailed,

    /// A prior attempt crashed between writing the start marker and an end
    /// marker. The commit outcome is unknowable from marker state; requires
    /// operator attention.
    #[error("prior attempt died mid-commit; commit outcome is unknowable")]
    AmbiguousCommitState,

    /// The user's staging directory is missing, so the coordination medium
    /// across attempts is gone.
    #[error("staging directory is unavailable: {path}")]
    StagingUnavailable {
        /// The missing user staging directory.
        path: PathBuf,
    },

    /// The staging area could not be queried at all.
    #[error("failed to inspect staging area at {path}")]
    Io {
        /// Path whose metadata query failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl RecoveryError {
    /// The recovery outcome this error was raised for, if any.
    ///
    /// [`Io`](Self::Io) carries no outcome: inspection itself failed, so
    /// nothing was determined about the prior attempt.
    #[must_use]
    pub const fn outcome(&self) -> Option<RecoveryOutcome> {
        match self {
            Self::AlreadySucceeded => Some(RecoveryOutcome::PriorSucceeded),
            Self::AlreadyFailed => Some(RecoveryOutcome::PriorFailed),
            Self::AmbiguousCommitState => Some(RecoveryOutcome::AmbiguousPartialCommit),
            Self::StagingUnavailable { .. } => Some(RecoveryOutcome::StagingUnavailable),
            Self::Io { .. } => None,
        }
    }
}
