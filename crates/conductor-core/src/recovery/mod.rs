//! Prior-attempt recovery: the commit marker decision procedure.
//!
//! Before a fresh controller attempt does anything else, it must find out
//! whether an earlier attempt already committed the job's output. The only
//! evidence that survives a controller crash is the set of commit markers in
//! the job's staging area, written in strict start-before-end order by the
//! committing attempt (see [`crate::staging`]).
//!
//! [`inspect`] classifies the marker state into a [`RecoveryOutcome`]:
//!
//! | markers present                | outcome                  |
//! | ------------------------------ | ------------------------ |
//! | user staging dir missing       | `StagingUnavailable`     |
//! | none                           | `NoPriorAttempt`         |
//! | `COMMIT_STARTED` + `SUCCESS`   | `PriorSucceeded`         |
//! | `COMMIT_STARTED` + `FAIL`      | `PriorFailed`            |
//! | `COMMIT_STARTED` alone         | `AmbiguousPartialCommit` |
//!
//! A start marker without an end marker means the committing process died
//! mid-commit. The real outcome is unknowable from marker state alone:
//! retrying risks a double commit, reporting success risks losing a failed
//! commit. The only safe move is to stop and surface the ambiguity.
//!
//! # Idempotency
//!
//! Inspection is read-only. Re-running it against an unmodified staging
//! area yields the same outcome, so a recovery attempt that is aborted
//! externally can simply be re-run from scratch.

mod error;

use std::io;
use std::path::Path;

use tracing::{info, warn};

pub use error::RecoveryError;

use crate::job::JobState;
use crate::staging::StagingArea;

/// What a prior attempt did to this job, as reconstructed from commit
/// markers. Computed fresh on every controller startup, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// No attempt ever reached the commit phase; proceed normally.
    NoPriorAttempt,
    /// A prior attempt committed the output successfully.
    PriorSucceeded,
    /// A prior attempt committed a failure outcome.
    PriorFailed,
    /// A prior attempt started committing and died before recording the
    /// outcome. Unresolvable without operator attention.
    AmbiguousPartialCommit,
    /// The user's staging directory itself is missing; the coordination
    /// medium is gone.
    StagingUnavailable,
}

impl RecoveryOutcome {
    /// The terminal state the controller must force for this outcome, or
    /// `None` when startup should proceed normally.
    #[must_use]
    pub const fn forced_state(self) -> Option<JobState> {
        match self {
            Self::NoPriorAttempt => None,
            Self::PriorSucceeded => Some(JobState::Succeeded),
            Self::PriorFailed => Some(JobState::Failed),
            Self::AmbiguousPartialCommit | Self::StagingUnavailable => Some(JobState::Error),
        }
    }
}

/// Classify the commit marker state of `area`.
///
/// Read-only and idempotent; never mutates the staging area.
///
/// # Errors
///
/// Returns [`RecoveryError::Io`] when the filesystem cannot be queried.
/// Marker combinations that require the controller to stop are *outcomes*,
/// not errors; mapping them to errors is the lifecycle's job.
pub fn inspect(area: &StagingArea) -> Result<RecoveryOutcome, RecoveryError> {
    if !path_exists(area.user_staging_dir())? {
        warn!(
            dir = %area.user_staging_dir().display(),
            "user staging directory is missing"
        );
        return Ok(RecoveryOutcome::StagingUnavailable);
    }

    if !path_exists(&area.commit_started_file())? {
        return Ok(RecoveryOutcome::NoPriorAttempt);
    }

    let outcome = if path_exists(&area.commit_success_file())? {
        RecoveryOutcome::PriorSucceeded
    } else if path_exists(&area.commit_fail_file())? {
        RecoveryOutcome::PriorFailed
    } else {
        RecoveryOutcome::AmbiguousPartialCommit
    };

    info!(
        job_dir = %area.job_dir().display(),
        ?outcome,
        "prior attempt reached the commit phase"
    );
    Ok(outcome)
}

fn path_exists(path: &Path) -> Result<bool, RecoveryError> {
    match std::fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(RecoveryError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
