//! Job states, lifecycle events, and the transition machinery.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use super::error::JobStateError;

/// Internal lifecycle state of the job owned by this controller process.
///
/// Rendered in SCREAMING_CASE in logs and status responses, which is the
/// form operators see in the cluster manager UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Created, no setup performed yet.
    New,
    /// Output setup in progress.
    Setup,
    /// Tasks executing.
    Running,
    /// Final output commit in progress.
    Committing,
    /// Output committed successfully. Terminal.
    Succeeded,
    /// Job failed (task failures or a failed commit). Terminal.
    Failed,
    /// Killed on external request. Terminal.
    Killed,
    /// Unrecoverable internal error. Terminal.
    Error,
    /// The cluster manager ordered this attempt to stand down so a fresh
    /// attempt can be launched. Terminal for this process.
    Reboot,
}

impl JobState {
    /// Whether the state has no outgoing transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Killed | Self::Error | Self::Reboot
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::New => "NEW",
            Self::Setup => "SETUP",
            Self::Running => "RUNNING",
            Self::Committing => "COMMITTING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Killed => "KILLED",
            Self::Error => "ERROR",
            Self::Reboot => "REBOOT",
        };
        f.write_str(name)
    }
}

/// Lifecycle events that advance the job state during live execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    /// Begin output setup.
    Init,
    /// Output setup finished; tasks may run.
    SetupCompleted,
    /// All tasks finished; final commit is starting.
    StartCommit,
    /// The commit operation reported success.
    CommitCompleted,
    /// The commit operation reported failure.
    CommitFailed,
    /// External kill request.
    Kill,
    /// Unrecoverable internal failure.
    Fatal,
    /// The cluster manager ordered a resync/reboot of this attempt.
    RebootOrdered,
}

impl fmt::Display for JobEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "INIT",
            Self::SetupCompleted => "SETUP_COMPLETED",
            Self::StartCommit => "START_COMMIT",
            Self::CommitCompleted => "COMMIT_COMPLETED",
            Self::CommitFailed => "COMMIT_FAILED",
            Self::Kill => "KILL",
            Self::Fatal => "FATAL",
            Self::RebootOrdered => "REBOOT_ORDERED",
        };
        f.write_str(name)
    }
}

/// Owns the job state for the lifetime of one controller process.
///
/// Two entry points mutate the state:
///
/// - [`handle_event`](Self::handle_event), the normal event-driven path used
///   during live execution, and
/// - [`force`](Self::force), the privileged path used only while recovering
///   a prior attempt's outcome.
///
/// The two must never race; the controller runs recovery to completion
/// before any event source exists, and the machine rejects events after a
/// force to make a violation loud rather than silent.
#[derive(Debug)]
pub struct JobStateMachine {
    state: JobState,
    forced: bool,
}

impl Default for JobStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStateMachine {
    /// Create a state machine in [`JobState::New`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: JobState::New,
            forced: false,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> JobState {
        self.state
    }

    /// Whether the state was set by [`force`](Self::force).
    #[must_use]
    pub const fn was_forced(&self) -> bool {
        self.forced
    }

    /// Advance the state with a lifecycle event.
    ///
    /// # Errors
    ///
    /// Returns [`JobStateError::TransitionNotAllowed`] for an event that is
    /// not legal in the current state, and [`JobStateError::EventAfterForce`]
    /// if the state was previously forced during recovery.
    pub fn handle_event(&mut self, event: JobEvent) -> Result<JobState, JobStateError> {
        if self.forced {
            return Err(JobStateError::EventAfterForce {
                forced: self.state,
                event,
            });
        }

        let next = match (self.state, event) {
            (JobState::New, JobEvent::Init) => JobState::Setup,
            (JobState::Setup, JobEvent::SetupCompleted) => JobState::Running,
            (JobState::Running, JobEvent::StartCommit) => JobState::Committing,
            (JobState::Committing, JobEvent::CommitCompleted) => JobState::Succeeded,
            (JobState::Committing, JobEvent::CommitFailed) => JobState::Failed,
            (from, JobEvent::Kill) if !from.is_terminal() => JobState::Killed,
            (from, JobEvent::Fatal) if !from.is_terminal() => JobState::Error,
            (from, JobEvent::RebootOrdered) if !from.is_terminal() => JobState::Reboot,
            (from, event) => {
                return Err(JobStateError::TransitionNotAllowed { from, event });
            }
        };

        debug!(from = %self.state, %event, to = %next, "job state transition");
        self.state = next;
        Ok(next)
    }

    /// Force the state directly, bypassing the event-driven path.
    ///
    /// Only the recovery sequence calls this, before any event processing
    /// begins. Every subsequent [`handle_event`](Self::handle_event) call
    /// fails, so a misordered startup cannot quietly resurrect a job whose
    /// outcome was already decided by a prior attempt.
    pub fn force(&mut self, state: JobState) {
        debug!(from = %self.state, to = %state, "forcing job state during recovery");
        self.state = state;
        self.forced = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_lifecycle_to_success() {
        let mut sm = JobStateMachine::new();
        assert_eq!(sm.state(), JobState::New);
        assert_eq!(sm.handle_event(JobEvent::Init).unwrap(), JobState::Setup);
        assert_eq!(
            sm.handle_event(JobEvent::SetupCompleted).unwrap(),
            JobState::Running
        );
        assert_eq!(
            sm.handle_event(JobEvent::StartCommit).unwrap(),
            JobState::Committing
        );
        assert_eq!(
            sm.handle_event(JobEvent::CommitCompleted).unwrap(),
            JobState::Succeeded
        );
        assert!(sm.state().is_terminal());
    }

    #[test]
    fn test_commit_failure_path() {
        let mut sm = JobStateMachine::new();
        sm.handle_event(JobEvent::Init).unwrap();
        sm.handle_event(JobEvent::SetupCompleted).unwrap();
        sm.handle_event(JobEvent::StartCommit).unwrap();
        assert_eq!(
            sm.handle_event(JobEvent::CommitFailed).unwrap(),
            JobState::Failed
        );
    }

    #[test]
    fn test_kill_from_any_live_state() {
        for events in [&[][..], &[JobEvent::Init][..]] {
            let mut sm = JobStateMachine::new();
            for e in events {
                sm.handle_event(*e).unwrap();
            }
            assert_eq!(sm.handle_event(JobEvent::Kill).unwrap(), JobState::Killed);
        }
    }

    #[test]
    fn test_reboot_order_stands_down_live_job() {
        let mut sm = JobStateMachine::new();
        sm.handle_event(JobEvent::Init).unwrap();
        sm.handle_event(JobEvent::SetupCompleted).unwrap();
        assert_eq!(
            sm.handle_event(JobEvent::RebootOrdered).unwrap(),
            JobState::Reboot
        );
        assert!(sm.state().is_terminal());
    }

    #[test]
    fn test_terminal_states_reject_events() {
        let mut sm = JobStateMachine::new();
        sm.handle_event(JobEvent::Fatal).unwrap();
        let err = sm.handle_event(JobEvent::Init).unwrap_err();
        assert_eq!(
            err,
            JobStateError::TransitionNotAllowed {
                from: JobState::Error,
                event: JobEvent::Init,
            }
        );
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let mut sm = JobStateMachine::new();
        let err = sm.handle_event(JobEvent::StartCommit).unwrap_err();
        assert_eq!(
            err,
            JobStateError::TransitionNotAllowed {
                from: JobState::New,
                event: JobEvent::StartCommit,
            }
        );
    }

    #[test]
    fn test_force_marks_state_and_blocks_events() {
        let mut sm = JobStateMachine::new();
        sm.force(JobState::Succeeded);
        assert_eq!(sm.state(), JobState::Succeeded);
        assert!(sm.was_forced());
        let err = sm.handle_event(JobEvent::Init).unwrap_err();
        assert_eq!(
            err,
            JobStateError::EventAfterForce {
                forced: JobState::Succeeded,
                event: JobEvent::Init,
            }
        );
    }

    #[test]
    fn test_display_uses_screaming_case() {
        assert_eq!(JobState::Committing.to_string(), "COMMITTING");
        assert_eq!(JobEvent::RebootOrdered.to_string(), "REBOOT_ORDERED");
    }
}
