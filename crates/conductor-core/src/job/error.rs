//! Job state machine error types.

use thiserror::Error;

use super::state::{JobEvent, JobState};

/// Errors raised by the job state machine.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum JobStateError {
    /// The event is not legal in the current state.
    #[error("event {event} is not legal in state {from}")]
    TransitionNotAllowed {
        /// State the job was in when the event arrived.
        from: JobState,
        /// The rejected event.
        event: JobEvent,
    },

    /// An event arrived after the state had been forced during recovery.
    ///
    /// Forcing a state and processing events are mutually exclusive by the
    /// startup ordering contract; seeing this error means a collaborator was
    /// started before recovery finished.
    #[error("event {event} arrived after state was forced to {forced}")]
    EventAfterForce {
        /// The forced terminal state.
        forced: JobState,
        /// The rejected event.
        event: JobEvent,
    },
}
