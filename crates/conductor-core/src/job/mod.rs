//! Job lifecycle state machine.
//!
//! The controller tracks one job, and the job's internal state is advanced by
//! lifecycle events during live execution. Recovery is the single exception:
//! when a prior attempt already determined the job's outcome, the controller
//! forces the terminal state directly without replaying events.
//!
//! # State machine
//!
//! ```text
//! NEW --Init--> SETUP --SetupCompleted--> RUNNING --StartCommit--> COMMITTING
//!                                                                     |
//!                                            CommitCompleted ---------+--------- CommitFailed
//!                                                   v                                  v
//!                                               SUCCEEDED                           FAILED
//!
//! any non-terminal state: --Kill--> KILLED, --Fatal--> ERROR, --RebootOrdered--> REBOOT
//! ```
//!
//! # Invariants
//!
//! - Terminal states have no outgoing transitions.
//! - [`JobStateMachine::force`] is only legal before event processing
//!   begins; the controller guarantees this by running recovery to
//!   completion before any collaborator task starts.

mod error;
mod state;

pub use error::JobStateError;
pub use state::{JobEvent, JobState, JobStateMachine};
