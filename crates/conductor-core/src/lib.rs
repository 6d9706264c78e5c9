//! Core types for the conductor per-job controller.
//!
//! A conductor job runs under a per-job controller process launched by the
//! cluster manager. Controller processes can crash or be killed at any point,
//! including in the middle of committing the job's final output. This crate
//! holds the pieces of that story that must be exactly right:
//!
//! - [`identity`]: typed job/attempt/container identifiers with the textual
//!   forms the cluster manager hands to the launch context
//! - [`job`]: the job's internal lifecycle state machine, including the
//!   privileged force path used only during recovery
//! - [`staging`]: the per-user, per-job staging layout and the commit marker
//!   files used to coordinate across attempts
//! - [`recovery`]: the read-only decision procedure that classifies what a
//!   prior attempt did, and the error taxonomy raised when startup must stop
//! - [`retry`]: the last-attempt policy consulted by the hosting process
//! - [`config`]: the controller configuration surface
//!
//! # Coordination model
//!
//! Attempts of the same job never share memory; the only state that survives
//! a controller crash is the staging directory on the shared filesystem. The
//! commit markers under it are written in strict order (start before either
//! end marker) by the committing attempt, so a later attempt can always
//! reconstruct how far the commit got by looking at which markers exist.

pub mod config;
pub mod identity;
pub mod job;
pub mod recovery;
pub mod retry;
pub mod staging;

pub use config::{ConfigError, ControllerConfig};
pub use identity::{AttemptId, ContainerId, IdentityError, JobId};
pub use job::{JobEvent, JobState, JobStateError, JobStateMachine};
pub use recovery::{inspect, RecoveryError, RecoveryOutcome};
pub use retry::RetryContext;
pub use staging::StagingArea;
