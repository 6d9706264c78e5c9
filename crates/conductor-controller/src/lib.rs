//! Per-job controller process for the conductor orchestrator.
//!
//! One controller process runs per job attempt. On startup it recovers the
//! outcome of any prior attempt from the job's staging area before anything
//! else happens; only a job with no committed outcome proceeds to construct
//! collaborators and execute. See [`lifecycle::JobController`] for the
//! startup sequence and [`conductor_core::recovery`] for the marker
//! protocol it relies on.
//!
//! The binary in `main.rs` wires production collaborators; everything here
//! is also a library so integration tests can drive the same lifecycle with
//! test doubles injected at the collaborator seam.

pub mod collaborators;
pub mod commit;
pub mod lifecycle;

pub use collaborators::{
    Allocation, AllocatorError, ClientService, Collaborators, ContainerAllocator,
    ContainerRequest, HeartbeatHandler, IntervalHeartbeat, JobStatus, StaticPoolAllocator,
    StatusService,
};
pub use commit::{
    CommitError, CommitEvent, CommitHandler, MarkerCommitDispatcher, NullOutputCommitter,
    OutputCommitter,
};
pub use lifecycle::{
    init_and_start, production_collaborators, CollaboratorContext, CollaboratorFactory,
    ControllerError, JobController, LaunchContext,
};
