//! Collaborator contracts the controller lifecycle depends on.
//!
//! The lifecycle constructs these through injected factories and talks to
//! them only through the traits here, so integration tests can substitute
//! channel-backed doubles without touching the lifecycle itself. The
//! cluster-manager-backed implementations live outside this repository; the
//! in-tree defaults ([`StaticPoolAllocator`], [`IntervalHeartbeat`],
//! [`StatusService`]) cover single-host operation and are what the binary
//! wires up.
//!
//! The commit-side collaborator contract ([`crate::commit::CommitHandler`])
//! lives with the commit dispatcher.

mod allocator;
mod heartbeat;
mod status;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::mpsc;

pub use allocator::{Allocation, AllocatorError, ContainerRequest, StaticPoolAllocator};
pub use heartbeat::{spawn_heartbeat_loop, IntervalHeartbeat};
pub use status::{status_channel, JobStatus, StatusService};

use crate::commit::CommitHandler;

/// Requests containers for task execution.
///
/// Implementations may suspend for as long as it takes the cluster manager
/// (or the local pool) to find capacity; callers consume allocations as they
/// stream out of the returned channel.
#[async_trait]
pub trait ContainerAllocator: Send + Sync {
    /// Request `request.count` containers. Allocations arrive on the
    /// returned channel as capacity becomes available; the channel closes
    /// once the full request has been served.
    async fn request_containers(
        &self,
        request: ContainerRequest,
    ) -> Result<mpsc::Receiver<Allocation>, AllocatorError>;
}

/// Reports controller liveness on a periodic schedule.
///
/// The schedule is owned by the hosting loop (see
/// [`spawn_heartbeat_loop`]); enforcement of missed heartbeats is the
/// cluster manager's job, not this process's.
pub trait HeartbeatHandler: Send + Sync {
    /// Record one liveness report.
    fn report_liveness(&self);

    /// When liveness was last reported, if ever.
    fn last_liveness_report(&self) -> Option<Instant>;
}

/// Read-only job status queries for external callers.
pub trait ClientService: Send + Sync {
    /// Snapshot of the job's externally visible status.
    fn job_status(&self) -> JobStatus;
}

/// The collaborator set the lifecycle runs with.
///
/// Built by a [`crate::lifecycle::CollaboratorFactory`] after recovery
/// decides this attempt may proceed; never constructed on a forced-terminal
/// path.
pub struct Collaborators {
    /// Container allocation.
    pub allocator: Arc<dyn ContainerAllocator>,
    /// Commit event handling (setup/commit/abort).
    pub commit_handler: Arc<dyn CommitHandler>,
    /// Liveness reporting.
    pub heartbeat: Arc<dyn HeartbeatHandler>,
}
