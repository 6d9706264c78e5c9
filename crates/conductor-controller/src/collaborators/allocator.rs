//! Local container allocation from a fixed pool.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use conductor_core::identity::{AttemptId, ContainerId};
use thiserror::Error;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use super::ContainerAllocator;

/// A request for task containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerRequest {
    /// Number of containers wanted.
    pub count: usize,
    /// Memory per container, in megabytes. A hint for placement; the local
    /// pool does not enforce it.
    pub memory_mb: u64,
}

/// One granted container.
///
/// Dropping an allocation returns its slot to the pool that granted it.
pub struct Allocation {
    /// Identity of the granted container.
    pub container: ContainerId,
    /// Host the container runs on.
    pub host: String,
    /// Pool slot held for the lifetime of the allocation.
    _slot: Option<OwnedSemaphorePermit>,
}

impl fmt::Debug for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocation")
            .field("container", &self.container)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

/// Errors raised by container allocation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllocatorError {
    /// The request can never be satisfied by this allocator.
    #[error("requested {requested} containers but the pool only has {pool_size} slots")]
    RequestExceedsPool {
        /// Containers requested.
        requested: usize,
        /// Total pool capacity.
        pool_size: usize,
    },

    /// The allocator was shut down while requests were outstanding.
    #[error("allocator is shut down")]
    Shutdown,
}

/// Serves allocations from a fixed local pool (single-host mode).
///
/// Requests larger than the pool are rejected outright; otherwise
/// allocations stream out as slots free up, which is the same
/// consume-as-available shape the cluster-manager-backed allocator has.
pub struct StaticPoolAllocator {
    attempt: AttemptId,
    host: String,
    pool: Arc<Semaphore>,
    pool_size: usize,
    next_index: AtomicU64,
}

impl StaticPoolAllocator {
    /// Create a pool of `pool_size` container slots on `host`.
    ///
    /// Container indices continue from the controller's own container,
    /// which always occupies index 1.
    #[must_use]
    pub fn new(attempt: AttemptId, host: impl Into<String>, pool_size: usize) -> Self {
        Self {
            attempt,
            host: host.into(),
            pool: Arc::new(Semaphore::new(pool_size)),
            pool_size,
            next_index: AtomicU64::new(2),
        }
    }

    /// Slots currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.pool.available_permits()
    }
}

#[async_trait]
impl ContainerAllocator for StaticPoolAllocator {
    async fn request_containers(
        &self,
        request: ContainerRequest,
    ) -> Result<mpsc::Receiver<Allocation>, AllocatorError> {
        if request.count > self.pool_size {
            return Err(AllocatorError::RequestExceedsPool {
                requested: request.count,
                pool_size: self.pool_size,
            });
        }

        let (tx, rx) = mpsc::channel(request.count.max(1));
        let pool = Arc::clone(&self.pool);
        let attempt = self.attempt;
        let host = self.host.clone();
        let first_index = self
            .next_index
            .fetch_add(request.count as u64, Ordering::Relaxed);

        tokio::spawn(async move {
            for offset in 0..request.count as u64 {
                let Ok(slot) = Arc::clone(&pool).acquire_owned().await else {
                    // Pool closed during shutdown; the receiver sees the
                    // channel close early.
                    return;
                };
                let allocation = Allocation {
                    container: ContainerId {
                        attempt,
                        index: first_index + offset,
                    },
                    host: host.clone(),
                    _slot: Some(slot),
                };
                debug!(container = %allocation.container, "granted container from local pool");
                if tx.send(allocation).await.is_err() {
                    return;
                }
            }
        });

        Ok(rx)
    }
}
