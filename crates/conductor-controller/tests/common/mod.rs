//! Shared helpers for controller integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use conductor_controller::collaborators::{
    Allocation, AllocatorError, Collaborators, ContainerAllocator, ContainerRequest,
    IntervalHeartbeat,
};
use conductor_controller::commit::{CommitError, CommitEvent, CommitHandler};
use conductor_controller::lifecycle::{CollaboratorFactory, LaunchContext};
use conductor_core::config::ControllerConfig;
use conductor_core::identity::JobId;
use conductor_core::staging::StagingArea;
use tempfile::TempDir;
use tokio::sync::mpsc;

pub const TEST_USER: &str = "test-submitter";

/// Job identity shared by every attempt in a test.
pub fn test_job() -> JobId {
    "job_1317529182569_0004".parse().unwrap()
}

/// Launch context for attempt `ordinal` of the test job.
pub fn launch_context(ordinal: u32, max_attempts: u32) -> LaunchContext {
    let attempt = format!("attempt_1317529182569_0004_{ordinal:06}");
    let container = format!("container_1317529182569_0004_{ordinal:06}_000001");
    LaunchContext {
        attempt_id: attempt.parse().unwrap(),
        container_id: container.parse().unwrap(),
        host: "localhost".to_string(),
        port: None,
        http_port: None,
        submit_time_ms: 1_317_529_182_569,
        max_attempts,
    }
}

/// Configuration pointing at a temporary staging root.
pub fn config_for(root: &TempDir) -> ControllerConfig {
    ControllerConfig {
        staging_root: root.path().to_path_buf(),
        user: TEST_USER.to_string(),
        heartbeat_interval: std::time::Duration::from_millis(10),
        ..ControllerConfig::default()
    }
}

/// The staging area a controller with [`config_for`] will derive, with the
/// user staging directory already created.
pub fn prepared_staging(root: &TempDir) -> StagingArea {
    let area = StagingArea::for_job(root.path(), TEST_USER, test_job());
    std::fs::create_dir_all(area.user_staging_dir()).unwrap();
    area
}

/// Allocator double: accepts every request, never delivers a container.
pub struct NullAllocator;

#[async_trait]
impl ContainerAllocator for NullAllocator {
    async fn request_containers(
        &self,
        _request: ContainerRequest,
    ) -> Result<mpsc::Receiver<Allocation>, AllocatorError> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }
}

/// Commit handler double: records every event, succeeds at everything,
/// touches no markers.
#[derive(Default)]
pub struct RecordingCommitHandler {
    events: Mutex<Vec<CommitEvent>>,
}

impl RecordingCommitHandler {
    pub fn events(&self) -> Vec<CommitEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommitHandler for RecordingCommitHandler {
    async fn handle(&self, event: CommitEvent) -> Result<(), CommitError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Collaborator factory built from doubles, returning handles the test can
/// interrogate after the controller has consumed the factory.
pub fn test_collaborators() -> (
    CollaboratorFactory,
    Arc<RecordingCommitHandler>,
    Arc<IntervalHeartbeat>,
) {
    let commit_handler = Arc::new(RecordingCommitHandler::default());
    let heartbeat = Arc::new(IntervalHeartbeat::new());
    let commit_for_factory = Arc::clone(&commit_handler);
    let heartbeat_for_factory = Arc::clone(&heartbeat);
    let factory: CollaboratorFactory = Box::new(move |_ctx| Collaborators {
        allocator: Arc::new(NullAllocator),
        commit_handler: commit_for_factory,
        heartbeat: heartbeat_for_factory,
    });
    (factory, commit_handler, heartbeat)
}
