//! Prior-attempt recovery scenarios.
//!
//! Each test stages marker files the way a crashed earlier attempt would
//! have left them, then starts a fresh controller and verifies three things
//! together: the typed error, the forced job state, and the error-shutdown
//! flag. A recovery that produces one without the others is a protocol
//! violation.

mod common;

use common::{config_for, launch_context, prepared_staging, test_collaborators};
use conductor_controller::lifecycle::{init_and_start, ControllerError, JobController};
use conductor_core::job::JobState;
use conductor_core::recovery::{RecoveryError, RecoveryOutcome};
use tempfile::TempDir;

fn controller_for(root: &TempDir) -> JobController {
    let (factory, _commits, _heartbeat) = test_collaborators();
    JobController::new(launch_context(2, 2), config_for(root), factory)
}

#[tokio::test]
async fn start_marker_without_end_marker_is_fatal() {
    let root = TempDir::new().unwrap();
    let staging = prepared_staging(&root);
    staging.mark_commit_started().unwrap();

    let mut controller = controller_for(&root);
    let err = init_and_start(&mut controller).await.unwrap_err();

    let ControllerError::Recovery(recovery) = err else {
        panic!("expected recovery error, got {err:?}");
    };
    assert!(matches!(recovery, RecoveryError::AmbiguousCommitState));
    assert_eq!(
        recovery.outcome(),
        Some(RecoveryOutcome::AmbiguousPartialCommit)
    );
    assert_eq!(controller.forced_state(), Some(JobState::Error));
    assert!(controller.error_triggered_shutdown());
}

#[tokio::test]
async fn success_marker_forces_succeeded() {
    let root = TempDir::new().unwrap();
    let staging = prepared_staging(&root);
    staging.mark_commit_started().unwrap();
    staging.mark_commit_succeeded().unwrap();

    let mut controller = controller_for(&root);
    let err = init_and_start(&mut controller).await.unwrap_err();

    assert!(matches!(
        err,
        ControllerError::Recovery(RecoveryError::AlreadySucceeded)
    ));
    assert_eq!(controller.forced_state(), Some(JobState::Succeeded));
    assert!(controller.error_triggered_shutdown());
}

#[tokio::test]
async fn fail_marker_forces_failed() {
    let root = TempDir::new().unwrap();
    let staging = prepared_staging(&root);
    staging.mark_commit_started().unwrap();
    staging.mark_commit_failed().unwrap();

    let mut controller = controller_for(&root);
    let err = init_and_start(&mut controller).await.unwrap_err();

    assert!(matches!(
        err,
        ControllerError::Recovery(RecoveryError::AlreadyFailed)
    ));
    assert_eq!(controller.forced_state(), Some(JobState::Failed));
    assert!(controller.error_triggered_shutdown());
}

#[tokio::test]
async fn missing_staging_directory_is_fatal() {
    // The staging root exists but the user's staging directory was never
    // created: the coordination medium is gone.
    let root = TempDir::new().unwrap();

    let mut controller = controller_for(&root);
    let err = init_and_start(&mut controller).await.unwrap_err();

    assert!(matches!(
        err,
        ControllerError::Recovery(RecoveryError::StagingUnavailable { .. })
    ));
    assert_eq!(controller.forced_state(), Some(JobState::Error));
    assert!(controller.error_triggered_shutdown());
}

#[tokio::test]
async fn forced_outcome_never_constructs_collaborators() {
    let root = TempDir::new().unwrap();
    let staging = prepared_staging(&root);
    staging.mark_commit_started().unwrap();
    staging.mark_commit_succeeded().unwrap();

    let (factory, commits, heartbeat) = test_collaborators();
    let mut controller = JobController::new(launch_context(2, 2), config_for(&root), factory);
    init_and_start(&mut controller).await.unwrap_err();

    assert!(controller.collaborators().is_none());
    assert!(commits.events().is_empty());
    assert_eq!(heartbeat.report_count(), 0);
}

#[tokio::test]
async fn forced_state_is_visible_to_status_queries() {
    use conductor_controller::collaborators::ClientService;

    let root = TempDir::new().unwrap();
    let staging = prepared_staging(&root);
    staging.mark_commit_started().unwrap();

    let mut controller = controller_for(&root);
    let status = controller.client_service();
    init_and_start(&mut controller).await.unwrap_err();

    let snapshot = status.job_status();
    assert_eq!(snapshot.state, JobState::Error);
    assert!(snapshot.forced_by_recovery);
    assert_eq!(snapshot.attempt_ordinal, 2);
}

#[tokio::test]
async fn recovery_is_repeatable_after_external_abort() {
    // An externally aborted recovery mutates nothing, so a rerun in a new
    // controller must reach the same conclusion.
    let root = TempDir::new().unwrap();
    let staging = prepared_staging(&root);
    staging.mark_commit_started().unwrap();

    for _ in 0..2 {
        let mut controller = controller_for(&root);
        let err = init_and_start(&mut controller).await.unwrap_err();
        assert!(matches!(
            err,
            ControllerError::Recovery(RecoveryError::AmbiguousCommitState)
        ));
        assert_eq!(controller.forced_state(), Some(JobState::Error));
    }
}
