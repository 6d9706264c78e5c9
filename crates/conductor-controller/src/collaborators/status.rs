//! Read-only job status view for external callers.

use conductor_core::job::JobState;
use serde::Serialize;
use tokio::sync::watch;

use super::ClientService;

/// Externally visible job status snapshot.
///
/// After a recovery that forces a terminal state, this is how downstream
/// status queries see the job's true outcome even though the controller
/// process never reached running state.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    /// Textual job identity.
    pub job_id: String,
    /// 1-based ordinal of this controller attempt.
    pub attempt_ordinal: u32,
    /// Current internal job state.
    pub state: JobState,
    /// Whether the state was forced during recovery rather than reached
    /// through live execution.
    pub forced_by_recovery: bool,
}

/// Watch-backed [`ClientService`] implementation.
///
/// The controller publishes through the sender half; any number of readers
/// can hold the service and see the latest snapshot without locking the
/// controller.
#[derive(Debug, Clone)]
pub struct StatusService {
    rx: watch::Receiver<JobStatus>,
}

impl ClientService for StatusService {
    fn job_status(&self) -> JobStatus {
        self.rx.borrow().clone()
    }
}

/// Create the publishing half and the query service for one job.
#[must_use]
pub fn status_channel(initial: JobStatus) -> (watch::Sender<JobStatus>, StatusService) {
    let (tx, rx) = watch::channel(initial);
    (tx, StatusService { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queries_see_latest_snapshot() {
        let (tx, service) = status_channel(JobStatus {
            job_id: "job_1_0001".to_string(),
            attempt_ordinal: 1,
            state: JobState::New,
            forced_by_recovery: false,
        });
        assert_eq!(service.job_status().state, JobState::New);

        tx.send_modify(|status| status.state = JobState::Running);
        assert_eq!(service.job_status().state, JobState::Running);
    }

    #[test]
    fn test_snapshot_serializes_for_external_callers() {
        let (_tx, service) = status_channel(JobStatus {
            job_id: "job_1_0001".to_string(),
            attempt_ordinal: 2,
            state: JobState::Succeeded,
            forced_by_recovery: true,
        });
        let rendered = serde_json::to_value(service.job_status()).unwrap();
        assert_eq!(rendered["state"], "SUCCEEDED");
        assert_eq!(rendered["forced_by_recovery"], true);
    }
}
