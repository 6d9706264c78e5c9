//! Controller lifecycle: recovery first, then startup.
//!
//! A controller attempt must not execute or commit anything until it knows
//! what every prior attempt of the same job did. The lifecycle therefore
//! runs in two strictly ordered phases:
//!
//! 1. **Recovery** ([`JobController::recover`]) — synchronous, before any
//!    collaborator exists. Derives the staging area, inspects the commit
//!    markers, and on any committed-or-ambiguous outcome forces the matching
//!    terminal job state, sets the error-shutdown flag, and returns the
//!    typed recovery error. The hosting process is expected to catch that
//!    error; it is the normal signal that the job's outcome was already
//!    determined, not a crash.
//! 2. **Startup** ([`JobController::start`]) — only reached when recovery
//!    says no prior attempt got as far as committing. Constructs the
//!    collaborators through the injected factory, walks the job through
//!    setup into running, and spawns the heartbeat loop.
//!
//! Because recovery completes before any event source is constructed, the
//! privileged [`force`](conductor_core::job::JobStateMachine::force) path
//! and the event-driven path can never race.

use std::sync::Arc;

use conductor_core::config::{ConfigError, ControllerConfig};
use conductor_core::identity::{AttemptId, ContainerId};
use conductor_core::job::{JobEvent, JobState, JobStateError, JobStateMachine};
use conductor_core::recovery::{self, RecoveryError, RecoveryOutcome};
use conductor_core::retry::RetryContext;
use conductor_core::staging::StagingArea;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::collaborators::{
    spawn_heartbeat_loop, status_channel, Collaborators, IntervalHeartbeat, JobStatus,
    StaticPoolAllocator, StatusService,
};
use crate::commit::{CommitError, CommitEvent, MarkerCommitDispatcher, NullOutputCommitter};

/// Everything the cluster manager tells a controller attempt about itself
/// at launch time. Immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct LaunchContext {
    /// Identity of this attempt.
    pub attempt_id: AttemptId,
    /// The container this controller itself runs in.
    pub container_id: ContainerId,
    /// Host the controller was placed on.
    pub host: String,
    /// Controller RPC port, if one was assigned.
    pub port: Option<u16>,
    /// Controller HTTP status port, if one was assigned.
    pub http_port: Option<u16>,
    /// When the job was submitted, milliseconds since the epoch.
    pub submit_time_ms: u64,
    /// Maximum attempts the cluster manager will launch for this job.
    pub max_attempts: u32,
}

/// What a collaborator factory gets to build from.
#[derive(Debug, Clone)]
pub struct CollaboratorContext {
    /// Identity of this attempt.
    pub attempt: AttemptId,
    /// Host the controller runs on.
    pub host: String,
    /// The job's staging area (markers live here).
    pub staging: StagingArea,
    /// Configured local allocator pool size.
    pub allocator_pool_size: usize,
}

/// Builds the collaborator set once recovery allows startup to proceed.
///
/// Production wiring and test doubles meet the lifecycle at this seam; the
/// lifecycle never names a concrete collaborator type.
pub type CollaboratorFactory = Box<dyn FnOnce(&CollaboratorContext) -> Collaborators + Send>;

/// Errors surfaced by the controller lifecycle.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ControllerError {
    /// Recovery determined this attempt must not proceed (or could not
    /// determine anything at all). The forced job state was set before
    /// this was returned.
    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    /// Configuration was rejected before recovery ran.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The job state machine rejected a lifecycle transition.
    #[error(transparent)]
    State(#[from] JobStateError),

    /// A commit-phase operation failed during startup or shutdown.
    #[error(transparent)]
    Commit(#[from] CommitError),

    /// [`JobController::start`] was called before recovery ran.
    #[error("controller started before recovery completed")]
    StartedBeforeRecovery,

    /// [`JobController::start`] was called twice.
    #[error("controller was already started")]
    AlreadyStarted,
}

/// The per-job controller.
///
/// Owns the job state machine for the lifetime of this process, the
/// error-shutdown flag the hosting process consults at exit, and the
/// collaborators once startup constructs them.
pub struct JobController {
    launch: LaunchContext,
    config: ControllerConfig,
    state: JobStateMachine,
    staging: Option<StagingArea>,
    factory: Option<CollaboratorFactory>,
    collaborators: Option<Collaborators>,
    heartbeat_task: Option<JoinHandle<()>>,
    error_shutdown: bool,
    status_tx: watch::Sender<JobStatus>,
    status: StatusService,
}

impl JobController {
    /// Create a controller for one launched attempt.
    ///
    /// Nothing is inspected or constructed yet; that happens in
    /// [`recover`](Self::recover) and [`start`](Self::start).
    #[must_use]
    pub fn new(
        launch: LaunchContext,
        config: ControllerConfig,
        factory: CollaboratorFactory,
    ) -> Self {
        let (status_tx, status) = status_channel(JobStatus {
            job_id: launch.attempt_id.job.to_string(),
            attempt_ordinal: launch.attempt_id.ordinal,
            state: JobState::New,
            forced_by_recovery: false,
        });
        Self {
            launch,
            config,
            state: JobStateMachine::new(),
            staging: None,
            factory: Some(factory),
            collaborators: None,
            heartbeat_task: None,
            error_shutdown: false,
            status_tx,
            status,
        }
    }

    /// Current job state.
    #[must_use]
    pub fn state(&self) -> JobState {
        self.state.state()
    }

    /// The state recovery forced, if recovery forced one.
    #[must_use]
    pub fn forced_state(&self) -> Option<JobState> {
        self.state.was_forced().then(|| self.state.state())
    }

    /// Whether shutdown was triggered by an error rather than a clean stop.
    ///
    /// The hosting process reads this at exit to choose its behavior; in
    /// particular, an attempt whose outcome was already determined must not
    /// be retried just because it exited abnormally.
    #[must_use]
    pub const fn error_triggered_shutdown(&self) -> bool {
        self.error_shutdown
    }

    /// The staging area derived during recovery.
    #[must_use]
    pub fn staging_area(&self) -> Option<&StagingArea> {
        self.staging.as_ref()
    }

    /// Read-only status service for external callers.
    #[must_use]
    pub fn client_service(&self) -> StatusService {
        self.status.clone()
    }

    /// Collaborators, once [`start`](Self::start) has constructed them.
    #[must_use]
    pub fn collaborators(&self) -> Option<&Collaborators> {
        self.collaborators.as_ref()
    }

    /// Retry context for this attempt.
    #[must_use]
    pub const fn retry_context(&self) -> RetryContext {
        RetryContext::new(self.launch.attempt_id.ordinal, self.launch.max_attempts)
    }

    /// Whether the hosting process should expect no further attempts.
    #[must_use]
    pub const fn is_last_attempt(&self) -> bool {
        self.retry_context().is_last_attempt()
    }

    /// Phase one: determine what any prior attempt did, and stop here if
    /// the job's outcome is already decided.
    ///
    /// Synchronous on purpose: no collaborator may exist until this has
    /// completed, and the marker reads may block on the shared filesystem
    /// for as long as they need to (any startup timeout is imposed by the
    /// hosting process, not here). Read-only, so an externally aborted
    /// recovery can simply be re-run.
    ///
    /// # Errors
    ///
    /// Returns the typed recovery error for every forced-terminal outcome;
    /// the forced state and the error-shutdown flag are always set before
    /// the error is returned.
    pub fn recover(&mut self) -> Result<(), ControllerError> {
        let staging = StagingArea::for_job(
            &self.config.staging_root,
            &self.config.user,
            self.launch.attempt_id.job,
        );
        info!(
            attempt = %self.launch.attempt_id,
            job_dir = %staging.job_dir().display(),
            "recovering prior attempt outcome"
        );
        self.staging = Some(staging.clone());

        let outcome = match recovery::inspect(&staging) {
            Ok(outcome) => outcome,
            Err(err) => {
                // Inspection itself failed; nothing is known about the
                // prior attempt, which is exactly as bad as an ambiguous
                // one.
                self.force_terminal(JobState::Error);
                return Err(err.into());
            }
        };

        match outcome.forced_state() {
            None => {
                info!("no prior attempt reached the commit phase; proceeding to startup");
                Ok(())
            }
            Some(forced) => {
                warn!(
                    ?outcome,
                    %forced,
                    "prior attempt outcome recovered; this attempt will not proceed"
                );
                self.force_terminal(forced);
                Err(Self::recovery_error(outcome, &staging).into())
            }
        }
    }

    /// Phase two: construct collaborators and take the job to running.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::StartedBeforeRecovery`] when called out
    /// of order, [`ControllerError::AlreadyStarted`] on a second call, and
    /// propagates setup failures from the commit handler.
    pub async fn start(&mut self) -> Result<(), ControllerError> {
        let Some(staging) = self.staging.clone() else {
            return Err(ControllerError::StartedBeforeRecovery);
        };
        let factory = self.factory.take().ok_or(ControllerError::AlreadyStarted)?;

        let ctx = CollaboratorContext {
            attempt: self.launch.attempt_id,
            host: self.launch.host.clone(),
            staging,
            allocator_pool_size: self.config.allocator_pool_size,
        };
        let collaborators = factory(&ctx);

        self.apply_event(JobEvent::Init)?;
        collaborators.commit_handler.handle(CommitEvent::JobSetup).await?;
        self.apply_event(JobEvent::SetupCompleted)?;

        self.heartbeat_task = Some(spawn_heartbeat_loop(
            Arc::clone(&collaborators.heartbeat),
            self.config.heartbeat_interval,
        ));
        self.collaborators = Some(collaborators);

        info!(
            attempt = %self.launch.attempt_id,
            host = %self.launch.host,
            "controller is running"
        );
        Ok(())
    }

    /// Recovery followed by startup, as one call.
    ///
    /// # Errors
    ///
    /// See [`recover`](Self::recover) and [`start`](Self::start).
    pub async fn recover_and_start(&mut self) -> Result<(), ControllerError> {
        self.recover()?;
        self.start().await
    }

    /// Commit the job's final output. Called by the hosting process once
    /// all tasks have completed.
    ///
    /// # Errors
    ///
    /// Propagates commit failures; the job state reflects the failed
    /// commit before the error is returned.
    pub async fn commit(&mut self) -> Result<(), ControllerError> {
        let Some(collaborators) = self.collaborators.as_ref() else {
            return Err(ControllerError::StartedBeforeRecovery);
        };
        let commit_handler = Arc::clone(&collaborators.commit_handler);

        self.apply_event(JobEvent::StartCommit)?;
        match commit_handler.handle(CommitEvent::JobCommit).await {
            Ok(()) => {
                self.apply_event(JobEvent::CommitCompleted)?;
                Ok(())
            }
            Err(err) => {
                self.error_shutdown = true;
                self.apply_event(JobEvent::CommitFailed)?;
                Err(err.into())
            }
        }
    }

    /// Stop the controller on an external kill request.
    ///
    /// Aborts uncommitted output, kills the job state, and stops the
    /// heartbeat loop. A kill is a clean shutdown, not an error one.
    pub async fn shutdown(&mut self) {
        if !self.state().is_terminal() {
            if let Err(err) = self.apply_event(JobEvent::Kill) {
                warn!(error = %err, "kill event rejected during shutdown");
            }
            if let Some(collaborators) = self.collaborators.as_ref() {
                if let Err(err) = collaborators.commit_handler.handle(CommitEvent::JobAbort).await
                {
                    warn!(error = %err, "output abort failed during shutdown");
                }
            }
        }
        self.stop();
    }

    /// Stop background tasks without touching job state.
    pub fn stop(&mut self) {
        if let Some(task) = self.heartbeat_task.take() {
            task.abort();
        }
    }

    fn force_terminal(&mut self, state: JobState) {
        self.state.force(state);
        self.error_shutdown = true;
        self.publish_status();
    }

    fn apply_event(&mut self, event: JobEvent) -> Result<JobState, JobStateError> {
        let next = self.state.handle_event(event)?;
        self.publish_status();
        Ok(next)
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(JobStatus {
            job_id: self.launch.attempt_id.job.to_string(),
            attempt_ordinal: self.launch.attempt_id.ordinal,
            state: self.state.state(),
            forced_by_recovery: self.state.was_forced(),
        });
    }

    fn recovery_error(outcome: RecoveryOutcome, staging: &StagingArea) -> RecoveryError {
        match outcome {
            RecoveryOutcome::PriorSucceeded => RecoveryError::AlreadySucceeded,
            RecoveryOutcome::PriorFailed => RecoveryError::AlreadyFailed,
            RecoveryOutcome::AmbiguousPartialCommit => RecoveryError::AmbiguousCommitState,
            RecoveryOutcome::StagingUnavailable => RecoveryError::StagingUnavailable {
                path: staging.user_staging_dir().to_path_buf(),
            },
            // `forced_state` returned Some, so this cannot be reached.
            RecoveryOutcome::NoPriorAttempt => unreachable!("NoPriorAttempt forces no state"),
        }
    }
}

impl Drop for JobController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Validate configuration, then run recovery and startup.
///
/// This is the single entry point the hosting process calls; it either
/// completes startup or returns the typed error the host must catch to
/// learn the forced terminal state.
///
/// # Errors
///
/// Returns [`ControllerError::Config`] for invalid configuration (before
/// recovery runs) and the recovery/startup errors described on
/// [`JobController::recover_and_start`].
pub async fn init_and_start(controller: &mut JobController) -> Result<(), ControllerError> {
    controller.config.validate()?;
    controller.recover_and_start().await
}

/// Production collaborator wiring for single-host operation.
#[must_use]
pub fn production_collaborators() -> CollaboratorFactory {
    Box::new(|ctx: &CollaboratorContext| Collaborators {
        allocator: Arc::new(StaticPoolAllocator::new(
            ctx.attempt,
            ctx.host.clone(),
            ctx.allocator_pool_size,
        )),
        commit_handler: Arc::new(MarkerCommitDispatcher::new(
            ctx.staging.clone(),
            Arc::new(NullOutputCommitter),
        )),
        heartbeat: Arc::new(IntervalHeartbeat::new()),
    })
}
