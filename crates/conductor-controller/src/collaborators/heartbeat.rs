//! Liveness reporting on a periodic schedule.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::trace;

use super::HeartbeatHandler;

/// Default heartbeat handler: records when liveness was last reported.
///
/// Transmitting the report to the cluster manager is outside this process's
/// scope; the recorded timestamps are what local watchdogs and status
/// queries observe.
#[derive(Debug, Default)]
pub struct IntervalHeartbeat {
    last: Mutex<Option<Instant>>,
    reports: AtomicU64,
}

impl IntervalHeartbeat {
    /// Create a handler with no reports recorded yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of liveness reports recorded.
    #[must_use]
    pub fn report_count(&self) -> u64 {
        self.reports.load(Ordering::Relaxed)
    }
}

impl HeartbeatHandler for IntervalHeartbeat {
    fn report_liveness(&self) {
        let now = Instant::now();
        *self.last.lock().expect("heartbeat clock poisoned") = Some(now);
        let count = self.reports.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(count, "reported liveness");
    }

    fn last_liveness_report(&self) -> Option<Instant> {
        *self.last.lock().expect("heartbeat clock poisoned")
    }
}

/// Drive `handler` on a fixed interval until the returned task is aborted.
///
/// The first report fires immediately so a freshly started controller is
/// never observed without a liveness timestamp.
pub fn spawn_heartbeat_loop(
    handler: Arc<dyn HeartbeatHandler>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            handler.report_liveness();
        }
    })
}
