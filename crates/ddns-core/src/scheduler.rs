//! Periodic triggers
//!
//! A [`Scheduler`] runs one job on a fixed period in its own task until it is
//! stopped. Stopping signals the task and waits for it, so once
//! [`Scheduler::stop`] returns the job is not running and will not run again.
//!
//! Ticks that would overlap a slow job are delayed rather than bunched up.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, info, warn};

use crate::auth::{RateLimiter, SessionStore};
use crate::engine::Reconciler;

/// Cadence of the session and rate-limit sweeps
pub const MAINTENANCE_PERIOD: Duration = Duration::from_secs(5 * 60);

/// A running periodic job
#[derive(Debug)]
pub struct Scheduler {
    name: &'static str,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Start running `job` every `period`
    ///
    /// The first run happens one period after start.
    pub fn start<F, Fut>(name: &'static str, period: Duration, job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::start_at(name, Instant::now() + period, period, job)
    }

    /// Start running `job` at `first`, then every `period`
    pub fn start_at<F, Fut>(name: &'static str, first: Instant, period: Duration, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(first, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut ticks = IntervalStream::new(interval);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        debug!("Scheduler {} received stop signal", name);
                        break;
                    }
                    Some(_) = ticks.next() => {
                        job().await;
                    }
                }
            }
        });

        info!("Scheduler {} started (every {}s)", name, period.as_secs());
        Self {
            name,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the job task is still alive
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the job and wait for its task to finish
    ///
    /// A job run in progress completes first. Calling stop twice is harmless.
    pub async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Scheduler {} task ended abnormally: {}", self.name, e);
            }
            info!("Scheduler {} stopped", self.name);
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Reconcile all records every `period`, logging each outcome
///
/// The first pass runs one period after start.
pub fn schedule_reconciliation(reconciler: Arc<Reconciler>, period: Duration) -> Scheduler {
    schedule_reconciliation_at(reconciler, Instant::now() + period, period)
}

/// Reconcile all records at `first`, then every `period`
pub fn schedule_reconciliation_at(
    reconciler: Arc<Reconciler>,
    first: Instant,
    period: Duration,
) -> Scheduler {
    Scheduler::start_at("reconcile", first, period, move || {
        let reconciler = Arc::clone(&reconciler);
        async move {
            let outcomes = reconciler.reconcile_all().await;
            let failed = outcomes.iter().filter(|o| o.is_failure()).count();
            for outcome in &outcomes {
                if outcome.is_failure() {
                    warn!("{}", outcome);
                } else {
                    debug!("{}", outcome);
                }
            }
            info!(
                "Scheduled pass finished: {} outcomes, {} failed",
                outcomes.len(),
                failed
            );
        }
    })
}

/// Sweep expired sessions and idle login windows every `period`
pub fn schedule_maintenance(
    sessions: SessionStore,
    limiter: RateLimiter,
    period: Duration,
) -> Scheduler {
    Scheduler::start("maintenance", period, move || {
        let sessions = sessions.clone();
        let limiter = limiter.clone();
        async move {
            let expired = sessions.sweep();
            let idle = limiter.sweep();
            if expired > 0 || idle > 0 {
                debug!(
                    "Swept {} expired sessions and {} idle login windows",
                    expired, idle
                );
            }
        }
    })
}
