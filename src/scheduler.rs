//! Periodic and on-demand sweep triggering.
//!
//! At most one sweep runs at a time. A trigger that arrives while a sweep is
//! in flight is dropped rather than queued. Within a process the scheduler's
//! running flag decides; across processes sharing a store, the store's sweep
//! lease does. The lease is renewed while the sweep runs and expires on its
//! own if the holder dies.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::discovery::{DiscoveryEngine, DiscoveryError, SweepReport};

/// Default time between scheduled sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

/// Validity of the sweep lease between renewals.
pub const DEFAULT_SWEEP_LEASE_TTL: Duration = Duration::from_secs(10 * 60);

/// Whether a sweep is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No sweep running; the next trigger starts one.
    Idle,
    /// A sweep is running; triggers are dropped.
    Running,
}

/// Result of a trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    /// The sweep ran to the end (or to cancellation).
    Ran(SweepReport),
    /// Another sweep was already running.
    Skipped,
}

/// Clears the running flag when dropped, including on error or panic.
struct RunningGuard<'a> {
    running: &'a AtomicBool,
}

impl<'a> RunningGuard<'a> {
    fn acquire(running: &'a AtomicBool) -> Option<Self> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { running })
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Drives a [`DiscoveryEngine`] on a timer and on demand.
#[derive(Debug, Clone)]
pub struct TrackerScheduler {
    engine: Arc<DiscoveryEngine>,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
    interval: Duration,
    lease_holder: Arc<str>,
    lease_ttl: Duration,
}

impl TrackerScheduler {
    /// Creates an idle scheduler with the default interval.
    #[must_use]
    pub fn new(engine: Arc<DiscoveryEngine>) -> Self {
        Self {
            engine,
            running: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            interval: DEFAULT_SWEEP_INTERVAL,
            lease_holder: Arc::from(Uuid::new_v4().to_string()),
            lease_ttl: DEFAULT_SWEEP_LEASE_TTL,
        }
    }

    /// Sets the time between scheduled sweeps (at least one millisecond).
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Sets how long the sweep lease stays valid without renewal (at least
    /// one millisecond). It is renewed every third of that while sweeping.
    #[must_use]
    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl.max(Duration::from_millis(1));
        self
    }

    /// Time between scheduled sweeps.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        if self.running.load(Ordering::Acquire) {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    /// Token cancelled by [`Self::shutdown`].
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs one sweep now unless one is already running here or in another
    /// process sharing the store.
    ///
    /// # Errors
    ///
    /// Returns the sweep's [`DiscoveryError`], including a store failure
    /// while taking the lease; the scheduler is idle again afterwards either
    /// way.
    pub async fn run_sweep(&self) -> Result<SweepOutcome, DiscoveryError> {
        let Some(_guard) = RunningGuard::acquire(&self.running) else {
            info!("Sweep already running, trigger dropped");
            return Ok(SweepOutcome::Skipped);
        };
        let store = self.engine.store();
        if !store
            .acquire_sweep_lease(&self.lease_holder, self.lease_ttl)
            .await?
        {
            info!("Another process is sweeping, trigger dropped");
            return Ok(SweepOutcome::Skipped);
        }

        let renewal = self.spawn_lease_renewal();
        let result = self.engine.run_sweep(&self.cancel).await;
        renewal.abort();
        if let Err(error) = store.release_sweep_lease(&self.lease_holder).await {
            warn!(error = %error, "Could not release sweep lease; it will expire");
        }
        Ok(SweepOutcome::Ran(result?))
    }

    fn spawn_lease_renewal(&self) -> JoinHandle<()> {
        let store = Arc::clone(self.engine.store());
        let holder = Arc::clone(&self.lease_holder);
        let ttl = self.lease_ttl;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(ttl / 3).await;
                match store.acquire_sweep_lease(&holder, ttl).await {
                    Ok(true) => debug!("Sweep lease renewed"),
                    Ok(false) => warn!("Sweep lease was taken over by another process"),
                    Err(error) => warn!(error = %error, "Could not renew sweep lease"),
                }
            }
        })
    }

    /// Spawns one sweep without waiting for it.
    pub fn trigger_in_background(&self) -> JoinHandle<Result<SweepOutcome, DiscoveryError>> {
        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.run_sweep().await })
    }

    /// Spawns the timer loop. The first scheduled sweep fires one interval
    /// from now; the loop ends on [`Self::shutdown`].
    pub fn start(&self) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + scheduler.interval, scheduler.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_secs = scheduler.interval.as_secs(), "Tracker scheduler started");

            loop {
                tokio::select! {
                    () = scheduler.cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(error) = scheduler.run_sweep().await {
                            warn!(error = %error, "Scheduled sweep failed");
                        }
                    }
                }
            }
            info!("Tracker scheduler stopped");
        })
    }

    /// Stops the timer loop and cancels any running sweep between lookups.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}
