//! Fixed-interval scheduler for the broadcast pipeline
//!
//! Runs are sequential within one process. Overlap across processes is
//! prevented by the job lock, not by the interval.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument};

use crate::config::MIN_POLL_INTERVAL;
use crate::pipeline::{BroadcastPipeline, RunOutcome};

/// Scheduler status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerStatus {
    /// Ticking
    Running,
    /// Stop requested; waiting for the in-flight run
    Stopping,
    /// Not ticking
    Stopped,
}

/// Scheduler errors
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("scheduler is already running")]
    AlreadyRunning,

    #[error("scheduler loop terminated abnormally: {0}")]
    Join(String),
}

/// Invokes a [`BroadcastPipeline`] every `interval` until stopped
///
/// # Example
///
/// ```ignore
/// let pipeline = Arc::new(BroadcastPipeline::from_store(store, &config));
/// let scheduler = BroadcastScheduler::new(pipeline, config.poll_interval);
///
/// scheduler.start()?;
/// tokio::signal::ctrl_c().await?;
/// scheduler.stop().await?;
/// ```
pub struct BroadcastScheduler {
    pipeline: Arc<BroadcastPipeline>,
    interval: Duration,
    shutdown_tx: watch::Sender<bool>,
    status: Arc<RwLock<SchedulerStatus>>,
    ticks: Arc<AtomicU64>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BroadcastScheduler {
    /// Create a stopped scheduler. Intervals below [`MIN_POLL_INTERVAL`] are raised to it.
    pub fn new(pipeline: Arc<BroadcastPipeline>, interval: Duration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            pipeline,
            interval: interval.max(MIN_POLL_INTERVAL),
            shutdown_tx,
            status: Arc::new(RwLock::new(SchedulerStatus::Stopped)),
            ticks: Arc::new(AtomicU64::new(0)),
            handle: Mutex::new(None),
        }
    }

    /// Get current status
    pub fn status(&self) -> SchedulerStatus {
        *self.status.read()
    }

    /// Number of runs attempted since creation, including skipped and failed ones
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Start ticking. The first run fires one interval after start.
    #[instrument(skip(self), fields(job = %self.pipeline.job_name()))]
    pub fn start(&self) -> Result<(), SchedulerError> {
        {
            let mut status = self.status.write();
            if *status != SchedulerStatus::Stopped {
                return Err(SchedulerError::AlreadyRunning);
            }
            *status = SchedulerStatus::Running;
        }

        info!(
            interval_ms = self.interval.as_millis() as u64,
            "Starting instant message scheduler"
        );

        self.shutdown_tx.send_replace(false);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let pipeline = Arc::clone(&self.pipeline);
        let ticks = Arc::clone(&self.ticks);
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        debug!("Scheduler loop: shutdown requested");
                        break;
                    }
                    _ = ticker.tick() => {
                        ticks.fetch_add(1, Ordering::Relaxed);
                        Self::tick(&pipeline).await;
                    }
                }
            }

            debug!("Scheduler loop exited");
        });

        *self.handle.lock() = Some(handle);
        Ok(())
    }

    /// Stop ticking and wait for the in-flight run, if any, to finish
    #[instrument(skip(self), fields(job = %self.pipeline.job_name()))]
    pub async fn stop(&self) -> Result<(), SchedulerError> {
        {
            let mut status = self.status.write();
            if *status == SchedulerStatus::Stopped {
                return Ok(());
            }
            *status = SchedulerStatus::Stopping;
        }

        self.shutdown_tx.send_replace(true);

        let handle = self.handle.lock().take();
        let joined = match handle {
            Some(handle) => handle.await.map_err(|e| SchedulerError::Join(e.to_string())),
            None => Ok(()),
        };

        *self.status.write() = SchedulerStatus::Stopped;
        info!("Instant message scheduler stopped");
        joined
    }

    /// One scheduled invocation; failures are reported and never end the loop
    async fn tick(pipeline: &BroadcastPipeline) {
        match pipeline.run().await {
            Ok(RunOutcome::Completed(_)) => {}
            Ok(RunOutcome::Skipped) => {
                debug!("Previous instant message run still holds the lock");
            }
            Err(e) => {
                error!(error = %e, "Instant message run failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BroadcastConfig;
    use crate::persistence::InMemoryBroadcastStore;

    fn scheduler() -> BroadcastScheduler {
        let store = Arc::new(InMemoryBroadcastStore::new());
        let pipeline = Arc::new(BroadcastPipeline::from_store(store, &BroadcastConfig::new()));
        BroadcastScheduler::new(pipeline, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let scheduler = scheduler();
        scheduler.start().unwrap();

        assert!(matches!(scheduler.start(), Err(SchedulerError::AlreadyRunning)));
        assert_eq!(scheduler.status(), SchedulerStatus::Running);

        scheduler.stop().await.unwrap();
        assert_eq!(scheduler.status(), SchedulerStatus::Stopped);
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let scheduler = scheduler();
        scheduler.stop().await.unwrap();
        assert_eq!(scheduler.status(), SchedulerStatus::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_still_ticks() {
        let store = Arc::new(InMemoryBroadcastStore::new());
        let pipeline = Arc::new(BroadcastPipeline::from_store(store, &BroadcastConfig::new()));
        let scheduler = BroadcastScheduler::new(pipeline, Duration::ZERO);

        scheduler.start().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(scheduler.ticks() > 0);
        assert_eq!(scheduler.status(), SchedulerStatus::Running);
        scheduler.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let scheduler = scheduler();
        scheduler.start().unwrap();
        tokio::time::sleep(Duration::from_millis(5500)).await;
        scheduler.stop().await.unwrap();
        assert_eq!(scheduler.ticks(), 1);

        scheduler.start().unwrap();
        tokio::time::sleep(Duration::from_millis(10_500)).await;
        scheduler.stop().await.unwrap();
        assert_eq!(scheduler.ticks(), 3);
    }
}
