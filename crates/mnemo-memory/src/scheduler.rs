//! Scheduled maintenance over the memory corpus
//!
//! TigerStyle: Independent timer-driven tasks, per-iteration error
//! isolation, one shutdown signal.
//!
//! Three periodic tasks run for the life of the service: importance decay,
//! layer rebalancing, and a consolidation check that fires only when the
//! short-term tier outgrows its threshold. A failing iteration logs and the
//! task keeps its cadence; one failing task never stops the others. The
//! tasks serialize against each other through a shared mutex so sweeps do
//! not interleave, while tool-call operations stay concurrent.

use crate::manager::{ConsolidateOptions, MemoryManager};
use crate::types::MemoryLayer;
use mnemo_core::config::MnemoConfig;
use mnemo_core::constants::{CONSOLIDATION_CHECK_INTERVAL_MS_DEFAULT, REBALANCE_INTERVAL_MS_DEFAULT};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Intervals for the three maintenance tasks
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub decay_interval: Duration,
    pub rebalance_interval: Duration,
    pub consolidation_check_interval: Duration,
}

impl SchedulerConfig {
    /// Derive intervals from the service configuration
    pub fn from_config(config: &MnemoConfig) -> Self {
        Self {
            decay_interval: Duration::from_millis(config.decay.interval_ms),
            rebalance_interval: Duration::from_millis(REBALANCE_INTERVAL_MS_DEFAULT),
            consolidation_check_interval: Duration::from_millis(
                CONSOLIDATION_CHECK_INTERVAL_MS_DEFAULT,
            ),
        }
    }

    /// Short intervals for tests
    #[cfg(test)]
    pub fn for_testing() -> Self {
        Self {
            decay_interval: Duration::from_millis(20),
            rebalance_interval: Duration::from_millis(20),
            consolidation_check_interval: Duration::from_millis(20),
        }
    }
}

/// Periodic maintenance driver
pub struct MaintenanceScheduler {
    manager: Arc<MemoryManager>,
    config: SchedulerConfig,
    shutdown: Arc<Notify>,
    /// Set before notifying so a task mid-sweep observes the stop on its
    /// next loop entry instead of re-arming for a full interval
    stopped: Arc<AtomicBool>,
    /// Serializes maintenance sweeps against each other
    sweep_lock: Arc<Mutex<()>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MaintenanceScheduler {
    pub fn new(manager: Arc<MemoryManager>, config: SchedulerConfig) -> Self {
        Self {
            manager,
            config,
            shutdown: Arc::new(Notify::new()),
            stopped: Arc::new(AtomicBool::new(false)),
            sweep_lock: Arc::new(Mutex::new(())),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the three maintenance tasks
    pub async fn start(&self) {
        let decay = self.spawn_periodic(
            "decay",
            self.config.decay_interval,
            |manager| async move {
                manager.apply_decay().await.map(|count| {
                    debug!(decayed = count, "decay task ran");
                })
            },
        );

        let rebalance = self.spawn_periodic(
            "rebalance",
            self.config.rebalance_interval,
            |manager| async move {
                manager.rebalance_layers().await.map(|report| {
                    debug!(?report, "rebalance task ran");
                })
            },
        );

        let consolidation = self.spawn_periodic(
            "consolidation-check",
            self.config.consolidation_check_interval,
            |manager| async move {
                let threshold = manager.consolidation_threshold();
                let short_term = manager.count_layer(MemoryLayer::ShortTerm).await?;
                if short_term <= threshold {
                    debug!(short_term, threshold, "consolidation not needed");
                    return Ok(());
                }

                let result = manager
                    .consolidate(&ConsolidateOptions {
                        target_size: threshold,
                        ..Default::default()
                    })
                    .await?;
                info!(summary = %result.summary, "scheduled consolidation ran");
                Ok(())
            },
        );

        let mut tasks = self.tasks.lock().await;
        tasks.push(decay);
        tasks.push(rebalance);
        tasks.push(consolidation);

        info!(
            decay_interval_ms = self.config.decay_interval.as_millis() as u64,
            rebalance_interval_ms = self.config.rebalance_interval.as_millis() as u64,
            consolidation_check_interval_ms =
                self.config.consolidation_check_interval.as_millis() as u64,
            "maintenance scheduler started"
        );
    }

    fn spawn_periodic<F, Fut>(
        &self,
        name: &'static str,
        interval: Duration,
        run: F,
    ) -> JoinHandle<()>
    where
        F: Fn(Arc<MemoryManager>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = mnemo_core::error::Result<()>> + Send,
    {
        let manager = self.manager.clone();
        let shutdown = self.shutdown.clone();
        let stopped = self.stopped.clone();
        let sweep_lock = self.sweep_lock.clone();

        tokio::spawn(async move {
            loop {
                if stopped.load(Ordering::SeqCst) {
                    debug!(task = name, "maintenance task shutting down");
                    break;
                }
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        let _sweep = sweep_lock.lock().await;
                        if let Err(e) = run(manager.clone()).await {
                            warn!(task = name, error = %e, "maintenance task iteration failed");
                        }
                    }
                    _ = shutdown.notified() => {
                        debug!(task = name, "maintenance task shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Cancel all timers; an in-flight iteration finishes first
    pub async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.shutdown.notify_waiters();

        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "maintenance task join failed");
            }
        }
        info!("maintenance scheduler stopped");
    }
}
