use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

use super::Scanner;

type Job = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

struct ScheduledJob {
    name: &'static str,
    period: Duration,
    job: Job,
}

/// Scheduler fires each registered job on its own fixed period.
///
/// The first run of each job happens one period after `start`. Every tick
/// spawns the job body, so a slow run never delays the next tick and two
/// runs of the same job may overlap.
pub struct Scheduler {
    jobs: Vec<ScheduledJob>,
    stop_tx: Option<watch::Sender<bool>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            stop_tx: None,
        }
    }

    /// Device reconciliation and interface refresh on their configured periods
    pub fn for_scanner(scanner: Arc<Scanner>, device_period: Duration, interface_period: Duration) -> Self {
        let devices = scanner.clone();
        let interfaces = scanner;

        Self::new()
            .with_job("device scan", device_period, move || {
                let scanner = devices.clone();
                async move {
                    scanner.scan_devices_now().await;
                }
                .boxed()
            })
            .with_job("interface scan", interface_period, move || {
                let scanner = interfaces.clone();
                async move {
                    scanner.scan_interfaces_now().await;
                }
                .boxed()
            })
    }

    pub fn with_job<F>(mut self, name: &'static str, period: Duration, job: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        self.jobs.push(ScheduledJob {
            name,
            period: period.max(Duration::from_millis(1)),
            job: Arc::new(job),
        });
        self
    }

    /// Start every job loop. Returns false (and does nothing) if already running.
    pub fn start(&mut self) -> bool {
        if self.stop_tx.is_some() {
            tracing::debug!("Scheduler already running");
            return false;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        self.stop_tx = Some(stop_tx);

        for scheduled in &self.jobs {
            let name = scheduled.name;
            let period = scheduled.period;
            let job = scheduled.job.clone();
            let mut stop_rx = stop_rx.clone();

            tokio::spawn(async move {
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            tracing::info!("Running scheduled {}", name);
                            tokio::spawn(job());
                        }
                        _ = stop_rx.changed() => {
                            tracing::info!("Scheduled {} stopped", name);
                            break;
                        }
                    }
                }
            });
        }

        tracing::info!("Scheduler started with {} jobs", self.jobs.len());
        true
    }

    /// Stop every job loop. Runs already in flight finish on their own.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(true);
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
