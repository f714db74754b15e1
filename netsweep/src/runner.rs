//! Bulk orchestration over many devices.
//!
//! With one worker, devices run strictly one after another. With more, a
//! semaphore bounds how many sessions are open at once and every task owns
//! one device from connect to close. Results always come back in input order.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::driver::Connector;
use crate::engine::{ConnectFailureKind, DeviceJob, ExecutionEngine, ExecutionResult};

/// Whether a device that connected but returned nothing counts as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyOutputPolicy {
    /// Treat like a login problem: not written, listed for retry.
    #[default]
    TreatAsFailure,
    /// Keep and write the (empty) output.
    Keep,
}

/// Orchestration settings.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Sessions open at once; 1 means sequential.
    pub workers: usize,
    /// Stop launching new devices this long after the run starts.
    pub deadline: Option<Duration>,
    /// Upper bound on one device's whole run.
    pub device_timeout: Option<Duration>,
    pub empty_output: EmptyOutputPolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            deadline: None,
            device_timeout: None,
            empty_output: EmptyOutputPolicy::default(),
        }
    }
}

/// Stops a run from launching further devices.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Results of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// One result per attempted device, in input order.
    pub results: Vec<ExecutionResult>,
    /// Devices never started because of cancellation or the deadline.
    pub skipped: Vec<String>,
    pub policy: EmptyOutputPolicy,
}

impl RunReport {
    /// Whether this result should be attempted again.
    pub fn needs_retry(&self, result: &ExecutionResult) -> bool {
        result.is_connection_failure()
            || (self.policy == EmptyOutputPolicy::TreatAsFailure && result.empty_output)
    }

    /// Connection failures, empty outputs under `TreatAsFailure`, and skipped devices.
    pub fn retry_list(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|result| self.needs_retry(result))
            .map(|result| result.device.clone())
            .chain(self.skipped.iter().cloned())
            .collect()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| !self.needs_retry(r)).count()
    }
}

/// Drives an [`ExecutionEngine`] over a device list.
pub struct BulkRunner<C> {
    engine: Arc<ExecutionEngine<C>>,
    options: RunOptions,
    cancel: Arc<watch::Sender<bool>>,
}

impl<C: Connector + 'static> BulkRunner<C> {
    pub fn new(connector: C, options: RunOptions) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            engine: Arc::new(ExecutionEngine::new(connector)),
            options,
            cancel: Arc::new(cancel),
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn engine(&self) -> &ExecutionEngine<C> {
        &self.engine
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: self.cancel.clone(),
        }
    }

    /// Clear an earlier cancellation so later runs launch devices again.
    pub fn reset_cancel(&self) {
        self.cancel.send_replace(false);
    }

    /// Run every job; exactly one result per launched device.
    ///
    /// A cancelled runner skips every device until [`reset_cancel`](Self::reset_cancel).
    pub async fn run(&self, jobs: Vec<DeviceJob>) -> RunReport {
        let deadline = self.options.deadline.map(|d| Instant::now() + d);
        let total = jobs.len();

        let (results, skipped) = if self.options.workers <= 1 {
            self.run_sequential(jobs, deadline).await
        } else {
            self.run_concurrent(jobs, deadline).await
        };

        info!(
            "Run finished: {} attempted, {} skipped of {}",
            results.len(),
            skipped.len(),
            total
        );
        RunReport {
            results,
            skipped,
            policy: self.options.empty_output,
        }
    }

    /// Rerun exactly the devices `report` lists for retry.
    pub async fn rerun_failed(&self, report: &RunReport, jobs: &[DeviceJob]) -> RunReport {
        let retry: HashSet<String> = report.retry_list().into_iter().collect();
        let subset: Vec<DeviceJob> = jobs
            .iter()
            .filter(|job| retry.contains(job.device()))
            .cloned()
            .collect();

        info!("Retrying {} devices", subset.len());
        self.run(subset).await
    }

    fn should_stop(&self, deadline: Option<Instant>) -> bool {
        *self.cancel.borrow() || deadline.is_some_and(|d| Instant::now() >= d)
    }

    async fn run_sequential(
        &self,
        jobs: Vec<DeviceJob>,
        deadline: Option<Instant>,
    ) -> (Vec<ExecutionResult>, Vec<String>) {
        let mut results = Vec::with_capacity(jobs.len());
        let mut skipped = Vec::new();

        for job in jobs {
            if self.should_stop(deadline) {
                skipped.push(job.device().to_string());
                continue;
            }
            results.push(run_one(&self.engine, &job, self.options.device_timeout).await);
        }

        (results, skipped)
    }

    async fn run_concurrent(
        &self,
        jobs: Vec<DeviceJob>,
        deadline: Option<Instant>,
    ) -> (Vec<ExecutionResult>, Vec<String>) {
        let semaphore = Arc::new(Semaphore::new(self.options.workers));
        let mut cancel_rx = self.cancel.subscribe();
        let mut tasks = JoinSet::new();

        let mut launched: Vec<(usize, String)> = Vec::new();
        let mut skipped = Vec::new();
        let mut slots: Vec<Option<ExecutionResult>> = vec![None; jobs.len()];

        for (index, job) in jobs.into_iter().enumerate() {
            if self.should_stop(deadline) {
                skipped.push(job.device().to_string());
                continue;
            }

            let permit = tokio::select! {
                biased;
                _ = stopped(&mut cancel_rx, deadline) => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                skipped.push(job.device().to_string());
                continue;
            };

            debug!("Launching {} ({} of {})", job.device(), index + 1, slots.len());
            launched.push((index, job.device().to_string()));

            let engine = self.engine.clone();
            let limit = self.options.device_timeout;
            tasks.spawn(async move {
                let _permit = permit;
                (index, run_one(&engine, &job, limit).await)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => warn!("Worker task failed: {}", e),
            }
        }

        let results = launched
            .into_iter()
            .map(|(index, device)| {
                slots[index].take().unwrap_or_else(|| {
                    ExecutionResult::connection_failure(
                        device,
                        ConnectFailureKind::Other,
                        "worker task panicked",
                        Duration::ZERO,
                    )
                })
            })
            .collect();

        (results, skipped)
    }
}

async fn run_one<C: Connector>(
    engine: &ExecutionEngine<C>,
    job: &DeviceJob,
    limit: Option<Duration>,
) -> ExecutionResult {
    let Some(limit) = limit else {
        return engine.run(job).await;
    };

    match tokio::time::timeout(limit, engine.run(job)).await {
        Ok(result) => result,
        Err(_) => {
            warn!("{}: gave up after {:?}", job.device(), limit);
            ExecutionResult::connection_failure(
                job.device(),
                ConnectFailureKind::Timeout,
                format!("device run exceeded {limit:?}"),
                limit,
            )
        }
    }
}

/// Resolves once the run is cancelled or the deadline passes.
async fn stopped(cancel_rx: &mut watch::Receiver<bool>, deadline: Option<Instant>) {
    let cancelled = async {
        if cancel_rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let expired = async {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = cancelled => {}
        _ = expired => {}
    }
}
