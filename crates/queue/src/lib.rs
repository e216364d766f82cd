//! Job queue engine — named queues, workers, bounded concurrency, retries.
//!
//! Producers enqueue typed payloads under a caller-supplied `job_id`
//! (idempotency key); a `Worker` binds a queue to a [`JobProcessor`] and
//! dispatches up to the queue's concurrency ceiling in parallel. Processing
//! order is not FIFO-guaranteed, only bounded-parallelism-guaranteed.
//!
//! Retries are opaque to the processor: every attempt starts from a clean
//! `Job` value, and backoff doubles per attempt until `max_attempts` is
//! exhausted and the job lands in `Failed` with its captured reason.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex, RwLock, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};
use workloom_core::error::QueueError;
use workloom_core::job::{Job, JobState, JobStatus};

/// How a queue behaves. Concurrency ceilings of 1–3 are typical for
/// agent-session workloads.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Queue name (unique within one engine)
    pub name: String,

    /// Maximum simultaneous processor invocations
    pub concurrency: usize,

    /// Attempts before a job is declared failed (1 = no retries)
    pub max_attempts: u32,

    /// First retry delay; doubles per subsequent attempt
    pub backoff_base: Duration,

    /// How long shutdown waits for in-flight jobs before abandoning them
    pub shutdown_grace: Duration,
}

impl QueueConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            concurrency: 1,
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
            shutdown_grace: Duration::from_secs(10),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

/// The processor port a worker runs jobs through.
///
/// Implementations must tolerate being called again after a failure: each
/// attempt receives a fresh `Job` (only `attempt` differs) and must not
/// depend on state from previous attempts.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    async fn process(&self, job: &Job) -> anyhow::Result<serde_json::Value>;
}

const INTAKE_DEPTH: usize = 256;

struct QueueInner {
    config: QueueConfig,
    statuses: RwLock<HashMap<String, JobStatus>>,
    intake: mpsc::Sender<Job>,
    /// Taken exactly once by the worker that binds this queue.
    intake_rx: Mutex<Option<mpsc::Receiver<Job>>>,
    shutdown_tx: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// The queue engine: owns every queue's lifecycle state exclusively.
#[derive(Default)]
pub struct QueueEngine {
    queues: RwLock<HashMap<String, Arc<QueueInner>>>,
}

impl QueueEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a named queue. Recreating an existing name is rejected.
    pub async fn create_queue(&self, config: QueueConfig) -> Result<(), QueueError> {
        let mut queues = self.queues.write().await;
        if queues.contains_key(&config.name) {
            return Err(QueueError::AlreadyExists(config.name.clone()));
        }

        let (intake, intake_rx) = mpsc::channel(INTAKE_DEPTH);
        let (shutdown_tx, _) = watch::channel(false);
        info!(queue = %config.name, concurrency = config.concurrency, "Queue created");
        queues.insert(
            config.name.clone(),
            Arc::new(QueueInner {
                config,
                statuses: RwLock::new(HashMap::new()),
                intake,
                intake_rx: Mutex::new(Some(intake_rx)),
                shutdown_tx,
                worker: Mutex::new(None),
            }),
        );
        Ok(())
    }

    async fn queue(&self, name: &str) -> Result<Arc<QueueInner>, QueueError> {
        self.queues
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| QueueError::UnknownQueue(name.to_string()))
    }

    /// Enqueue a job. Idempotent on `job_id`: while an instance of this id
    /// is live (`Enqueued` or `Active`), re-enqueueing returns the same id
    /// without creating a duplicate. A terminal job may be enqueued again.
    pub async fn enqueue(
        &self,
        queue: &str,
        job_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Result<String, QueueError> {
        let inner = self.queue(queue).await?;
        if *inner.shutdown_tx.borrow() {
            return Err(QueueError::ShuttingDown(queue.to_string()));
        }

        let job_id = job_id.into();
        {
            let mut statuses = inner.statuses.write().await;
            if let Some(existing) = statuses.get(&job_id) {
                if existing.state.is_live() {
                    debug!(queue, job_id, "Duplicate enqueue deduplicated");
                    return Ok(job_id);
                }
            }
            statuses.insert(job_id.clone(), JobStatus::enqueued());
        }

        let job = Job {
            queue: queue.to_string(),
            job_id: job_id.clone(),
            payload,
            attempt: 0,
            enqueued_at: Utc::now(),
        };
        inner
            .intake
            .send(job)
            .await
            .map_err(|_| QueueError::ShuttingDown(queue.to_string()))?;

        debug!(queue, job_id, "Job enqueued");
        Ok(job_id)
    }

    /// The externally visible status of a job.
    pub async fn status(&self, queue: &str, job_id: &str) -> Result<JobStatus, QueueError> {
        let inner = self.queue(queue).await?;
        let statuses = inner.statuses.read().await;
        statuses
            .get(job_id)
            .cloned()
            .ok_or_else(|| QueueError::UnknownJob {
                queue: queue.to_string(),
                job_id: job_id.to_string(),
            })
    }

    /// Bind `processor` to a queue and start dispatching.
    ///
    /// May be called once per queue; the dispatcher runs until shutdown.
    pub async fn start_worker(
        &self,
        queue: &str,
        processor: Arc<dyn JobProcessor>,
    ) -> Result<(), QueueError> {
        let inner = self.queue(queue).await?;
        let rx = inner
            .intake_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| QueueError::WorkerAttached(queue.to_string()))?;

        let handle = tokio::spawn(dispatch_loop(inner.clone(), rx, processor));
        *inner.worker.lock().await = Some(handle);
        info!(queue, "Worker started");
        Ok(())
    }

    /// Stop one queue: refuse new jobs, let in-flight jobs finish within the
    /// configured grace period, then abandon them and release resources.
    pub async fn shutdown(&self, queue: &str) -> Result<(), QueueError> {
        let inner = self.queue(queue).await?;
        let _ = inner.shutdown_tx.send(true);

        let handle = inner.worker.lock().await.take();
        if let Some(mut handle) = handle {
            // The dispatcher applies the grace period itself; this outer
            // margin only guards against a wedged dispatcher.
            let margin = inner.config.shutdown_grace + Duration::from_secs(1);
            if tokio::time::timeout(margin, &mut handle).await.is_err() {
                warn!(queue, "Dispatcher did not stop within grace, aborting");
                handle.abort();
            }
        }
        info!(queue, "Queue shut down");
        Ok(())
    }

    /// Shut down every queue.
    pub async fn shutdown_all(&self) {
        let names: Vec<String> = self.queues.read().await.keys().cloned().collect();
        for name in names {
            if let Err(e) = self.shutdown(&name).await {
                warn!(queue = %name, error = %e, "Shutdown error");
            }
        }
    }
}

/// The dispatcher: pulls intake, enforces the concurrency ceiling, reaps
/// finished jobs, and drains on shutdown.
async fn dispatch_loop(
    inner: Arc<QueueInner>,
    mut rx: mpsc::Receiver<Job>,
    processor: Arc<dyn JobProcessor>,
) {
    let semaphore = Arc::new(Semaphore::new(inner.config.concurrency));
    let mut shutdown_rx = inner.shutdown_tx.subscribe();
    let mut running: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            maybe_job = rx.recv() => {
                let Some(job) = maybe_job else { break };
                // The permit is acquired inside the task so the dispatcher
                // stays responsive to shutdown while jobs queue for a slot.
                running.spawn(run_job(
                    inner.clone(),
                    processor.clone(),
                    semaphore.clone(),
                    job,
                ));
            }
        }
        while running.try_join_next().is_some() {}
    }

    rx.close();
    let grace = inner.config.shutdown_grace;
    let drained = tokio::time::timeout(grace, async {
        while running.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(
            queue = %inner.config.name,
            abandoned = running.len(),
            "Grace period elapsed, abandoning in-flight jobs"
        );
        running.abort_all();
    }
    debug!(queue = %inner.config.name, "Dispatcher stopped");
}

/// Run one job to a terminal state, retrying with exponential backoff.
async fn run_job(
    inner: Arc<QueueInner>,
    processor: Arc<dyn JobProcessor>,
    semaphore: Arc<Semaphore>,
    job: Job,
) {
    let Ok(_permit) = semaphore.acquire_owned().await else {
        return;
    };

    let max_attempts = inner.config.max_attempts;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        {
            let mut statuses = inner.statuses.write().await;
            if let Some(status) = statuses.get_mut(&job.job_id) {
                status.state = JobState::Active;
                status.attempts = attempt;
            }
        }

        // Clean state per attempt: the processor sees a fresh Job value.
        let this_attempt = Job {
            attempt,
            ..job.clone()
        };

        match processor.process(&this_attempt).await {
            Ok(result) => {
                let mut statuses = inner.statuses.write().await;
                if let Some(status) = statuses.get_mut(&job.job_id) {
                    status.state = JobState::Completed;
                    status.result = Some(result);
                }
                debug!(queue = %job.queue, job_id = %job.job_id, attempt, "Job completed");
                return;
            }
            Err(e) => {
                let reason = e.to_string();
                if attempt >= max_attempts {
                    warn!(
                        queue = %job.queue,
                        job_id = %job.job_id,
                        attempts = attempt,
                        error = %reason,
                        "Job failed terminally"
                    );
                    let mut statuses = inner.statuses.write().await;
                    if let Some(status) = statuses.get_mut(&job.job_id) {
                        status.state = JobState::Failed;
                        status.failure_reason = Some(reason);
                    }
                    return;
                }

                let delay = inner.config.backoff_base * 2u32.saturating_pow(attempt - 1);
                warn!(
                    queue = %job.queue,
                    job_id = %job.job_id,
                    attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %reason,
                    "Job attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
