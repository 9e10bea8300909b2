//! In-process task queue with a worker pool and a result store
//!
//! Jobs flow through a bounded mpsc channel to `workers` tokio tasks. Each
//! submitted job gets a oneshot result slot keyed by its [`TaskHandle`];
//! `await_result` takes the slot out and waits on it with a deadline. A
//! waiter that gives up drops its slot, and the worker's late result is
//! discarded. Slots nobody claims expire after `result_expiry_secs`.

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use prices_common::{
    AwaitError, QueueError, TaskFailure, TaskHandle, TaskOutcome, TaskPayload, TaskQueue,
    TaskRequest,
};

use crate::registry::TaskRegistry;

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Number of concurrent workers
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Maximum number of jobs waiting for a worker
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Seconds an unclaimed result is kept
    #[serde(default = "default_result_expiry_secs")]
    pub result_expiry_secs: u64,
}

fn default_workers() -> usize {
    4
}

fn default_capacity() -> usize {
    1024
}

fn default_result_expiry_secs() -> u64 {
    3600
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            capacity: default_capacity(),
            result_expiry_secs: default_result_expiry_secs(),
        }
    }
}

impl QueueConfig {
    pub fn result_expiry(&self) -> Duration {
        Duration::from_secs(self.result_expiry_secs)
    }

    /// Sweep at half the expiry, bounded to [1s, 60s]
    fn sweep_interval(&self) -> Duration {
        (self.result_expiry() / 2).clamp(Duration::from_secs(1), Duration::from_secs(60))
    }
}

/// Snapshot of queue counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub expired: u64,
    /// Results submitted but not yet claimed or expired
    pub pending: usize,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    expired: AtomicU64,
}

struct Job {
    handle: TaskHandle,
    request: TaskRequest,
    reply: oneshot::Sender<TaskOutcome>,
}

struct ResultSlot {
    rx: oneshot::Receiver<TaskOutcome>,
    submitted_at: Instant,
}

type ResultStore = Arc<DashMap<TaskHandle, ResultSlot>>;

pub struct LocalTaskQueue {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    results: ResultStore,
    counters: Arc<Counters>,
    capacity: usize,
    workers: Mutex<Vec<JoinHandle<()>>>,
    sweeper: JoinHandle<()>,
}

impl LocalTaskQueue {
    /// Spawn the worker pool and the expiry sweeper.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(registry: TaskRegistry, config: &QueueConfig) -> Self {
        let capacity = config.capacity.max(1);
        let (tx, rx) = mpsc::channel::<Job>(capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let registry = Arc::new(registry);
        let counters = Arc::new(Counters::default());
        let results: ResultStore = Arc::new(DashMap::new());

        let workers = (0..config.workers.max(1))
            .map(|id| {
                let rx = Arc::clone(&rx);
                let registry = Arc::clone(&registry);
                let counters = Arc::clone(&counters);
                tokio::spawn(worker_loop(id, rx, registry, counters))
            })
            .collect::<Vec<_>>();

        let sweeper = tokio::spawn(sweep_loop(
            Arc::clone(&results),
            Arc::clone(&counters),
            config.result_expiry(),
            config.sweep_interval(),
        ));

        info!(
            "Task queue started: {} worker(s), capacity {}, tasks {:?}",
            workers.len(),
            capacity,
            registry.names()
        );

        Self {
            sender: Mutex::new(Some(tx)),
            results,
            counters,
            capacity,
            workers: Mutex::new(workers),
            sweeper,
        }
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            submitted: self.counters.submitted.load(Ordering::SeqCst),
            completed: self.counters.completed.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
            expired: self.counters.expired.load(Ordering::SeqCst),
            pending: self.results.len(),
        }
    }

    /// Stop accepting work and wait for workers to finish queued jobs.
    pub async fn shutdown(&self) {
        info!("Stopping task queue...");

        // Dropping the sender lets workers drain the channel and exit
        self.sender.lock().take();
        self.sweeper.abort();

        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if let Err(e) = worker.await {
                error!("Worker exited abnormally: {}", e);
            }
        }

        let stats = self.stats();
        info!(
            "Task queue stopped: {} submitted, {} completed, {} failed, {} expired",
            stats.submitted, stats.completed, stats.failed, stats.expired
        );
    }
}

impl Drop for LocalTaskQueue {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

#[async_trait]
impl TaskQueue for LocalTaskQueue {
    async fn submit(&self, request: TaskRequest) -> Result<TaskHandle, QueueError> {
        let sender = self.sender.lock().clone().ok_or(QueueError::Closed)?;

        let handle = TaskHandle::new();
        let (reply, rx) = oneshot::channel();
        self.results.insert(
            handle,
            ResultSlot {
                rx,
                submitted_at: Instant::now(),
            },
        );

        let job = Job {
            handle,
            request,
            reply,
        };
        if let Err(e) = sender.try_send(job) {
            self.results.remove(&handle);
            return Err(match e {
                mpsc::error::TrySendError::Full(_) => QueueError::Full {
                    capacity: self.capacity,
                },
                mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
            });
        }

        self.counters.submitted.fetch_add(1, Ordering::SeqCst);
        debug!("Submitted task {}", handle);
        Ok(handle)
    }

    async fn await_result(
        &self,
        handle: TaskHandle,
        timeout: Duration,
    ) -> Result<TaskPayload, AwaitError> {
        let (_, slot) = self
            .results
            .remove(&handle)
            .ok_or(AwaitError::UnknownHandle(handle))?;

        match tokio::time::timeout(timeout, slot.rx).await {
            Ok(Ok(Ok(payload))) => Ok(payload),
            Ok(Ok(Err(failure))) => Err(AwaitError::Failed(failure)),
            Ok(Err(_)) => Err(AwaitError::Lost(handle)),
            Err(_) => Err(AwaitError::Timeout(timeout)),
        }
    }
}

async fn worker_loop(
    id: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    registry: Arc<TaskRegistry>,
    counters: Arc<Counters>,
) {
    debug!("Worker {} started", id);

    loop {
        // Lock only while waiting for the next job
        let job = rx.lock().await.recv().await;
        let Some(job) = job else {
            break;
        };

        let outcome = run_job(&registry, &job).await;
        match &outcome {
            Ok(_) => counters.completed.fetch_add(1, Ordering::SeqCst),
            Err(_) => counters.failed.fetch_add(1, Ordering::SeqCst),
        };

        if job.reply.send(outcome).is_err() {
            debug!(
                "Result for task {} discarded: waiter already gone",
                job.handle
            );
        }
    }

    debug!("Worker {} stopped", id);
}

async fn run_job(registry: &TaskRegistry, job: &Job) -> TaskOutcome {
    let Some(executor) = registry.get(&job.request.name) else {
        warn!("Task {} has unknown name {:?}", job.handle, job.request.name);
        return Err(TaskFailure::task_failed(format!(
            "unknown task {:?}",
            job.request.name
        )));
    };

    debug!("Worker running {} ({})", job.request.name, job.handle);

    match AssertUnwindSafe(executor.execute(&job.request.args))
        .catch_unwind()
        .await
    {
        Ok(outcome) => outcome,
        Err(_) => {
            error!("Task {} ({}) panicked", job.request.name, job.handle);
            Err(TaskFailure::task_failed("task panicked"))
        }
    }
}

async fn sweep_loop(
    results: ResultStore,
    counters: Arc<Counters>,
    expiry: Duration,
    every: Duration,
) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;

        let before = results.len();
        results.retain(|_, slot| slot.submitted_at.elapsed() < expiry);
        let removed = before.saturating_sub(results.len());

        if removed > 0 {
            counters.expired.fetch_add(removed as u64, Ordering::SeqCst);
            debug!("Expired {} unclaimed task result(s)", removed);
        }
    }
}
