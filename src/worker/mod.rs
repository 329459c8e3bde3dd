//! Queue-group workers.
//!
//! A worker owns one target group and loops: resolve the group to candidate
//! queues, pop one item, hand it to the [`JobHandler`], repeat. Several
//! workers can share one scheduler and one stats block; they coordinate only
//! through the store, so the same loop works across processes and hosts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::scheduler::{QueueTarget, Scheduler, SchedulerError};

/// Application callback invoked for every item a worker pops.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Processes one payload popped from `queue`. A returned error counts
    /// the item as failed; the item is not requeued.
    async fn handle(&self, queue: &str, payload: String) -> anyhow::Result<()>;
}

/// Counters shared by every worker attached to one scheduler.
#[derive(Debug, Default)]
pub struct WorkerStats {
    handled: AtomicU64,
    misses: AtomicU64,
    failures: AtomicU64,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_handled(&self) {
        self.handled.fetch_add(1, Ordering::SeqCst);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::SeqCst);
    }

    fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }

    /// Consistent-enough copy of the counters for reporting.
    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            handled: self.handled.load(Ordering::SeqCst),
            misses: self.misses.load(Ordering::SeqCst),
            failures: self.failures.load(Ordering::SeqCst),
        }
    }
}

/// Point-in-time view of [`WorkerStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStatsSnapshot {
    /// Items popped and handled without error.
    pub handled: u64,
    /// Resolved queues that turned out to be empty by pop time.
    pub misses: u64,
    /// Items whose handler returned an error.
    pub failures: u64,
}

impl WorkerStatsSnapshot {
    /// Items consumed, successful or not.
    pub fn consumed(&self) -> u64 {
        self.handled + self.failures
    }
}

/// A single group-draining worker.
pub struct Worker {
    id: String,
    scheduler: Arc<Scheduler>,
    target: QueueTarget,
    handler: Arc<dyn JobHandler>,
    shutdown_rx: broadcast::Receiver<()>,
    poll_interval: Duration,
    stats: Arc<WorkerStats>,
}

impl Worker {
    /// Creates a worker bound to a queue group.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::QueueGroupNaming` when `target` is not a
    /// group reference. Workers drain groups; a literal queue needs no
    /// selection policy and is popped through the scheduler directly.
    pub fn new(
        id: impl Into<String>,
        scheduler: Arc<Scheduler>,
        target: QueueTarget,
        handler: Arc<dyn JobHandler>,
        shutdown_rx: broadcast::Receiver<()>,
        poll_interval: Duration,
        stats: Arc<WorkerStats>,
    ) -> Result<Self, SchedulerError> {
        match &target {
            QueueTarget::Group(group) if !group.is_empty() => Ok(Self {
                id: id.into(),
                scheduler,
                target,
                handler,
                shutdown_rx,
                poll_interval,
                stats,
            }),
            _ => Err(SchedulerError::QueueGroupNaming(format!(
                "you must supply a queue group rather than a queue, \
                 prefixed with @, as in @mailings (got '{}')",
                target
            ))),
        }
    }

    /// Main worker loop. Runs until a shutdown signal arrives.
    pub async fn run(mut self) {
        info!(worker_id = %self.id, target = %self.target, "Worker started");

        loop {
            // Check for shutdown signal (non-blocking)
            match self.shutdown_rx.try_recv() {
                Ok(()) | Err(broadcast::error::TryRecvError::Closed) => {
                    info!(worker_id = %self.id, "Worker received shutdown signal");
                    break;
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => {
                    // Missed signals can only mean shutdown, check again
                    continue;
                }
                Err(broadcast::error::TryRecvError::Empty) => {}
            }

            match self.work_once().await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(worker_id = %self.id, "No work available");
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(e) => {
                    error!(worker_id = %self.id, error = %e, "Scheduling cycle failed");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }

        info!(worker_id = %self.id, "Worker stopped");
    }

    /// One resolve-pop-handle cycle. Returns whether an item was consumed.
    async fn work_once(&self) -> Result<bool, SchedulerError> {
        let candidates = self.scheduler.resolve(&self.target).await?;

        for queue in candidates {
            match self.scheduler.guarded_pop(&queue).await? {
                Some(payload) => {
                    // Work is recorded up front so scoring policies see the
                    // pop even if the handler fails.
                    self.scheduler.registry().increment_work(&queue).await?;
                    self.process(&queue, payload).await;
                    return Ok(true);
                }
                None => {
                    // Another worker drained this queue between selection
                    // and pop. Expected under load.
                    self.stats.record_miss();
                    debug!(worker_id = %self.id, queue = %queue, "Selected queue was already empty");
                }
            }
        }
        Ok(false)
    }

    async fn process(&self, queue: &str, payload: String) {
        match self.handler.handle(queue, payload).await {
            Ok(()) => {
                self.stats.record_handled();
                debug!(worker_id = %self.id, queue = %queue, "Item handled");
            }
            Err(e) => {
                self.stats.record_failure();
                warn!(worker_id = %self.id, queue = %queue, error = %e, "Handler failed");
            }
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}
