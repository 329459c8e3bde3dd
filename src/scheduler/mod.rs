//! Group-aware scheduling over plain FIFO queues.
//!
//! The scheduler wraps the bare store primitives with the queue lifecycle:
//!
//! - **guarded push**: refuses pushes to activated queues
//! - **guarded pop**: retires a grouped queue the moment it drains
//! - **resolve**: turns a worker target into concrete queue names via the
//!   configured selection policy
//!
//! ```text
//!                        ┌──────────────┐
//!        activate ──────▶│   Registry   │◀────── retire (after drain)
//!                        └──────┬───────┘
//!                               │ membership, counters
//!                        ┌──────▼───────┐
//!   resolve(@group) ────▶│    Policy    │─────▶ queue names
//!                        └──────────────┘
//!
//!   guarded_push ──▶ [queue:a] [queue:b] ... ◀── guarded_pop
//! ```
//!
//! Lifecycle rule: a queue is filled first, activated once, drained by
//! workers, and retired forever when its last item is popped. Activation
//! closes the queue to pushes, which is what makes the post-pop emptiness
//! check race-free without locks.

pub mod config;
pub mod target;

pub use config::{SchedulerConfig, DEFAULT_NUMBER_OF_QUEUES};
pub use target::QueueTarget;

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::keys;
use crate::policy::{
    PolicyKind, PriorityScore, SelectionPolicy, ThroughputSpeed, WeightedRandom,
};
use crate::registry::QueueRegistry;
use crate::store::{QueueStore, StoreError};

/// Errors surfaced by the scheduling layer.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The queue was activated into a group and no longer accepts pushes.
    #[error("Queue '{0}' is activated and closed to new pushes")]
    ClosedQueue(String),

    /// A group-only worker was configured with something other than a
    /// group target.
    #[error("Invalid worker target: {0}")]
    QueueGroupNaming(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Facade tying the store, the registry, and one selection policy together.
pub struct Scheduler {
    store: Arc<dyn QueueStore>,
    registry: QueueRegistry,
    policy: Arc<dyn SelectionPolicy>,
    config: SchedulerConfig,
}

impl Scheduler {
    /// Builds a scheduler with wall-clock timing.
    pub fn new(store: Arc<dyn QueueStore>, config: SchedulerConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Builds a scheduler with an explicit clock for deterministic tests.
    pub fn with_clock(
        store: Arc<dyn QueueStore>,
        config: SchedulerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        // Only weighted random consumes the new-queue list, so only that
        // policy should feed it at activation time.
        let quick_start = config.policy == PolicyKind::WeightedRandom;
        let registry = QueueRegistry::with_clock(store.clone(), clock.clone())
            .with_quick_start(quick_start);

        let policy: Arc<dyn SelectionPolicy> = match config.policy {
            PolicyKind::PriorityScore => Arc::new(
                PriorityScore::with_clock(store.clone(), clock)
                    .with_direction(config.priority_direction),
            ),
            PolicyKind::ThroughputSpeed => {
                Arc::new(ThroughputSpeed::with_clock(store.clone(), clock))
            }
            PolicyKind::WeightedRandom => {
                let mut policy = WeightedRandom::new(store.clone())
                    .with_quick_start_factor(config.quick_start_factor)
                    .with_random_attempts(config.random_attempts);
                if let Some(seed) = config.selection_seed {
                    policy = policy.with_seed(seed);
                }
                Arc::new(policy)
            }
        };

        Self {
            store,
            registry,
            policy,
            config,
        }
    }

    /// Registers `queue` into `group`. Call this once every initial item has
    /// been pushed; the queue is closed to pushes from here on.
    pub async fn activate(
        &self,
        group: &str,
        queue: &str,
        param: f64,
    ) -> Result<(), SchedulerError> {
        self.registry.activate(group, queue, param).await?;
        Ok(())
    }

    /// Appends `item` to `queue`, registering the queue name globally.
    /// Fails once the queue has been activated.
    pub async fn guarded_push(&self, queue: &str, item: &str) -> Result<(), SchedulerError> {
        if self.registry.group_of(queue).await?.is_some() {
            return Err(SchedulerError::ClosedQueue(queue.to_string()));
        }
        self.store.set_add(keys::QUEUES, queue).await?;
        self.store.list_push(&keys::queue(queue), item).await?;
        Ok(())
    }

    /// Pops the next item from `queue`, then retires the queue if it belongs
    /// to a group and is now empty. Returns `None` for an empty queue, which
    /// callers treat as "no work right now".
    pub async fn guarded_pop(&self, queue: &str) -> Result<Option<String>, SchedulerError> {
        let item = self.store.list_pop(&keys::queue(queue)).await?;

        // Activated queues never receive another push, so emptiness observed
        // here is permanent and the retirement races are idempotent.
        if self.store.list_len(&keys::queue(queue)).await? == 0
            && self.registry.group_of(queue).await?.is_some()
        {
            self.remove_queue(queue).await?;
        }
        Ok(item)
    }

    /// Drops `queue` from the global queue set and deletes its backing list,
    /// retiring it from its group if it has one.
    pub async fn remove_queue(&self, queue: &str) -> Result<(), SchedulerError> {
        let retired = self.registry.retire(queue).await?;
        self.store.delete(&keys::queue(queue)).await?;
        self.store.set_remove(keys::QUEUES, queue).await?;
        if retired {
            debug!(queue = %queue, "removed drained queue");
        }
        Ok(())
    }

    /// Expands a worker target into concrete queue names. Literal targets
    /// pass through untouched; group targets go through the policy and may
    /// resolve to nothing when the group is empty.
    pub async fn resolve(&self, target: &QueueTarget) -> Result<Vec<String>, SchedulerError> {
        match target {
            QueueTarget::Literal(name) => Ok(vec![name.clone()]),
            QueueTarget::Group(group) => Ok(self
                .policy
                .pick_n(group, self.config.number_of_queues)
                .await?),
        }
    }

    /// Number of items currently in `queue`.
    pub async fn queue_len(&self, queue: &str) -> Result<usize, SchedulerError> {
        Ok(self.store.list_len(&keys::queue(queue)).await?)
    }

    /// Every queue name that currently holds or has held items, grouped
    /// or not.
    pub async fn known_queues(&self) -> Result<Vec<String>, SchedulerError> {
        Ok(self.store.set_members(keys::QUEUES).await?)
    }

    /// Active member queues of `group`.
    pub async fn group_members(&self, group: &str) -> Result<Vec<String>, SchedulerError> {
        Ok(self.registry.group_queues(group).await?)
    }

    /// Access to activation records and work counters.
    pub fn registry(&self) -> &QueueRegistry {
        &self.registry
    }
}
