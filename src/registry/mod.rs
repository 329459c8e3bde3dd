//! Queue group registry.
//!
//! Tracks which queues belong to which group, when each queue was activated,
//! the selection parameter it was activated with, and how many units of work
//! have been drained from it. All state lives in the shared store so that
//! every producer and worker process sees the same picture.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::keys;
use crate::store::{QueueStore, StoreError};

/// Selection parameter assigned when the caller does not provide one.
pub const DEFAULT_PARAMETER: f64 = 1.0;

/// Per-queue activation record stored in the group's metadata hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMeta {
    /// Activation time as fractional seconds since the Unix epoch.
    pub activated_at: f64,
    /// Policy-specific parameter (probability, speed factor, or priority).
    pub param: f64,
}

/// Store-backed registry of activated queues.
pub struct QueueRegistry {
    store: Arc<dyn QueueStore>,
    clock: Arc<dyn Clock>,
    quick_start: bool,
}

impl QueueRegistry {
    /// Creates a registry over the given store, stamping activations with
    /// wall-clock time.
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Creates a registry with an explicit clock. Tests use this to control
    /// elapsed time.
    pub fn with_clock(store: Arc<dyn QueueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            quick_start: true,
        }
    }

    /// Controls whether newly activated queues are also appended to the
    /// quick-start list consumed by weighted random selection.
    pub fn with_quick_start(mut self, quick_start: bool) -> Self {
        self.quick_start = quick_start;
        self
    }

    /// Registers `queue` as a member of `group` with the given selection
    /// parameter. Re-activating an existing member resets its work counter
    /// and activation time.
    pub async fn activate(&self, group: &str, queue: &str, param: f64) -> Result<(), StoreError> {
        let meta = QueueMeta {
            activated_at: self.clock.now(),
            param,
        };
        // The reverse lookup must land before the queue becomes selectable:
        // a worker that picks the queue immediately checks its group.
        self.store
            .hash_set(keys::GROUP_LOOKUP, queue, group)
            .await?;
        self.store
            .hash_set(&keys::group_work(group), queue, "0")
            .await?;
        self.store
            .hash_set(&keys::group_meta(group), queue, &serde_json::to_string(&meta)?)
            .await?;
        if self.quick_start {
            self.store.list_push(keys::NEW_QUEUES, queue).await?;
        }
        self.store
            .set_add(&keys::group_members(group), queue)
            .await?;

        debug!(group = %group, queue = %queue, param, "activated queue");
        Ok(())
    }

    /// Removes `queue` from its group, if it has one. Returns whether the
    /// queue was a group member. Retiring an ungrouped or already retired
    /// queue is a no-op.
    pub async fn retire(&self, queue: &str) -> Result<bool, StoreError> {
        let Some(group) = self.group_of(queue).await? else {
            return Ok(false);
        };
        // Reverse lookup goes first so a concurrent worker stops treating
        // the queue as grouped before the per-group records disappear.
        self.store.hash_delete(keys::GROUP_LOOKUP, queue).await?;
        self.store
            .hash_delete(&keys::group_work(&group), queue)
            .await?;
        self.store
            .hash_delete(&keys::group_meta(&group), queue)
            .await?;
        self.store
            .set_remove(&keys::group_members(&group), queue)
            .await?;

        debug!(group = %group, queue = %queue, "retired queue");
        Ok(true)
    }

    /// Returns the group `queue` belongs to, or `None` for ungrouped queues.
    pub async fn group_of(&self, queue: &str) -> Result<Option<String>, StoreError> {
        self.store.hash_get(keys::GROUP_LOOKUP, queue).await
    }

    /// Current members of `group`.
    pub async fn group_queues(&self, group: &str) -> Result<Vec<String>, StoreError> {
        self.store.set_members(&keys::group_members(group)).await
    }

    /// Records one unit of work drained from `queue`. Does nothing for
    /// queues that belong to no group.
    pub async fn increment_work(&self, queue: &str) -> Result<(), StoreError> {
        if let Some(group) = self.group_of(queue).await? {
            self.store
                .hash_increment(&keys::group_work(&group), queue, 1)
                .await?;
        }
        Ok(())
    }

    /// Units of work drained from `queue` since activation, or `None` for
    /// ungrouped queues.
    pub async fn units_worked(&self, queue: &str) -> Result<Option<i64>, StoreError> {
        let Some(group) = self.group_of(queue).await? else {
            return Ok(None);
        };
        let raw = self.store.hash_get(&keys::group_work(&group), queue).await?;
        Ok(Some(raw.and_then(|v| v.parse::<i64>().ok()).unwrap_or(0)))
    }

    /// Activation record for `queue` within its group, if both exist.
    pub async fn meta(&self, queue: &str) -> Result<Option<QueueMeta>, StoreError> {
        let Some(group) = self.group_of(queue).await? else {
            return Ok(None);
        };
        let raw = self.store.hash_get(&keys::group_meta(&group), queue).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
