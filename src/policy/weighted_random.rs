//! Weighted random selection with quick-start bias.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use super::SelectionPolicy;
use crate::keys;
use crate::registry::QueueMeta;
use crate::store::{QueueStore, StoreError};

/// Default number of weighted draws before falling back to the last draw.
/// Higher values model low-probability queues more accurately at the cost
/// of extra store round-trips per selection.
pub const DEFAULT_RANDOM_ATTEMPTS: u32 = 20;

/// Default fraction of selections that consult the new-queue list first.
/// At 1.0 a never-selected queue always wins; at 0.0 new queues get no
/// head start.
pub const DEFAULT_QUICK_START_FACTOR: f64 = 0.5;

/// Two-phase random selection.
///
/// A coin toss against the quick-start factor first offers the front of the
/// new-queue list, so freshly activated queues are tried before the weighted
/// draw can ignore them. Otherwise members are drawn uniformly and accepted
/// with their configured probability; when the attempt budget runs out the
/// last draw is returned unconditionally, which keeps selection terminating
/// and saves zero-probability queues from starving.
pub struct WeightedRandom {
    store: Arc<dyn QueueStore>,
    quick_start_factor: f64,
    random_attempts: u32,
    rng: Mutex<ChaCha8Rng>,
}

impl WeightedRandom {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self {
            store,
            quick_start_factor: DEFAULT_QUICK_START_FACTOR,
            random_attempts: DEFAULT_RANDOM_ATTEMPTS,
            rng: Mutex::new(ChaCha8Rng::from_rng(&mut rand::rng())),
        }
    }

    /// Sets the probability of consulting the new-queue list first.
    pub fn with_quick_start_factor(mut self, factor: f64) -> Self {
        self.quick_start_factor = factor;
        self
    }

    /// Sets the weighted-draw attempt budget.
    pub fn with_random_attempts(mut self, attempts: u32) -> Self {
        self.random_attempts = attempts;
        self
    }

    /// Seeds the internal random source for reproducible selection.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(ChaCha8Rng::seed_from_u64(seed));
        self
    }

    fn roll(&self) -> f64 {
        self.rng.lock().expect("lock not poisoned").random::<f64>()
    }

    /// Pops the next still-existing queue from the new-queue list. Entries
    /// for queues that were drained before ever being selected are dropped.
    async fn quick_start(&self) -> Result<Option<String>, StoreError> {
        while let Some(queue) = self.store.list_pop(keys::NEW_QUEUES).await? {
            if self.store.set_contains(keys::QUEUES, &queue).await? {
                return Ok(Some(queue));
            }
            debug!(queue = %queue, "dropping quick-start entry for vanished queue");
        }
        Ok(None)
    }

    /// Acceptance probability for one member, zero when its activation
    /// record is gone.
    async fn acceptance(&self, group: &str, queue: &str) -> Result<f64, StoreError> {
        match self.store.hash_get(&keys::group_meta(group), queue).await? {
            Some(raw) => {
                let meta: QueueMeta = serde_json::from_str(&raw)?;
                Ok(meta.param)
            }
            None => Ok(0.0),
        }
    }
}

#[async_trait]
impl SelectionPolicy for WeightedRandom {
    async fn pick(&self, group: &str) -> Result<Option<String>, StoreError> {
        if self.roll() < self.quick_start_factor {
            if let Some(queue) = self.quick_start().await? {
                return Ok(Some(queue));
            }
        }

        let members_key = keys::group_members(group);
        let mut last_draw = None;
        // Always at least one draw; a zero budget must not starve the group.
        for _ in 0..self.random_attempts.max(1) {
            let Some(queue) = self.store.set_random_member(&members_key).await? else {
                return Ok(None);
            };
            let probability = self.acceptance(group, &queue).await?;
            if self.roll() < probability {
                return Ok(Some(queue));
            }
            last_draw = Some(queue);
        }
        Ok(last_draw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::QueueRegistry;
    use crate::store::MemoryStore;

    async fn mark_pushed(store: &MemoryStore, queue: &str) {
        store.set_add(keys::QUEUES, queue).await.unwrap();
    }

    #[tokio::test]
    async fn test_forced_quick_start_serves_new_queues_in_activation_order() {
        let store = Arc::new(MemoryStore::new());
        let registry = QueueRegistry::new(store.clone());
        mark_pushed(&store, "first").await;
        mark_pushed(&store, "second").await;
        registry.activate("g", "first", 1.0).await.unwrap();
        registry.activate("g", "second", 1.0).await.unwrap();

        let policy = WeightedRandom::new(store.clone()).with_quick_start_factor(1.0);

        assert_eq!(policy.pick("g").await.unwrap().as_deref(), Some("first"));
        assert_eq!(store.list_len(keys::NEW_QUEUES).await.unwrap(), 1);
        assert_eq!(policy.pick("g").await.unwrap().as_deref(), Some("second"));
        assert_eq!(store.list_len(keys::NEW_QUEUES).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_quick_start_skips_queues_that_vanished() {
        let store = Arc::new(MemoryStore::new());
        let registry = QueueRegistry::new(store.clone());
        mark_pushed(&store, "gone").await;
        mark_pushed(&store, "alive").await;
        registry.activate("g", "gone", 1.0).await.unwrap();
        registry.activate("g", "alive", 1.0).await.unwrap();

        // "gone" was drained and removed before selection ever saw it.
        store.set_remove(keys::QUEUES, "gone").await.unwrap();

        let policy = WeightedRandom::new(store.clone()).with_quick_start_factor(1.0);

        assert_eq!(policy.pick("g").await.unwrap().as_deref(), Some("alive"));
        assert_eq!(store.list_len(keys::NEW_QUEUES).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_zero_factor_leaves_new_queue_list_alone() {
        let store = Arc::new(MemoryStore::new());
        let registry = QueueRegistry::new(store.clone());
        mark_pushed(&store, "q").await;
        registry.activate("g", "q", 1.0).await.unwrap();

        let policy = WeightedRandom::new(store.clone()).with_quick_start_factor(0.0);

        assert_eq!(policy.pick("g").await.unwrap().as_deref(), Some("q"));
        assert_eq!(store.list_len(keys::NEW_QUEUES).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_new_queue_list_falls_through_to_weighted_draw() {
        let store = Arc::new(MemoryStore::new());
        let registry = QueueRegistry::new(store.clone()).with_quick_start(false);
        mark_pushed(&store, "q").await;
        registry.activate("g", "q", 1.0).await.unwrap();

        let policy = WeightedRandom::new(store.clone()).with_quick_start_factor(1.0);
        assert_eq!(policy.pick("g").await.unwrap().as_deref(), Some("q"));
    }

    #[tokio::test]
    async fn test_zero_probability_queue_still_returned_after_budget() {
        let store = Arc::new(MemoryStore::new());
        let registry = QueueRegistry::new(store.clone()).with_quick_start(false);
        mark_pushed(&store, "unlucky").await;
        registry.activate("g", "unlucky", 0.0).await.unwrap();

        let policy = WeightedRandom::new(store.clone())
            .with_quick_start_factor(0.0)
            .with_random_attempts(5);

        assert_eq!(policy.pick("g").await.unwrap().as_deref(), Some("unlucky"));
    }

    #[tokio::test]
    async fn test_zero_attempt_budget_still_yields_a_member() {
        let store = Arc::new(MemoryStore::new());
        let registry = QueueRegistry::new(store.clone()).with_quick_start(false);
        mark_pushed(&store, "only").await;
        registry.activate("g", "only", 0.0).await.unwrap();

        let policy = WeightedRandom::new(store.clone())
            .with_quick_start_factor(0.0)
            .with_random_attempts(0);

        assert_eq!(policy.pick("g").await.unwrap().as_deref(), Some("only"));
    }

    #[tokio::test]
    async fn test_vanished_acceptance_record_scores_zero() {
        let store = Arc::new(MemoryStore::new());
        // Member set has a queue whose activation record is already gone.
        store.set_add(&keys::group_members("g"), "ghost").await.unwrap();

        let policy = WeightedRandom::new(store.clone())
            .with_quick_start_factor(0.0)
            .with_random_attempts(3);

        // Never accepted by probability, but the fallback still offers it.
        assert_eq!(policy.pick("g").await.unwrap().as_deref(), Some("ghost"));
    }

    #[tokio::test]
    async fn test_empty_group_yields_none() {
        let store = Arc::new(MemoryStore::new());
        let policy = WeightedRandom::new(store).with_quick_start_factor(0.0);
        assert_eq!(policy.pick("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_seeded_runs_repeat() {
        for _ in 0..2 {
            let store = Arc::new(MemoryStore::with_seed(11));
            let registry = QueueRegistry::new(store.clone()).with_quick_start(false);
            for queue in ["a", "b", "c"] {
                mark_pushed(&store, queue).await;
                registry.activate("g", queue, 0.5).await.unwrap();
            }
            let policy = WeightedRandom::new(store.clone())
                .with_quick_start_factor(0.0)
                .with_seed(42);

            let first = policy.pick("g").await.unwrap();
            let again = {
                let store = Arc::new(MemoryStore::with_seed(11));
                let registry = QueueRegistry::new(store.clone()).with_quick_start(false);
                for queue in ["a", "b", "c"] {
                    mark_pushed(&store, queue).await;
                    registry.activate("g", queue, 0.5).await.unwrap();
                }
                let policy = WeightedRandom::new(store)
                    .with_quick_start_factor(0.0)
                    .with_seed(42);
                policy.pick("g").await.unwrap()
            };
            assert_eq!(first, again);
        }
    }
}
