//! Speed-normalized selection.

use std::sync::Arc;

use async_trait::async_trait;

use super::{snapshot_group, QueueSample, SelectionPolicy};
use crate::clock::{Clock, SystemClock};
use crate::keys;
use crate::store::{QueueStore, StoreError};

/// Picks the queue most behind the pace its activation parameter declares.
///
/// Each member is scored as `work / (elapsed * speed)` and the lowest score
/// wins. A queue that has done no work scores zero and is therefore drained
/// first; a queue whose work counter is missing entirely scores infinity and
/// is drained last.
pub struct ThroughputSpeed {
    store: Arc<dyn QueueStore>,
    clock: Arc<dyn Clock>,
}

impl ThroughputSpeed {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn QueueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn score(sample: &QueueSample, now: f64) -> f64 {
        let work = sample.work.unwrap_or(f64::INFINITY);
        if work == 0.0 {
            return 0.0;
        }
        // A zero or tiny elapsed time pushes the score to infinity, which
        // just means the queue is already ahead of schedule.
        work / ((now - sample.meta.activated_at) * sample.meta.param)
    }

    /// Units of work drained from `queue` since activation, or `None` for
    /// queues outside any group. Exposed for observability.
    pub async fn units_worked(&self, queue: &str) -> Result<Option<i64>, StoreError> {
        let Some(group) = self.store.hash_get(keys::GROUP_LOOKUP, queue).await? else {
            return Ok(None);
        };
        let raw = self.store.hash_get(&keys::group_work(&group), queue).await?;
        Ok(Some(raw.and_then(|v| v.parse::<i64>().ok()).unwrap_or(0)))
    }
}

#[async_trait]
impl SelectionPolicy for ThroughputSpeed {
    async fn pick(&self, group: &str) -> Result<Option<String>, StoreError> {
        let samples = snapshot_group(self.store.as_ref(), group).await?;
        let now = self.clock.now();

        let mut best: Option<(&QueueSample, f64)> = None;
        for sample in &samples {
            let score = Self::score(sample, now);
            let wins = match &best {
                None => true,
                Some((_, low)) => score < *low,
            };
            if wins {
                best = Some((sample, score));
            }
        }
        Ok(best.map(|(sample, _)| sample.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::registry::QueueRegistry;
    use crate::store::MemoryStore;

    async fn setup() -> (Arc<MemoryStore>, Arc<ManualClock>, QueueRegistry) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(0.0));
        let registry = QueueRegistry::with_clock(store.clone(), clock.clone());
        (store, clock, registry)
    }

    #[tokio::test]
    async fn test_fresh_queue_is_drained_first() {
        let (store, clock, registry) = setup().await;
        registry.activate("g", "worked", 1.0).await.unwrap();
        registry.activate("g", "fresh", 1.0).await.unwrap();
        clock.advance(10.0);
        registry.increment_work("worked").await.unwrap();

        let policy = ThroughputSpeed::with_clock(store, clock);
        assert_eq!(policy.pick("g").await.unwrap().as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_slower_queue_wins_once_both_have_worked() {
        let (store, clock, registry) = setup().await;
        registry.activate("g", "ahead", 1.0).await.unwrap();
        registry.activate("g", "behind", 1.0).await.unwrap();
        clock.advance(10.0);

        for _ in 0..8 {
            registry.increment_work("ahead").await.unwrap();
        }
        registry.increment_work("behind").await.unwrap();

        let policy = ThroughputSpeed::with_clock(store, clock);
        assert_eq!(policy.pick("g").await.unwrap().as_deref(), Some("behind"));
    }

    #[tokio::test]
    async fn test_speed_parameter_normalizes_the_score() {
        let (store, clock, registry) = setup().await;
        // Same work, but "fast" is declared four times quicker, so its
        // normalized progress is lower and it should be picked.
        registry.activate("g", "fast", 4.0).await.unwrap();
        registry.activate("g", "slow", 1.0).await.unwrap();
        clock.advance(10.0);

        for queue in ["fast", "slow"] {
            for _ in 0..4 {
                registry.increment_work(queue).await.unwrap();
            }
        }

        let policy = ThroughputSpeed::with_clock(store, clock);
        assert_eq!(policy.pick("g").await.unwrap().as_deref(), Some("fast"));
    }

    #[tokio::test]
    async fn test_missing_counter_scores_last() {
        let (store, clock, registry) = setup().await;
        registry.activate("g", "tracked", 1.0).await.unwrap();
        clock.advance(10.0);
        for _ in 0..100 {
            registry.increment_work("tracked").await.unwrap();
        }

        // A member with an activation record but no counter field.
        store
            .hash_set(
                &keys::group_meta("g"),
                "untracked",
                r#"{"activated_at":0.0,"param":1.0}"#,
            )
            .await
            .unwrap();

        let policy = ThroughputSpeed::with_clock(store, clock);
        assert_eq!(policy.pick("g").await.unwrap().as_deref(), Some("tracked"));
    }

    #[tokio::test]
    async fn test_units_worked_accessor() {
        let (store, clock, registry) = setup().await;
        registry.activate("g", "q", 1.0).await.unwrap();
        registry.increment_work("q").await.unwrap();
        registry.increment_work("q").await.unwrap();

        let policy = ThroughputSpeed::with_clock(store, clock);
        assert_eq!(policy.units_worked("q").await.unwrap(), Some(2));
        assert_eq!(policy.units_worked("ungrouped").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_group_yields_none() {
        let (store, clock, _) = setup().await;
        let policy = ThroughputSpeed::with_clock(store, clock);
        assert_eq!(policy.pick("nobody").await.unwrap(), None);
    }
}
