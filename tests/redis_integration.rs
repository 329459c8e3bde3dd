//! Integration tests for the Redis-backed store.
//!
//! These tests need a running Redis server and are ignored by default.
//! Run with: DYNQ_TEST_REDIS_URL=redis://localhost:6379 cargo test --test redis_integration -- --ignored
//!
//! Every test works on uniquely named queues and groups and uses a zero
//! quick-start factor, so suites can run in parallel against one server
//! without touching each other's state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dynq::{
    PolicyKind, QueueStore, QueueTarget, RedisStore, Scheduler, SchedulerConfig, SchedulerError,
};

fn test_redis_url() -> String {
    std::env::var("DYNQ_TEST_REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

async fn connect() -> RedisStore {
    RedisStore::connect(&test_redis_url())
        .await
        .expect("Redis must be reachable for integration tests")
}

/// Unique name per call so parallel tests never share keys.
fn unique(prefix: &str) -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    format!(
        "it-{}-{}-{}",
        prefix,
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

fn isolated_config() -> SchedulerConfig {
    SchedulerConfig::new().with_quick_start_factor(0.0)
}

#[tokio::test]
#[ignore] // Run with: cargo test --test redis_integration -- --ignored
async fn test_store_primitives_round_trip() {
    let store = connect().await;
    let list = unique("list");
    let set = unique("set");
    let hash = unique("hash");

    store.list_push(&list, "a").await.unwrap();
    store.list_push(&list, "b").await.unwrap();
    assert_eq!(store.list_len(&list).await.unwrap(), 2);
    assert_eq!(store.list_pop(&list).await.unwrap().as_deref(), Some("a"));

    store.set_add(&set, "m1").await.unwrap();
    assert!(store.set_contains(&set, "m1").await.unwrap());
    assert_eq!(
        store.set_random_member(&set).await.unwrap().as_deref(),
        Some("m1")
    );
    store.set_remove(&set, "m1").await.unwrap();
    assert_eq!(store.set_len(&set).await.unwrap(), 0);

    store.hash_set(&hash, "f", "1").await.unwrap();
    assert_eq!(store.hash_get(&hash, "f").await.unwrap().as_deref(), Some("1"));
    assert_eq!(store.hash_increment(&hash, "f", 2).await.unwrap(), 3);
    let all = store.hash_get_all(&hash).await.unwrap();
    assert_eq!(all.get("f").map(String::as_str), Some("3"));
    store.hash_delete(&hash, "f").await.unwrap();
    assert_eq!(store.hash_get(&hash, "f").await.unwrap(), None);

    store.delete(&list).await.unwrap();
    assert_eq!(store.list_len(&list).await.unwrap(), 0);
}

#[tokio::test]
#[ignore]
async fn test_activation_closes_queue_and_drain_retires_it() {
    let store = Arc::new(connect().await);
    let scheduler = Scheduler::new(store.clone(), isolated_config());
    let group = unique("group");
    let queue = unique("queue");

    scheduler.guarded_push(&queue, "one").await.unwrap();
    scheduler.guarded_push(&queue, "two").await.unwrap();
    scheduler.activate(&group, &queue, 1.0).await.unwrap();

    let err = scheduler.guarded_push(&queue, "three").await.unwrap_err();
    assert!(matches!(err, SchedulerError::ClosedQueue(_)));

    assert_eq!(
        scheduler.guarded_pop(&queue).await.unwrap().as_deref(),
        Some("one")
    );
    assert_eq!(
        scheduler.registry().group_queues(&group).await.unwrap(),
        vec![queue.clone()]
    );

    assert_eq!(
        scheduler.guarded_pop(&queue).await.unwrap().as_deref(),
        Some("two")
    );
    assert_eq!(scheduler.registry().group_of(&queue).await.unwrap(), None);
    assert!(scheduler
        .registry()
        .group_queues(&group)
        .await
        .unwrap()
        .is_empty());
    assert!(!store.set_contains(dynq::keys::QUEUES, &queue).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn test_group_drain_consumes_everything() {
    let scheduler = Scheduler::new(Arc::new(connect().await), isolated_config());
    let group = unique("group");
    let fast = unique("fast");
    let slow = unique("slow");

    for i in 0..20 {
        scheduler
            .guarded_push(&fast, &format!("f-{}", i))
            .await
            .unwrap();
    }
    for i in 0..5 {
        scheduler
            .guarded_push(&slow, &format!("s-{}", i))
            .await
            .unwrap();
    }
    scheduler.activate(&group, &fast, 1.0).await.unwrap();
    scheduler.activate(&group, &slow, 0.25).await.unwrap();

    let target = QueueTarget::parse(&format!("@{}", group));
    let mut drained = 0;
    loop {
        let candidates = scheduler.resolve(&target).await.unwrap();
        if candidates.is_empty() {
            break;
        }
        for queue in candidates {
            if scheduler.guarded_pop(&queue).await.unwrap().is_some() {
                scheduler.registry().increment_work(&queue).await.unwrap();
                drained += 1;
            }
        }
    }

    assert_eq!(drained, 25);
    assert!(scheduler
        .registry()
        .group_queues(&group)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
#[ignore]
async fn test_scheduling_state_is_shared_across_connections() {
    let group = unique("group");
    let queue = unique("queue");

    let writer = Scheduler::new(Arc::new(connect().await), isolated_config());
    writer.guarded_push(&queue, "payload").await.unwrap();
    writer.activate(&group, &queue, 0.5).await.unwrap();
    writer.registry().increment_work(&queue).await.unwrap();

    // A second connection, as another worker process would open.
    let reader = Scheduler::new(
        Arc::new(connect().await),
        isolated_config().with_policy(PolicyKind::ThroughputSpeed),
    );
    assert_eq!(
        reader.registry().group_of(&queue).await.unwrap().as_deref(),
        Some(group.as_str())
    );
    assert_eq!(
        reader.registry().units_worked(&queue).await.unwrap(),
        Some(1)
    );
    let meta = reader.registry().meta(&queue).await.unwrap().unwrap();
    assert_eq!(meta.param, 0.5);

    // Drain through the reader; the queue retires for both.
    assert!(reader.guarded_pop(&queue).await.unwrap().is_some());
    assert_eq!(writer.registry().group_of(&queue).await.unwrap(), None);
}
