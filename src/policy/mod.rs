//! Queue selection policies.
//!
//! A policy answers one question: given a queue group, which member queue
//! should a worker drain next? Three interchangeable answers are provided:
//!
//! - [`PriorityScore`]: pick by accumulated throughput since activation.
//! - [`WeightedRandom`]: pick randomly, weighted by per-queue probability,
//!   with a quick-start bias toward never-selected queues.
//! - [`ThroughputSpeed`]: pick the queue most under-served relative to its
//!   declared speed.
//!
//! Policies read live counters on every call and never block. They also
//! never mutate group membership; retirement of drained queues happens in
//! the scheduler's pop path.

pub mod priority_score;
pub mod throughput_speed;
pub mod weighted_random;

pub use priority_score::{PriorityDirection, PriorityScore};
pub use throughput_speed::ThroughputSpeed;
pub use weighted_random::WeightedRandom;

use async_trait::async_trait;

use crate::keys;
use crate::registry::QueueMeta;
use crate::store::{QueueStore, StoreError};

/// Chooses which queue of a group to drain next.
#[async_trait]
pub trait SelectionPolicy: Send + Sync {
    /// Returns one queue from `group`, or `None` when the group has no
    /// members to offer.
    async fn pick(&self, group: &str) -> Result<Option<String>, StoreError>;

    /// Repeats [`pick`](Self::pick) up to `n` times and de-duplicates,
    /// preserving pick order. Callers use the extra names purely to reduce
    /// the chance of landing on a queue another worker just emptied.
    async fn pick_n(&self, group: &str, n: usize) -> Result<Vec<String>, StoreError> {
        let mut picked = Vec::new();
        for _ in 0..n {
            if let Some(queue) = self.pick(group).await? {
                if !picked.contains(&queue) {
                    picked.push(queue);
                }
            }
        }
        Ok(picked)
    }
}

/// Identifies one of the built-in selection policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    /// Score queues by work done per second and pick by score.
    PriorityScore,
    /// Weighted random draw with quick-start bias.
    WeightedRandom,
    /// Pick the queue furthest behind its declared speed.
    ThroughputSpeed,
}

impl PolicyKind {
    /// Returns the canonical name for this policy.
    pub fn name(&self) -> &'static str {
        match self {
            PolicyKind::PriorityScore => "priority-score",
            PolicyKind::WeightedRandom => "weighted-random",
            PolicyKind::ThroughputSpeed => "throughput-speed",
        }
    }
}

impl Default for PolicyKind {
    fn default() -> Self {
        Self::WeightedRandom
    }
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "priority-score" | "priorityscore" | "priority" => Ok(PolicyKind::PriorityScore),
            "weighted-random" | "weightedrandom" | "random" => Ok(PolicyKind::WeightedRandom),
            "throughput-speed" | "throughputspeed" | "throughput" | "speed" => {
                Ok(PolicyKind::ThroughputSpeed)
            }
            other => Err(format!("Unknown selection policy: {}", other)),
        }
    }
}

/// One group member as seen by a scoring pass.
pub(crate) struct QueueSample {
    pub(crate) name: String,
    pub(crate) meta: QueueMeta,
    /// Units worked, `None` when the counter field is missing.
    pub(crate) work: Option<f64>,
}

/// Reads every member's activation record and work counter in one pass.
/// Samples come back sorted by name so score ties break deterministically.
pub(crate) async fn snapshot_group(
    store: &dyn QueueStore,
    group: &str,
) -> Result<Vec<QueueSample>, StoreError> {
    let meta_table = store.hash_get_all(&keys::group_meta(group)).await?;
    if meta_table.is_empty() {
        return Ok(Vec::new());
    }
    let work_table = store.hash_get_all(&keys::group_work(group)).await?;

    let mut samples = Vec::with_capacity(meta_table.len());
    for (name, raw) in meta_table {
        let meta: QueueMeta = serde_json::from_str(&raw)?;
        let work = work_table
            .get(&name)
            .map(|v| v.parse::<f64>().unwrap_or(0.0));
        samples.push(QueueSample { name, meta, work });
    }
    samples.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(samples)
}
