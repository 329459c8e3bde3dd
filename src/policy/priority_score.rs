//! Throughput-score selection.

use std::sync::Arc;

use async_trait::async_trait;

use super::{snapshot_group, QueueSample, SelectionPolicy};
use crate::clock::{Clock, SystemClock};
use crate::store::{QueueStore, StoreError};

/// Whether the best score wins or the worst score wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityDirection {
    /// Keep the fastest-progressing queue busy.
    HighestFirst,
    /// Service the most neglected queue first.
    LowestFirst,
}

impl Default for PriorityDirection {
    fn default() -> Self {
        Self::HighestFirst
    }
}

impl std::fmt::Display for PriorityDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PriorityDirection::HighestFirst => "highest-first",
            PriorityDirection::LowestFirst => "lowest-first",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for PriorityDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "highest-first" | "highest" | "high" => Ok(PriorityDirection::HighestFirst),
            "lowest-first" | "lowest" | "low" => Ok(PriorityDirection::LowestFirst),
            other => Err(format!("Unknown priority direction: {}", other)),
        }
    }
}

/// Scores each member by units worked per second since activation and picks
/// by score.
///
/// The score of a queue that has done no work is zero, and elapsed time is
/// clamped to a minimum of one second, so a scoring pass immediately after
/// activation is well defined.
pub struct PriorityScore {
    store: Arc<dyn QueueStore>,
    clock: Arc<dyn Clock>,
    direction: PriorityDirection,
}

impl PriorityScore {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn QueueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            direction: PriorityDirection::default(),
        }
    }

    /// Sets which end of the score range wins selection.
    pub fn with_direction(mut self, direction: PriorityDirection) -> Self {
        self.direction = direction;
        self
    }

    fn score(sample: &QueueSample, now: f64) -> f64 {
        let elapsed = (now - sample.meta.activated_at).max(1.0);
        sample.work.unwrap_or(0.0) / elapsed
    }
}

#[async_trait]
impl SelectionPolicy for PriorityScore {
    async fn pick(&self, group: &str) -> Result<Option<String>, StoreError> {
        let samples = snapshot_group(self.store.as_ref(), group).await?;
        let now = self.clock.now();

        // Strict comparison against name-sorted samples keeps ties stable.
        let mut best: Option<(&QueueSample, f64)> = None;
        for sample in &samples {
            let score = Self::score(sample, now);
            let wins = match (&best, self.direction) {
                (None, _) => true,
                (Some((_, top)), PriorityDirection::HighestFirst) => score > *top,
                (Some((_, top)), PriorityDirection::LowestFirst) => score < *top,
            };
            if wins {
                best = Some((sample, score));
            }
        }
        Ok(best.map(|(sample, _)| sample.name.clone()))
    }
}
