//! Scheduler configuration.

use crate::policy::weighted_random::{DEFAULT_QUICK_START_FACTOR, DEFAULT_RANDOM_ATTEMPTS};
use crate::policy::{PolicyKind, PriorityDirection};

/// Default number of queue names one group resolution returns.
pub const DEFAULT_NUMBER_OF_QUEUES: usize = 1;

/// Tunable knobs for the scheduler and its selection policy.
///
/// One name per resolution is conceptually enough because drained queues are
/// retired immediately. Selection and pop are still two separate store calls,
/// so a busy system can hand out a queue another worker just emptied; asking
/// for more names per resolution shrinks that window at the cost of extra
/// store round-trips.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Which selection policy resolves group targets.
    pub policy: PolicyKind,
    /// Maximum distinct queue names returned per group resolution.
    pub number_of_queues: usize,
    /// Weighted-draw attempt budget (weighted random only).
    pub random_attempts: u32,
    /// Fraction of selections biased toward brand-new queues
    /// (weighted random only).
    pub quick_start_factor: f64,
    /// Which end of the score range wins (priority score only).
    pub priority_direction: PriorityDirection,
    /// Fixed seed for the selection random source. Leave unset outside of
    /// tests and experiments.
    pub selection_seed: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::default(),
            number_of_queues: DEFAULT_NUMBER_OF_QUEUES,
            random_attempts: DEFAULT_RANDOM_ATTEMPTS,
            quick_start_factor: DEFAULT_QUICK_START_FACTOR,
            priority_direction: PriorityDirection::default(),
            selection_seed: None,
        }
    }
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: PolicyKind) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_number_of_queues(mut self, count: usize) -> Self {
        self.number_of_queues = count;
        self
    }

    pub fn with_random_attempts(mut self, attempts: u32) -> Self {
        self.random_attempts = attempts;
        self
    }

    pub fn with_quick_start_factor(mut self, factor: f64) -> Self {
        self.quick_start_factor = factor;
        self
    }

    pub fn with_priority_direction(mut self, direction: PriorityDirection) -> Self {
        self.priority_direction = direction;
        self
    }

    pub fn with_selection_seed(mut self, seed: u64) -> Self {
        self.selection_seed = Some(seed);
        self
    }
}
