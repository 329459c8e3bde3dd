//! dynq: Dynamic weighted multi-queue scheduling over a shared store.
//!
//! Queues are created on the fly, filled, activated into named groups, and
//! drained by workers that pick among a group's queues according to a
//! configurable selection policy. An activated queue accepts no further
//! pushes and is retired automatically once a worker empties it.

// Core modules
pub mod cli;
pub mod clock;
pub mod keys;
pub mod policy;
pub mod registry;
pub mod scheduler;
pub mod store;
pub mod worker;

// Re-export the types most callers need
pub use clock::{Clock, ManualClock, SystemClock};
pub use policy::{
    PolicyKind, PriorityDirection, PriorityScore, SelectionPolicy, ThroughputSpeed, WeightedRandom,
};
pub use registry::{QueueMeta, QueueRegistry, DEFAULT_PARAMETER};
pub use scheduler::{QueueTarget, Scheduler, SchedulerConfig, SchedulerError};
pub use store::{MemoryStore, QueueStore, RedisStore, StoreError};
pub use worker::{JobHandler, Worker, WorkerStats, WorkerStatsSnapshot};
