//! Storage adapter for the scheduling state.
//!
//! The scheduler never talks to a store client directly; it consumes the
//! small set of list/set/hash primitives below through the [`QueueStore`]
//! trait. Two implementations ship:
//!
//! - [`RedisStore`]: production backend over a Redis connection manager
//! - [`MemoryStore`]: in-process backend for tests and local experimentation
//!
//! Every method maps to a single store command, so each call is atomic at the
//! store level. Anything built from several calls (activation, retirement,
//! the pop-then-check emptiness probe) is deliberately not transactional; the
//! scheduling layer is designed to tolerate the resulting races.

pub mod memory;
pub mod redis;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;
pub use redis::RedisStore;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to connect to the backing store.
    #[error("store connection failed: {0}")]
    ConnectionFailed(String),

    /// A store command failed.
    #[error("Redis operation failed: {0}")]
    Redis(#[from] ::redis::RedisError),

    /// A stored metadata value could not be decoded.
    #[error("malformed queue metadata: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// List, set, and hash primitives consumed by the scheduling layer.
///
/// Implementations must make each method atomic on its own, the way a single
/// Redis command is; no method may assume another was observed first.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Appends a value to the tail of a list.
    async fn list_push(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Pops the head of a list, or `None` when the list is empty or missing.
    async fn list_pop(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Returns the length of a list (0 for a missing key).
    async fn list_len(&self, key: &str) -> Result<usize, StoreError>;

    /// Adds a member to a set.
    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError>;

    /// Removes a member from a set.
    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError>;

    /// Returns one uniformly random member, or `None` for an empty set.
    async fn set_random_member(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Returns whether a member is in a set.
    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// Returns every member of a set, in no particular order.
    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Returns the cardinality of a set (0 for a missing key).
    async fn set_len(&self, key: &str) -> Result<usize, StoreError>;

    /// Writes a hash field.
    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;

    /// Reads a hash field, or `None` when absent.
    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;

    /// Reads every field of a hash (empty map for a missing key).
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    /// Deletes a hash field.
    async fn hash_delete(&self, key: &str, field: &str) -> Result<(), StoreError>;

    /// Atomically increments an integer hash field, returning the new value.
    /// A missing field counts as 0.
    async fn hash_increment(&self, key: &str, field: &str, by: i64) -> Result<i64, StoreError>;

    /// Deletes a key of any type.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
