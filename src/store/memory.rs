//! In-process queue store.
//!
//! Backs the full scheduling stack with plain maps behind a mutex, which is
//! enough to run every test and local experiment without a Redis server. The
//! mutex is held only for the duration of one primitive call, mirroring the
//! per-command atomicity the Redis backend provides.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use super::{QueueStore, StoreError};

#[derive(Default)]
struct Tables {
    lists: HashMap<String, VecDeque<String>>,
    sets: HashMap<String, BTreeSet<String>>,
    hashes: HashMap<String, HashMap<String, String>>,
}

/// In-memory implementation of [`QueueStore`].
pub struct MemoryStore {
    tables: Mutex<Tables>,
    rng: Mutex<ChaCha8Rng>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store with an entropy-seeded random source.
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            rng: Mutex::new(ChaCha8Rng::from_rng(&mut rand::rng())),
        }
    }

    /// Creates an empty store whose random-member draws are reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    fn lock_tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().expect("lock not poisoned")
    }
}

#[async_trait]
impl QueueStore for MemoryStore {
    async fn list_push(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut tables = self.lock_tables();
        tables
            .lists
            .entry(key.to_string())
            .or_default()
            .push_back(value.to_string());
        Ok(())
    }

    async fn list_pop(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut tables = self.lock_tables();
        let Some(list) = tables.lists.get_mut(key) else {
            return Ok(None);
        };
        let value = list.pop_front();
        if list.is_empty() {
            // Redis drops empty keys
            tables.lists.remove(key);
        }
        Ok(value)
    }

    async fn list_len(&self, key: &str) -> Result<usize, StoreError> {
        let tables = self.lock_tables();
        Ok(tables.lists.get(key).map_or(0, VecDeque::len))
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut tables = self.lock_tables();
        tables
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut tables = self.lock_tables();
        if let Some(set) = tables.sets.get_mut(key) {
            set.remove(member);
            if set.is_empty() {
                tables.sets.remove(key);
            }
        }
        Ok(())
    }

    async fn set_random_member(&self, key: &str) -> Result<Option<String>, StoreError> {
        let tables = self.lock_tables();
        let Some(set) = tables.sets.get(key) else {
            return Ok(None);
        };
        if set.is_empty() {
            return Ok(None);
        }
        let index = {
            let mut rng = self.rng.lock().expect("lock not poisoned");
            rng.random_range(0..set.len())
        };
        Ok(set.iter().nth(index).cloned())
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let tables = self.lock_tables();
        Ok(tables.sets.get(key).is_some_and(|s| s.contains(member)))
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let tables = self.lock_tables();
        Ok(tables
            .sets
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn set_len(&self, key: &str) -> Result<usize, StoreError> {
        let tables = self.lock_tables();
        Ok(tables.sets.get(key).map_or(0, BTreeSet::len))
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut tables = self.lock_tables();
        tables
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let tables = self.lock_tables();
        Ok(tables
            .hashes
            .get(key)
            .and_then(|h| h.get(field))
            .cloned())
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let tables = self.lock_tables();
        Ok(tables.hashes.get(key).cloned().unwrap_or_default())
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<(), StoreError> {
        let mut tables = self.lock_tables();
        if let Some(hash) = tables.hashes.get_mut(key) {
            hash.remove(field);
            if hash.is_empty() {
                tables.hashes.remove(key);
            }
        }
        Ok(())
    }

    async fn hash_increment(&self, key: &str, field: &str, by: i64) -> Result<i64, StoreError> {
        let mut tables = self.lock_tables();
        let hash = tables.hashes.entry(key.to_string()).or_default();
        let current = hash
            .get(field)
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0);
        let next = current + by;
        hash.insert(field.to_string(), next.to_string());
        Ok(next)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut tables = self.lock_tables();
        tables.lists.remove(key);
        tables.sets.remove(key);
        tables.hashes.remove(key);
        Ok(())
    }
}
