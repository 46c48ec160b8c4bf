//! Per-id write serialization
//!
//! A sharded table of async mutexes gives constant-overhead pessimistic
//! concurrency: writes to the same id serialize, writes to different ids
//! almost always proceed in parallel. Guards are held across store I/O on
//! purpose; that is the critical section that keeps cache and store
//! coherent.

use crate::types::MemoryId;
use std::hash::{Hash, Hasher};
use tokio::sync::{Mutex, MutexGuard};

/// Number of mutex shards; collisions only cost needless serialization
const LOCK_SHARD_COUNT: usize = 64;

/// Sharded map from record id to an async mutex
pub(crate) struct IdLockTable {
    shards: Vec<Mutex<()>>,
}

impl IdLockTable {
    pub fn new() -> Self {
        Self {
            shards: (0..LOCK_SHARD_COUNT).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Acquire the write lock covering `id`
    pub async fn lock(&self, id: &MemoryId) -> MutexGuard<'_, ()> {
        self.shards[Self::shard_index(id)].lock().await
    }

    fn shard_index(id: &MemoryId) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        id.hash(&mut hasher);
        (hasher.finish() % LOCK_SHARD_COUNT as u64) as usize
    }
}
