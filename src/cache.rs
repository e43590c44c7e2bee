//! Time-bounded in-memory cache for identity lookups
//!
//! Entries older than the TTL are treated as absent and evicted on access, so a
//! rotated handle or moved PDS is picked up within one TTL.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, (V, Instant)>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// A zero TTL disables caching entirely
    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        if !self.is_enabled() {
            return None;
        }

        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((value, stored_at)) if stored_at.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub async fn insert(&self, key: K, value: V) {
        if !self.is_enabled() {
            return;
        }
        self.entries.lock().await.insert(key, (value, Instant::now()));
    }

    /// Drop every expired entry
    pub async fn purge_expired(&self) {
        let ttl = self.ttl;
        self.entries
            .lock()
            .await
            .retain(|_, (_, stored_at)| stored_at.elapsed() < ttl);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
