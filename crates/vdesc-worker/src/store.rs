//! Bounded in-memory tables keyed by task id.
//!
//! Entries become evictable once they report a settle time. Evictable
//! entries older than the TTL are purged, and when the table grows past its
//! capacity the longest-settled entries go first. Entries that have not
//! settled (running tasks) are never evicted.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use vdesc_models::TaskId;

/// Values that may be evicted after they settle.
pub trait Expiring {
    /// When the entry became eligible for eviction, if it has.
    fn settled_at(&self) -> Option<DateTime<Utc>>;
}

/// TTL- and capacity-bounded map.
pub struct TtlTable<V> {
    entries: RwLock<HashMap<TaskId, V>>,
    ttl: Duration,
    capacity: usize,
}

impl<V: Expiring + Clone> TtlTable<V> {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub async fn get(&self, id: &TaskId) -> Option<V> {
        self.entries.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &TaskId) -> bool {
        self.entries.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Insert or replace an entry.
    pub async fn insert(&self, id: TaskId, value: V) {
        let mut entries = self.entries.write().await;
        entries.insert(id, value);
        self.enforce_capacity(&mut entries);
    }

    /// Insert only when no entry exists; returns whether it was inserted.
    pub async fn insert_if_absent(&self, id: TaskId, value: V) -> bool {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&id) {
            return false;
        }
        entries.insert(id, value);
        self.enforce_capacity(&mut entries);
        true
    }

    /// Mutate an entry in place under the write lock.
    pub async fn update<R>(&self, id: &TaskId, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        let mut entries = self.entries.write().await;
        entries.get_mut(id).map(f)
    }

    /// Remove settled entries older than the TTL.
    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now()).await
    }

    pub async fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        let ttl = self.ttl;

        entries.retain(|_, value| match value.settled_at() {
            Some(settled) => (now - settled).to_std().map_or(true, |age| age < ttl),
            None => true,
        });

        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "Purged expired entries");
        }
        removed
    }

    fn enforce_capacity(&self, entries: &mut HashMap<TaskId, V>) {
        if entries.len() <= self.capacity {
            return;
        }

        let mut settled: Vec<_> = entries
            .iter()
            .filter_map(|(id, v)| v.settled_at().map(|t| (id.clone(), t)))
            .collect();
        settled.sort_by_key(|(_, t)| *t);

        let excess = entries.len() - self.capacity;
        let mut removed = 0;
        for (id, _) in settled.into_iter().take(excess) {
            entries.remove(&id);
            removed += 1;
        }

        if removed > 0 {
            warn!("Table exceeded capacity, removed {} settled entries", removed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Entry(Option<DateTime<Utc>>);

    impl Expiring for Entry {
        fn settled_at(&self) -> Option<DateTime<Utc>> {
            self.0
        }
    }

    fn id(s: &str) -> TaskId {
        TaskId::from_string(s)
    }

    #[tokio::test]
    async fn test_purge_keeps_unsettled_and_fresh_entries() {
        let table = TtlTable::new(Duration::from_secs(60), 100);
        let now = Utc::now();

        table.insert(id("running"), Entry(None)).await;
        table.insert(id("fresh"), Entry(Some(now - chrono::Duration::seconds(10)))).await;
        table.insert(id("stale"), Entry(Some(now - chrono::Duration::seconds(120)))).await;

        assert_eq!(table.purge_expired_at(now).await, 1);
        assert!(table.contains(&id("running")).await);
        assert!(table.contains(&id("fresh")).await);
        assert!(!table.contains(&id("stale")).await);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest_settled_first() {
        let table = TtlTable::new(Duration::from_secs(3600), 2);
        let now = Utc::now();

        table.insert(id("old"), Entry(Some(now - chrono::Duration::seconds(30)))).await;
        table.insert(id("running"), Entry(None)).await;
        table.insert(id("new"), Entry(Some(now))).await;

        assert_eq!(table.len().await, 2);
        assert!(!table.contains(&id("old")).await);
        assert!(table.contains(&id("running")).await);
    }

    #[tokio::test]
    async fn test_capacity_never_evicts_unsettled() {
        let table = TtlTable::new(Duration::from_secs(3600), 1);
        table.insert(id("a"), Entry(None)).await;
        table.insert(id("b"), Entry(None)).await;
        assert_eq!(table.len().await, 2);
    }

    #[tokio::test]
    async fn test_insert_if_absent() {
        let table = TtlTable::new(Duration::from_secs(60), 10);
        assert!(table.insert_if_absent(id("x"), Entry(None)).await);
        assert!(!table.insert_if_absent(id("x"), Entry(Some(Utc::now()))).await);
        assert!(table.get(&id("x")).await.unwrap().0.is_none());
    }
}
