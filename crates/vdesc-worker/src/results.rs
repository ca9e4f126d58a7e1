//! Write-once store of finished analysis results.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;
use vdesc_models::{AnalysisResult, TaskId};

use crate::store::{Expiring, TtlTable};

#[derive(Debug, Clone)]
struct StoredResult {
    result: AnalysisResult,
    stored_at: DateTime<Utc>,
}

impl Expiring for StoredResult {
    fn settled_at(&self) -> Option<DateTime<Utc>> {
        Some(self.stored_at)
    }
}

/// Results keyed by task id. A result is immutable once stored.
#[derive(Clone)]
pub struct ResultStore {
    results: Arc<TtlTable<StoredResult>>,
}

impl ResultStore {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            results: Arc::new(TtlTable::new(ttl, capacity)),
        }
    }

    /// Store the result for `id`; a second write for the same id is ignored.
    pub async fn put(&self, id: &TaskId, result: AnalysisResult) -> bool {
        let stored = StoredResult {
            result,
            stored_at: Utc::now(),
        };
        let inserted = self.results.insert_if_absent(id.clone(), stored).await;
        if !inserted {
            warn!(task_id = %id, "Result already stored, ignoring second write");
        }
        inserted
    }

    pub async fn get(&self, id: &TaskId) -> Option<AnalysisResult> {
        self.results.get(id).await.map(|s| s.result)
    }

    pub async fn purge_expired(&self) -> usize {
        self.results.purge_expired().await
    }

    pub async fn len(&self) -> usize {
        self.results.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.results.is_empty().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_once() {
        let store = ResultStore::new(Duration::from_secs(60), 10);
        let id = TaskId::new();

        assert!(store.put(&id, AnalysisResult::error("first")).await);
        assert!(!store.put(&id, AnalysisResult::error("second")).await);

        assert_eq!(store.get(&id).await, Some(AnalysisResult::error("first")));
    }

    #[tokio::test]
    async fn test_zero_ttl_purges_everything() {
        let store = ResultStore::new(Duration::ZERO, 10);
        store.put(&TaskId::new(), AnalysisResult::error("x")).await;
        assert_eq!(store.purge_expired().await, 1);
        assert!(store.is_empty().await);
    }
}
