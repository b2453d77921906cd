//! In-memory webhook idempotency markers.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{MarkResult, ProcessedEventStore};

/// Marker set keyed by provider event id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProcessedEventStore {
    markers: Arc<RwLock<HashMap<String, Timestamp>>>,
}

impl InMemoryProcessedEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.markers.read().await.len()
    }

    /// Inserts a marker with an explicit processing time.
    pub async fn mark_at(&self, event_id: &str, processed_at: Timestamp) {
        self.markers
            .write()
            .await
            .insert(event_id.to_string(), processed_at);
    }
}

#[async_trait]
impl ProcessedEventStore for InMemoryProcessedEventStore {
    async fn contains(&self, event_id: &str) -> Result<bool, DomainError> {
        Ok(self.markers.read().await.contains_key(event_id))
    }

    async fn try_mark(&self, event_id: &str) -> Result<MarkResult, DomainError> {
        let mut markers = self.markers.write().await;
        if markers.contains_key(event_id) {
            return Ok(MarkResult::AlreadyExists);
        }
        markers.insert(event_id.to_string(), Timestamp::now());
        Ok(MarkResult::Inserted)
    }

    async fn unmark(&self, event_id: &str) -> Result<(), DomainError> {
        self.markers.write().await.remove(event_id);
        Ok(())
    }

    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, DomainError> {
        let mut markers = self.markers.write().await;
        let before = markers.len();
        markers.retain(|_, at| !at.is_before(&cutoff));
        Ok((before - markers.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_mark_reports_existing() {
        let store = InMemoryProcessedEventStore::new();
        assert_eq!(store.try_mark("evt_1").await.unwrap(), MarkResult::Inserted);
        assert_eq!(store.try_mark("evt_1").await.unwrap(), MarkResult::AlreadyExists);
        assert!(store.contains("evt_1").await.unwrap());
    }

    #[tokio::test]
    async fn unmark_allows_reprocessing() {
        let store = InMemoryProcessedEventStore::new();
        store.try_mark("evt_1").await.unwrap();
        store.unmark("evt_1").await.unwrap();
        assert!(!store.contains("evt_1").await.unwrap());
        assert_eq!(store.try_mark("evt_1").await.unwrap(), MarkResult::Inserted);
    }

    #[tokio::test]
    async fn concurrent_marks_admit_exactly_one() {
        let store = InMemoryProcessedEventStore::new();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let s = store.clone();
                tokio::spawn(async move { s.try_mark("evt_race").await.unwrap() })
            })
            .collect();

        let mut inserted = 0;
        for h in handles {
            if h.await.unwrap() == MarkResult::Inserted {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
    }

    #[tokio::test]
    async fn delete_before_drops_only_old_markers() {
        let store = InMemoryProcessedEventStore::new();
        let now = Timestamp::now();
        store.mark_at("old", now.add_days(-40)).await;
        store.mark_at("recent", now.add_days(-1)).await;

        let removed = store.delete_before(now.add_days(-30)).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.contains("recent").await.unwrap());
        assert!(!store.contains("old").await.unwrap());
    }
}
