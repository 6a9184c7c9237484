use crate::core::entry::CanonicalEntry;
use crate::core::rates::ProviderId;
use crate::core::store::EntryStore;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// In-memory entry store, keyed per provider by formatted timestamp
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<ProviderId, BTreeMap<String, CanonicalEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntryStore for MemoryStore {
    async fn store(&self, entry: CanonicalEntry, source: ProviderId) -> Result<()> {
        let mut entries = self.inner.lock().await;
        let partition = entries.entry(source).or_default();
        if partition.contains_key(&entry.timestamp) {
            warn!(%source, timestamp = %entry.timestamp, "Entry already stored, keeping the original");
            return Ok(());
        }
        debug!(%source, timestamp = %entry.timestamp, "Entry PUT");
        partition.insert(entry.timestamp.clone(), entry);
        Ok(())
    }

    async fn entries(&self, source: ProviderId) -> Result<Vec<CanonicalEntry>> {
        let entries = self.inner.lock().await;
        Ok(entries
            .get(&source)
            .map(|p| p.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(timestamp: &str, usd: f64) -> CanonicalEntry {
        CanonicalEntry {
            timestamp: timestamp.to_string(),
            base_currency: "EUR".to_string(),
            valuations: [("USD".to_string(), usd)].into_iter().collect(),
        }
    }

    #[tokio::test]
    async fn test_store_and_read_back_in_timestamp_order() {
        let store = MemoryStore::new();
        store
            .store(entry("2024-03-05T00:00:00Z", 1.08), ProviderId::Ecb)
            .await
            .unwrap();
        store
            .store(entry("2024-03-04T00:00:00Z", 1.07), ProviderId::Ecb)
            .await
            .unwrap();

        let entries = store.entries(ProviderId::Ecb).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].timestamp, "2024-03-04T00:00:00Z");

        let latest = store.latest(ProviderId::Ecb).await.unwrap().unwrap();
        assert_eq!(latest.valuations["USD"], 1.08);
    }

    #[tokio::test]
    async fn test_sources_are_kept_apart() {
        let store = MemoryStore::new();
        store
            .store(entry("2024-03-05T00:00:00Z", 1.08), ProviderId::Ecb)
            .await
            .unwrap();

        assert!(store.entries(ProviderId::Fixer).await.unwrap().is_empty());
        assert!(store.latest(ProviderId::Fixer).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_existing_entry_is_not_overwritten() {
        let store = MemoryStore::new();
        store
            .store(entry("2024-03-05T00:00:00Z", 1.08), ProviderId::Ecb)
            .await
            .unwrap();
        store
            .store(entry("2024-03-05T00:00:00Z", 9.99), ProviderId::Ecb)
            .await
            .unwrap();

        let entries = store.entries(ProviderId::Ecb).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].valuations["USD"], 1.08);
    }
}
