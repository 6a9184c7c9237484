//! Channel hand-off between source managers and the backing store.
//!
//! Managers hold a cloneable [`ChannelStore`]; a single [`StoreWriter`] task
//! drains the channel in arrival order, so entries from one source are
//! written in the order that source produced them.
//!
//! Writes are best effort: `store` succeeds once the entry is queued, and a
//! backing write that fails later is only logged by the writer. Callers that
//! must report the real write result (`poseidon once`) use the backing store
//! directly.

use crate::core::entry::CanonicalEntry;
use crate::core::rates::ProviderId;
use crate::core::store::EntryStore;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

const CHANNEL_CAPACITY: usize = 64;

struct StoreRequest {
    entry: CanonicalEntry,
    source: ProviderId,
}

#[derive(Clone)]
pub struct ChannelStore {
    tx: mpsc::Sender<StoreRequest>,
    backing: Arc<dyn EntryStore>,
}

pub struct StoreWriter {
    handle: JoinHandle<()>,
}

impl StoreWriter {
    /// Spawns the writer task in front of `backing`.
    pub fn spawn(backing: Arc<dyn EntryStore>) -> (ChannelStore, StoreWriter) {
        let (tx, mut rx) = mpsc::channel::<StoreRequest>(CHANNEL_CAPACITY);
        let store = Arc::clone(&backing);

        let handle = tokio::spawn(async move {
            while let Some(StoreRequest { entry, source }) = rx.recv().await {
                let timestamp = entry.timestamp.clone();
                match store.store(entry, source).await {
                    Ok(()) => debug!(%source, %timestamp, "Entry written"),
                    Err(e) => error!(%source, %timestamp, error = %e, "Failed to write entry"),
                }
            }
            debug!("Store writer stopped");
        });

        (ChannelStore { tx, backing }, StoreWriter { handle })
    }

    /// Waits until every queued entry is written. Only returns once all
    /// [`ChannelStore`] clones are dropped.
    pub async fn finish(self) -> Result<()> {
        self.handle
            .await
            .map_err(|e| anyhow!("Store writer task failed: {e}"))
    }
}

#[async_trait]
impl EntryStore for ChannelStore {
    async fn store(&self, entry: CanonicalEntry, source: ProviderId) -> Result<()> {
        self.tx
            .send(StoreRequest { entry, source })
            .await
            .map_err(|_| anyhow!("store writer is not running"))
    }

    async fn entries(&self, source: ProviderId) -> Result<Vec<CanonicalEntry>> {
        self.backing.entries(source).await
    }

    async fn latest(&self, source: ProviderId) -> Result<Option<CanonicalEntry>> {
        self.backing.latest(source).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn entry(timestamp: &str) -> CanonicalEntry {
        CanonicalEntry {
            timestamp: timestamp.to_string(),
            base_currency: "USD".to_string(),
            valuations: [("USD".to_string(), 1.0)].into_iter().collect(),
        }
    }

    #[tokio::test]
    async fn test_entries_reach_backing_store_in_order() {
        let backing = Arc::new(MemoryStore::new());
        let (store, writer) = StoreWriter::spawn(backing.clone());

        for hour in 10..15 {
            store
                .store(entry(&format!("2024-03-05T{hour}:00:00Z")), ProviderId::Fixer)
                .await
                .unwrap();
        }
        drop(store);
        writer.finish().await.unwrap();

        let entries = backing.entries(ProviderId::Fixer).await.unwrap();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[4].timestamp, "2024-03-05T14:00:00Z");
    }

    struct RejectingStore;

    #[async_trait]
    impl EntryStore for RejectingStore {
        async fn store(&self, _entry: CanonicalEntry, _source: ProviderId) -> Result<()> {
            Err(anyhow!("disk full"))
        }

        async fn entries(&self, _source: ProviderId) -> Result<Vec<CanonicalEntry>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_queued_write_succeeds_even_if_backing_write_fails() {
        let (store, writer) = StoreWriter::spawn(Arc::new(RejectingStore));

        store
            .store(entry("2024-03-05T00:00:00Z"), ProviderId::Ecb)
            .await
            .unwrap();
        store
            .store(entry("2024-03-06T00:00:00Z"), ProviderId::Ecb)
            .await
            .unwrap();
        drop(store);

        // The writer keeps draining after a failure and stops cleanly
        writer.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_send_fails_when_writer_is_gone() {
        let backing = Arc::new(MemoryStore::new());
        let (store, writer) = StoreWriter::spawn(backing);
        writer.handle.abort();
        let _ = writer.handle.await;

        let result = store.store(entry("2024-03-05T00:00:00Z"), ProviderId::Ecb).await;
        assert!(result.is_err());
    }
}
