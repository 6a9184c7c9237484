use crate::core::entry::CanonicalEntry;
use crate::core::rates::ProviderId;
use crate::core::store::EntryStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Entry store on a fjall keyspace, one partition per provider. Keys are the
/// formatted entry timestamps so partition order is chronological.
pub struct DiskStore {
    keyspace: Keyspace,
    partitions: HashMap<ProviderId, PartitionHandle>,
}

impl DiskStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create store directory: {}", path.display()))?;
        let keyspace = Config::new(path)
            .open()
            .with_context(|| format!("Failed to open store at {}", path.display()))?;

        let mut partitions = HashMap::new();
        for id in ProviderId::ALL {
            let partition = keyspace
                .open_partition(id.as_str(), PartitionCreateOptions::default())
                .with_context(|| format!("Failed to open partition {id}"))?;
            partitions.insert(id, partition);
        }
        debug!("Opened entry store at {}", path.display());

        Ok(Self {
            keyspace,
            partitions,
        })
    }

    fn partition(&self, source: ProviderId) -> Result<&PartitionHandle> {
        self.partitions
            .get(&source)
            .with_context(|| format!("No partition for {source}"))
    }
}

#[async_trait]
impl EntryStore for DiskStore {
    async fn store(&self, entry: CanonicalEntry, source: ProviderId) -> Result<()> {
        let partition = self.partition(source)?;
        let key = entry.timestamp.as_bytes();

        if partition.contains_key(key)? {
            warn!(%source, timestamp = %entry.timestamp, "Entry already stored, keeping the original");
            return Ok(());
        }

        partition.insert(key, serde_json::to_vec(&entry)?)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!(%source, timestamp = %entry.timestamp, "Entry PUT");
        Ok(())
    }

    async fn entries(&self, source: ProviderId) -> Result<Vec<CanonicalEntry>> {
        let partition = self.partition(source)?;
        partition
            .iter()
            .map(|item| -> Result<CanonicalEntry> {
                let (_, value) = item?;
                Ok(serde_json::from_slice(&value)?)
            })
            .collect()
    }

    async fn latest(&self, source: ProviderId) -> Result<Option<CanonicalEntry>> {
        let partition = self.partition(source)?;
        match partition.last_key_value()? {
            Some((_, value)) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(timestamp: &str, usd: f64) -> CanonicalEntry {
        CanonicalEntry {
            timestamp: timestamp.to_string(),
            base_currency: "CAD".to_string(),
            valuations: [("CAD".to_string(), 1.0), ("USD".to_string(), usd)]
                .into_iter()
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_disk_store_put_and_read() {
        let dir = tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();

        assert!(store.latest(ProviderId::Fixer).await.unwrap().is_none());

        store
            .store(entry("2024-03-05T10:00:00Z", 0.74), ProviderId::Fixer)
            .await
            .unwrap();
        store
            .store(entry("2024-03-05T11:00:00Z", 0.75), ProviderId::Fixer)
            .await
            .unwrap();

        let entries = store.entries(ProviderId::Fixer).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], entry("2024-03-05T10:00:00Z", 0.74));

        let latest = store.latest(ProviderId::Fixer).await.unwrap().unwrap();
        assert_eq!(latest.timestamp, "2024-03-05T11:00:00Z");
        assert!(store.entries(ProviderId::Ecb).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disk_store_is_append_only() {
        let dir = tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();

        store
            .store(entry("2024-03-05T00:00:00Z", 0.74), ProviderId::BankOfCanada)
            .await
            .unwrap();
        store
            .store(entry("2024-03-05T00:00:00Z", 0.99), ProviderId::BankOfCanada)
            .await
            .unwrap();

        let entries = store.entries(ProviderId::BankOfCanada).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].valuations["USD"], 0.74);
    }
}
