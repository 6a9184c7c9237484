//! Persistence abstraction for rate entries

use crate::core::entry::CanonicalEntry;
use crate::core::rates::ProviderId;
use anyhow::Result;
use async_trait::async_trait;

/// Append-only store keyed by (source, timestamp).
#[async_trait]
pub trait EntryStore: Send + Sync {
    async fn store(&self, entry: CanonicalEntry, source: ProviderId) -> Result<()>;

    /// All entries for `source`, oldest first.
    async fn entries(&self, source: ProviderId) -> Result<Vec<CanonicalEntry>>;

    async fn latest(&self, source: ProviderId) -> Result<Option<CanonicalEntry>> {
        Ok(self.entries(source).await?.pop())
    }
}
