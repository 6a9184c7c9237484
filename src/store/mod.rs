pub mod channel;
pub mod disk;
pub mod memory;

use crate::core::config::AppConfig;
use crate::core::store::EntryStore;
use anyhow::Result;
use disk::DiskStore;
use memory::MemoryStore;
use std::sync::Arc;
use tracing::info;

/// Opens the backing store: in memory when `ephemeral`, otherwise the on-disk
/// store under `<data_path>/entries`.
pub fn open_store(config: &AppConfig, ephemeral: bool) -> Result<Arc<dyn EntryStore>> {
    if ephemeral {
        info!("Using in-memory entry store, entries are discarded on exit");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let path = config.default_data_path()?.join("entries");
    info!("Using entry store at {}", path.display());
    Ok(Arc::new(DiskStore::open(&path)?))
}
