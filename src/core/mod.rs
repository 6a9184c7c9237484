//! Rate model, rebasing and the per-provider cycle

pub mod config;
pub mod entry;
pub mod error;
pub mod log;
pub mod rates;
pub mod rebase;
pub mod source;
pub mod store;

pub use entry::CanonicalEntry;
pub use error::CycleError;
pub use rates::{ProviderId, ProviderResponse};
pub use source::{CycleOutcome, RateSource, SourceManager};
pub use store::EntryStore;
