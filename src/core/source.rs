//! Per-provider fetch, parse, rebase, build and persist cycle

use crate::core::entry::{CanonicalEntry, build_entry, parse_timestamp};
use crate::core::error::CycleError;
use crate::core::rates::{ProviderId, ProviderResponse};
use crate::core::rebase::rebase;
use crate::core::store::EntryStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// A provider endpoint: one fetch returns one parsed response.
#[async_trait]
pub trait RateSource: Send + Sync {
    fn id(&self) -> ProviderId;
    async fn fetch(&self) -> Result<ProviderResponse, CycleError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Stored(CanonicalEntry),
    /// The response held nothing newer than the last stored entry.
    NoNewData,
}

/// Read handle on a manager's most recent successfully parsed response.
/// Always sees a fully written value, never one from a cycle in flight.
#[derive(Clone)]
pub struct LatestResponse {
    rx: watch::Receiver<Option<Arc<ProviderResponse>>>,
}

impl LatestResponse {
    pub fn get(&self) -> Option<Arc<ProviderResponse>> {
        self.rx.borrow().clone()
    }

    /// Waits for the next published response. `false` once the manager is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

pub struct SourceManager {
    source: Box<dyn RateSource>,
    base_currency: String,
    store: Arc<dyn EntryStore>,
    latest: watch::Sender<Option<Arc<ProviderResponse>>>,
    last_emitted: Option<DateTime<Utc>>,
}

impl SourceManager {
    pub fn new(source: Box<dyn RateSource>, base_currency: &str, store: Arc<dyn EntryStore>) -> Self {
        let (latest, _) = watch::channel(None);
        SourceManager {
            source,
            base_currency: base_currency.to_string(),
            store,
            latest,
            last_emitted: None,
        }
    }

    pub fn id(&self) -> ProviderId {
        self.source.id()
    }

    pub fn latest(&self) -> LatestResponse {
        LatestResponse {
            rx: self.latest.subscribe(),
        }
    }

    pub fn last_response(&self) -> Option<Arc<ProviderResponse>> {
        self.latest.borrow().clone()
    }

    /// Picks up the timestamp of the newest stored entry so a restarted
    /// process does not emit an entry older than what is already stored.
    pub async fn resume_from_store(&mut self) {
        let id = self.id();
        match self.store.latest(id).await {
            Ok(Some(entry)) => match parse_timestamp(&entry.timestamp) {
                Ok(ts) => {
                    debug!(provider = %id, timestamp = %entry.timestamp, "Resuming after stored entry");
                    self.last_emitted = Some(ts);
                }
                Err(e) => warn!(provider = %id, error = %e, "Ignoring stored entry timestamp"),
            },
            Ok(None) => {}
            Err(e) => warn!(provider = %id, error = %e, "Could not read latest stored entry"),
        }
    }

    /// Runs one cycle. Any failure abandons the cycle without persisting and
    /// is logged here; the caller only decides when to try again.
    #[instrument(name = "RefreshOnce", skip(self), fields(provider = %self.id()))]
    pub async fn refresh_once(&mut self) -> Result<CycleOutcome, CycleError> {
        let result = self.run_cycle().await;
        match &result {
            Ok(CycleOutcome::Stored(entry)) => info!(
                provider = %self.id(),
                timestamp = %entry.timestamp,
                valuations = entry.valuations.len(),
                "Stored rate entry"
            ),
            Ok(CycleOutcome::NoNewData) => {
                debug!(provider = %self.id(), "No new rates since last entry")
            }
            Err(e) => warn!(provider = %e.provider(), kind = %e.kind(), error = %e, "Refresh cycle failed"),
        }
        result
    }

    async fn run_cycle(&mut self) -> Result<CycleOutcome, CycleError> {
        let id = self.id();
        let response = self.source.fetch().await?;
        debug!(provider = %id, observations = response.observation_count(), "Fetched response");
        let snapshot = response
            .snapshot()
            .map_err(|e| CycleError::format(id, e))?;
        self.latest.send_replace(Some(Arc::new(response)));

        let Some(snapshot) = snapshot else {
            return Ok(CycleOutcome::NoNewData);
        };
        if let Some(last) = self.last_emitted
            && snapshot.timestamp <= last
        {
            return Ok(CycleOutcome::NoNewData);
        }

        let rebased = rebase(&snapshot.rates, &self.base_currency)
            .map_err(|source| CycleError::Rebase { provider: id, source })?;
        let entry = build_entry(snapshot.timestamp, &self.base_currency, rebased);

        self.store
            .store(entry.clone(), id)
            .await
            .map_err(|e| CycleError::persistence(id, e))?;
        self.last_emitted = Some(snapshot.timestamp);
        Ok(CycleOutcome::Stored(entry))
    }
}
