//! Independent polling loops, one per source, plus the network watchdog

use crate::core::rates::ProviderId;
use crate::core::source::{LatestResponse, SourceManager};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

#[async_trait]
pub trait NetworkMonitor: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

/// Treats any HTTP response from `url` as proof of connectivity.
pub struct HttpReachability {
    client: reqwest::Client,
    url: String,
}

impl HttpReachability {
    pub fn new(client: reqwest::Client, url: &str) -> Self {
        HttpReachability {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl NetworkMonitor for HttpReachability {
    async fn is_reachable(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Reachability probe failed");
                false
            }
        }
    }
}

struct PollJob {
    manager: SourceManager,
    every: Duration,
}

pub struct PollScheduler {
    jobs: Vec<PollJob>,
    monitor: Option<(Arc<dyn NetworkMonitor>, Duration)>,
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl PollScheduler {
    pub fn new() -> Self {
        PollScheduler {
            jobs: Vec::new(),
            monitor: None,
        }
    }

    pub fn add_source(&mut self, manager: SourceManager, every: Duration) {
        self.jobs.push(PollJob { manager, every });
    }

    pub fn with_network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>, every: Duration) -> Self {
        self.monitor = Some((monitor, every));
        self
    }

    pub fn sources(&self) -> Vec<ProviderId> {
        self.jobs.iter().map(|j| j.manager.id()).collect()
    }

    pub fn latest_responses(&self) -> HashMap<ProviderId, LatestResponse> {
        self.jobs
            .iter()
            .map(|j| (j.manager.id(), j.manager.latest()))
            .collect()
    }

    /// Polls every source forever. Returns only when the network monitor
    /// reports lost connectivity or a polling task dies.
    pub async fn run(self) -> Result<()> {
        if self.jobs.is_empty() {
            return Err(anyhow!("No providers configured"));
        }

        let PollScheduler { jobs, monitor } = self;
        let mut tasks = JoinSet::new();
        for PollJob { manager, every } in jobs {
            info!(provider = %manager.id(), every = ?every, "Starting poll loop");
            tasks.spawn(poll_loop(manager, every));
        }

        let network = async move {
            match monitor {
                Some((monitor, every)) => watch_network(monitor, every).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            err = network => Err(err),
            Some(joined) = tasks.join_next() => {
                let message = match joined {
                    Ok(()) => "poll loop exited".to_string(),
                    Err(e) => format!("poll loop failed: {e}"),
                };
                error!("{message}");
                Err(anyhow!(message))
            }
        }
    }
}

/// Idle -> fetching -> stored or failed -> idle, forever. Cycles never
/// overlap and a failure only costs this source its current cycle.
async fn poll_loop(mut manager: SourceManager, every: Duration) {
    manager.resume_from_store().await;

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        debug!(provider = %manager.id(), "Fetching");
        let _ = manager.refresh_once().await;
    }
}

async fn watch_network(monitor: Arc<dyn NetworkMonitor>, every: Duration) -> anyhow::Error {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if !monitor.is_reachable().await {
            error!("Network connection lost");
            return anyhow!("Network connection lost");
        }
    }
}
