pub mod cli;
pub mod core;
pub mod providers;
pub mod scheduler;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::rates::ProviderId;
use crate::core::source::{RateSource, SourceManager};
use crate::core::store::EntryStore;
use crate::providers::{BankOfCanadaSource, EcbSource, FixerSource, util::http_client};
use crate::scheduler::{HttpReachability, NetworkMonitor, PollScheduler};
use crate::store::channel::StoreWriter;
use anyhow::{Result, bail};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub enum AppCommand {
    Run,
    Once,
    Latest { provider: Option<ProviderId> },
}

pub async fn run_command(
    command: AppCommand,
    config_path: Option<&str>,
    ephemeral: bool,
) -> Result<()> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Run => run_daemon(&config, ephemeral).await,
        AppCommand::Once => {
            let store = store::open_store(&config, ephemeral)?;
            let managers = build_managers(&config, &http_client()?, store)
                .into_iter()
                .map(|(manager, _)| manager)
                .collect();
            cli::once::run(managers).await
        }
        AppCommand::Latest { provider } => {
            let store = store::open_store(&config, ephemeral)?;
            let providers = cli::latest::providers_to_show(provider, &config.enabled_providers());
            cli::latest::run(store.as_ref(), &providers).await
        }
    }
}

/// One manager per configured provider, paired with its poll interval.
pub fn build_managers(
    config: &AppConfig,
    client: &reqwest::Client,
    store: Arc<dyn EntryStore>,
) -> Vec<(SourceManager, Duration)> {
    let mut sources: Vec<Box<dyn RateSource>> = Vec::new();
    if let Some(boc) = &config.providers.bank_of_canada {
        sources.push(Box::new(BankOfCanadaSource::new(client.clone(), boc)));
    }
    if let Some(ecb) = &config.providers.ecb {
        sources.push(Box::new(EcbSource::new(client.clone(), ecb)));
    }
    if let Some(fixer) = &config.providers.fixer
        && let Some(access_key) = config.provider_credentials(ProviderId::Fixer)
    {
        sources.push(Box::new(FixerSource::new(
            client.clone(),
            &fixer.base_url,
            access_key,
        )));
    }

    sources
        .into_iter()
        .filter_map(|source| {
            let every = config.poll_interval(source.id())?;
            let manager = SourceManager::new(source, config.base_currency(), Arc::clone(&store));
            Some((manager, every))
        })
        .collect()
}

async fn run_daemon(config: &AppConfig, ephemeral: bool) -> Result<()> {
    info!(base = config.base_currency(), "Poseidon starting...");
    let client = http_client()?;

    let monitor = if config.network.enabled {
        let probe = Arc::new(HttpReachability::new(client.clone(), &config.network.check_url));
        if !probe.is_reachable().await {
            bail!("No network connection to {}", config.network.check_url);
        }
        Some(probe)
    } else {
        None
    };

    let (store, writer) = StoreWriter::spawn(store::open_store(config, ephemeral)?);
    let mut scheduler = PollScheduler::new();
    for (manager, every) in build_managers(config, &client, Arc::new(store)) {
        scheduler.add_source(manager, every);
    }
    if let Some(probe) = monitor {
        scheduler = scheduler.with_network_monitor(
            probe,
            Duration::from_secs(config.network.interval_secs),
        );
    }
    info!(providers = ?scheduler.sources(), "Polling");

    let result = tokio::select! {
        result = scheduler.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, flushing pending entries");
            Ok(())
        }
    };
    if result.is_ok() {
        writer.finish().await?;
    }
    result
}
