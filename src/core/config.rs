use crate::core::rates::ProviderId;
use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

const ONE_HOUR_SECS: u64 = 60 * 60;
const ONE_DAY_SECS: u64 = 24 * ONE_HOUR_SECS;

fn default_lookback_days() -> i64 {
    7
}

fn daily() -> u64 {
    ONE_DAY_SECS
}

fn hourly() -> u64 {
    ONE_HOUR_SECS
}

fn default_bank_of_canada_url() -> String {
    "https://www.bankofcanada.ca".to_string()
}

fn default_ecb_url() -> String {
    "https://www.ecb.europa.eu".to_string()
}

fn default_fixer_url() -> String {
    "http://data.fixer.io".to_string()
}

fn default_series() -> Vec<String> {
    [
        "AUD", "BRL", "CNY", "EUR", "HKD", "INR", "IDR", "JPY", "MYR", "MXN", "NZD", "NOK", "PEN",
        "RUB", "SAR", "SGD", "ZAR", "KRW", "SEK", "CHF", "TWD", "THB", "TRY", "GBP", "USD", "VND",
    ]
    .iter()
    .map(|c| format!("FX{c}CAD"))
    .collect()
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BankOfCanadaConfig {
    #[serde(default = "default_bank_of_canada_url")]
    pub base_url: String,
    #[serde(default = "default_series")]
    pub series: Vec<String>,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
    #[serde(default = "daily")]
    pub interval_secs: u64,
}

impl Default for BankOfCanadaConfig {
    fn default() -> Self {
        BankOfCanadaConfig {
            base_url: default_bank_of_canada_url(),
            series: default_series(),
            lookback_days: default_lookback_days(),
            interval_secs: daily(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EcbConfig {
    #[serde(default = "default_ecb_url")]
    pub base_url: String,
    #[serde(default = "daily")]
    pub interval_secs: u64,
}

impl Default for EcbConfig {
    fn default() -> Self {
        EcbConfig {
            base_url: default_ecb_url(),
            interval_secs: daily(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FixerConfig {
    #[serde(default = "default_fixer_url")]
    pub base_url: String,
    pub access_key: String,
    #[serde(default = "hourly")]
    pub interval_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct ProvidersConfig {
    pub bank_of_canada: Option<BankOfCanadaConfig>,
    pub ecb: Option<EcbConfig>,
    pub fixer: Option<FixerConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NetworkConfig {
    #[serde(default = "default_check_url")]
    pub check_url: String,
    #[serde(default = "default_network_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_check_url() -> String {
    "https://www.google.com".to_string()
}

fn default_network_interval() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            check_url: default_check_url(),
            interval_secs: default_network_interval(),
            enabled: true,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    pub base_currency: String,
    pub data_path: Option<String>,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "poseidon", "poseidon")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "poseidon", "poseidon")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::from_yaml(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut config: Self = serde_yaml::from_str(yaml)?;
        config.base_currency = config.base_currency.trim().to_uppercase();
        config.validate()?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.base_currency.len() != 3
            || !self.base_currency.chars().all(|c| c.is_ascii_alphabetic())
        {
            bail!(
                "base_currency must be a 3-letter currency code, got '{}'",
                self.base_currency
            );
        }

        if self.network.enabled && self.network.interval_secs == 0 {
            bail!("network.interval_secs must be greater than zero");
        }

        for id in ProviderId::ALL {
            if let Some(interval) = self.poll_interval(id)
                && interval.is_zero()
            {
                bail!("providers.{id}.interval_secs must be greater than zero");
            }
        }

        if let Some(boc) = &self.providers.bank_of_canada {
            if boc.series.is_empty() {
                bail!("providers.bank_of_canada.series must list at least one series");
            }
            if boc.lookback_days < 0 {
                bail!("providers.bank_of_canada.lookback_days must not be negative");
            }
        }

        if let Some(fixer) = &self.providers.fixer
            && fixer.access_key.trim().is_empty()
        {
            bail!("providers.fixer.access_key must not be empty");
        }
        Ok(())
    }

    pub fn base_currency(&self) -> &str {
        &self.base_currency
    }

    pub fn provider_credentials(&self, provider: ProviderId) -> Option<&str> {
        match provider {
            ProviderId::Fixer => self
                .providers
                .fixer
                .as_ref()
                .map(|f| f.access_key.as_str()),
            ProviderId::BankOfCanada | ProviderId::Ecb => None,
        }
    }

    /// Interval between cycles, `None` when the provider is not configured.
    pub fn poll_interval(&self, provider: ProviderId) -> Option<Duration> {
        let secs = match provider {
            ProviderId::BankOfCanada => self.providers.bank_of_canada.as_ref()?.interval_secs,
            ProviderId::Ecb => self.providers.ecb.as_ref()?.interval_secs,
            ProviderId::Fixer => self.providers.fixer.as_ref()?.interval_secs,
        };
        Some(Duration::from_secs(secs))
    }

    pub fn enabled_providers(&self) -> Vec<ProviderId> {
        ProviderId::ALL
            .into_iter()
            .filter(|id| self.poll_interval(*id).is_some())
            .collect()
    }
}
