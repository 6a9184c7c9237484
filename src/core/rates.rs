//! Provider identities and the structured responses produced by the parsers

use crate::core::entry::{timestamp_from_date, timestamp_from_unix};
use crate::core::error::ParseError;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

/// Mapping from currency code to rate.
pub type RateMap = BTreeMap<String, f64>;

/// Rates expressed relative to the configured base currency.
pub type RebasedRates = RateMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    BankOfCanada,
    Ecb,
    Fixer,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::BankOfCanada, ProviderId::Ecb, ProviderId::Fixer];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::BankOfCanada => "bank_of_canada",
            ProviderId::Ecb => "ecb",
            ProviderId::Fixer => "fixer",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "bank_of_canada" | "boc" => Ok(ProviderId::BankOfCanada),
            "ecb" => Ok(ProviderId::Ecb),
            "fixer" => Ok(ProviderId::Fixer),
            _ => Err(anyhow::anyhow!("Unknown provider: {}", s)),
        }
    }
}

/// One point-in-time snapshot from a feed.
#[derive(Debug, Clone, PartialEq)]
pub struct RateObservation {
    pub date: NaiveDate,
    pub values: RateMap,
}

/// Metadata for one reported series (one column of a CSV feed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesDescriptor {
    pub id: String,
    pub label: String,
    pub description: String,
}

/// Bank of Canada style CSV feed: observations keyed by column name.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvFeedResponse {
    pub terms_uri: Url,
    pub series: Vec<SeriesDescriptor>,
    pub column_names: Vec<String>,
    pub observations: Vec<RateObservation>,
}

/// Central bank reference rates: observations keyed by currency code.
#[derive(Debug, Clone, PartialEq)]
pub struct CentralBankResponse {
    pub subject: Option<String>,
    pub sender: Option<String>,
    pub observations: Vec<RateObservation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderErrorInfo {
    pub code: i64,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub info: Option<String>,
}

/// JSON "latest rates" response with an implicit provider base.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JsonRateResponse {
    pub success: bool,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub rates: RateMap,
    #[serde(default)]
    pub error: Option<ProviderErrorInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResponse {
    CentralBank(CentralBankResponse),
    CsvFeed(CsvFeedResponse),
    JsonRate(JsonRateResponse),
}

/// The mapping a cycle rebases, stamped with the time it applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct RateSnapshot {
    pub timestamp: DateTime<Utc>,
    pub native_base: String,
    pub rates: RateMap,
}

/// Fixer's free tier quotes everything against EUR.
const DEFAULT_JSON_BASE: &str = "EUR";
const CENTRAL_BANK_BASE: &str = "EUR";

impl ProviderResponse {
    pub fn observation_count(&self) -> usize {
        match self {
            ProviderResponse::CentralBank(r) => r.observations.len(),
            ProviderResponse::CsvFeed(r) => r.observations.len(),
            ProviderResponse::JsonRate(_) => 1,
        }
    }

    /// The most recent rates in "units per native base" form, with the native
    /// base itself present at 1.0. `None` when the response carries no data.
    pub fn snapshot(&self) -> Result<Option<RateSnapshot>, ParseError> {
        match self {
            ProviderResponse::CentralBank(r) => r.snapshot(),
            ProviderResponse::CsvFeed(r) => r.snapshot(),
            ProviderResponse::JsonRate(r) => r.snapshot().map(Some),
        }
    }
}

/// Rates end up as divisors, so each one must be positive and finite.
fn check_rate(name: &str, value: f64, date: NaiveDate) -> Result<(), ParseError> {
    if value <= 0.0 || !value.is_finite() {
        return Err(ParseError::new(format!(
            "{name} has unusable rate {value} on {date}"
        )));
    }
    Ok(())
}

impl CentralBankResponse {
    fn snapshot(&self) -> Result<Option<RateSnapshot>, ParseError> {
        let Some(latest) = self.observations.iter().max_by_key(|o| o.date) else {
            return Ok(None);
        };
        for (currency, value) in &latest.values {
            check_rate(currency, *value, latest.date)?;
        }

        let mut rates = latest.values.clone();
        rates.insert(CENTRAL_BANK_BASE.to_string(), 1.0);
        Ok(Some(RateSnapshot {
            timestamp: timestamp_from_date(latest.date),
            native_base: CENTRAL_BANK_BASE.to_string(),
            rates,
        }))
    }
}

impl CsvFeedResponse {
    /// Series columns are named `FX{CCY}{BASE}` and quote BASE per one CCY.
    fn native_base(&self) -> Result<String, ParseError> {
        let mut base: Option<&str> = None;
        for name in self.column_names.iter().skip(1) {
            let (_, quote) = split_pair_column(name)?;
            match base {
                None => base = Some(quote),
                Some(b) if b == quote => {}
                Some(b) => {
                    return Err(ParseError::new(format!(
                        "series {name} is not quoted in {b} like the other series"
                    )));
                }
            }
        }
        base.map(str::to_string)
            .ok_or_else(|| ParseError::new("no series columns in observations header"))
    }

    /// Stamped with the latest observation date. A series left blank on that
    /// day keeps its most recent earlier value from the same response.
    fn snapshot(&self) -> Result<Option<RateSnapshot>, ParseError> {
        let mut ordered: Vec<&RateObservation> = self.observations.iter().collect();
        ordered.sort_by_key(|o| o.date);
        let Some(latest) = ordered.last() else {
            return Ok(None);
        };
        let native_base = self.native_base()?;

        let mut carried: BTreeMap<&str, (f64, NaiveDate)> = BTreeMap::new();
        for observation in &ordered {
            for (column, value) in &observation.values {
                carried.insert(column.as_str(), (*value, observation.date));
            }
        }

        let mut rates = RateMap::new();
        for (column, (value, date)) in carried {
            let (currency, _) = split_pair_column(column)?;
            check_rate(&format!("series {column}"), value, date)?;
            rates.insert(currency.to_string(), 1.0 / value);
        }
        rates.insert(native_base.clone(), 1.0);

        Ok(Some(RateSnapshot {
            timestamp: timestamp_from_date(latest.date),
            native_base,
            rates,
        }))
    }
}

fn split_pair_column(name: &str) -> Result<(&str, &str), ParseError> {
    let pair = name
        .strip_prefix("FX")
        .filter(|p| p.len() == 6 && p.chars().all(|c| c.is_ascii_uppercase()))
        .ok_or_else(|| ParseError::new(format!("unexpected series column {name}")))?;
    Ok(pair.split_at(3))
}

impl JsonRateResponse {
    fn snapshot(&self) -> Result<RateSnapshot, ParseError> {
        let timestamp = self
            .timestamp
            .ok_or_else(|| ParseError::new("response has no timestamp"))?;
        let native_base = self
            .base
            .clone()
            .unwrap_or_else(|| DEFAULT_JSON_BASE.to_string());

        let timestamp = timestamp_from_unix(timestamp)?;
        for (currency, value) in &self.rates {
            check_rate(currency, *value, timestamp.date_naive())?;
        }

        let mut rates = self.rates.clone();
        rates.entry(native_base.clone()).or_insert(1.0);

        Ok(RateSnapshot {
            timestamp,
            native_base,
            rates,
        })
    }
}
