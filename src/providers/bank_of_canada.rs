use crate::core::config::BankOfCanadaConfig;
use crate::core::error::{CycleError, ParseError};
use crate::core::rates::{
    CsvFeedResponse, ProviderId, ProviderResponse, RateMap, RateObservation, SeriesDescriptor,
};
use crate::core::source::RateSource;
use crate::providers::util::fetch_text;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use reqwest::Url;
use std::str::Lines;
use tracing::{debug, instrument};

const SERIES_LABEL: &str = "SERIES";
const OBSERVATIONS_LABEL: &str = "OBSERVATIONS";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Positional reader over the Valet CSV layout. Every read checks what it
/// consumed so a malformed payload fails instead of misaligning later reads.
struct SectionReader<'a> {
    lines: Lines<'a>,
    line_no: usize,
}

impl<'a> SectionReader<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines(),
            line_no: 0,
        }
    }

    fn next_line(&mut self) -> Option<&'a str> {
        let line = self.lines.next()?;
        self.line_no += 1;
        Some(line.trim_end())
    }

    fn expect_line(&mut self, what: &str) -> Result<&'a str, ParseError> {
        self.next_line().ok_or_else(|| {
            ParseError::new(format!(
                "unexpected end of payload after line {}, expected {what}",
                self.line_no
            ))
        })
    }

    fn expect_blank(&mut self) -> Result<(), ParseError> {
        let line = self.expect_line("a blank line")?;
        if !line.is_empty() {
            return Err(self.unexpected("a blank line", line));
        }
        Ok(())
    }

    fn expect_label(&mut self, label: &str) -> Result<(), ParseError> {
        let line = self.expect_line(label)?;
        let fields = split_fields(line, self.line_no)?;
        if fields.first().map(String::as_str) != Some(label) {
            return Err(self.unexpected(label, line));
        }
        Ok(())
    }

    fn unexpected(&self, expected: &str, found: &str) -> ParseError {
        ParseError::new(format!(
            "line {}: expected {expected}, found '{found}'",
            self.line_no
        ))
    }
}

/// Splits one CSV line, honouring quoted fields.
fn split_fields(line: &str, line_no: usize) -> Result<Vec<String>, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());

    match reader.records().next() {
        Some(Ok(record)) => Ok(record.iter().map(|f| f.trim().to_string()).collect()),
        Some(Err(e)) => Err(ParseError::new(format!("line {line_no}: {e}"))),
        None => Ok(Vec::new()),
    }
}

/// Parses a Bank of Canada Valet CSV payload.
///
/// Layout: terms label, terms URI, blank, `SERIES`, series header, one
/// `id,label,description` line per series, blank, `OBSERVATIONS`, column
/// header, one `date,value...` line per day up to a blank line or the end.
pub fn parse_observations_csv(text: &str) -> Result<CsvFeedResponse, ParseError> {
    let mut reader = SectionReader::new(text.trim_start_matches('\u{feff}'));

    let terms_label = reader.expect_line("terms label")?;
    if !split_fields(terms_label, reader.line_no)?
        .first()
        .is_some_and(|f| f.starts_with("TERMS"))
    {
        return Err(reader.unexpected("terms label", terms_label));
    }

    let terms_line = reader.expect_line("terms URI")?;
    let terms_field = split_fields(terms_line, reader.line_no)?
        .into_iter()
        .next()
        .unwrap_or_default();
    let terms_uri = Url::parse(&terms_field)
        .map_err(|e| ParseError::new(format!("line {}: bad terms URI: {e}", reader.line_no)))?;

    reader.expect_blank()?;
    reader.expect_label(SERIES_LABEL)?;
    let header = reader.expect_line("series header")?;
    if header.is_empty() {
        return Err(reader.unexpected("series header", header));
    }

    let mut series = Vec::new();
    loop {
        let line = reader.expect_line("series line or blank line")?;
        if line.is_empty() {
            break;
        }
        let fields = split_fields(line, reader.line_no)?;
        match fields.as_slice() {
            [id, label, description, ..] => series.push(SeriesDescriptor {
                id: id.clone(),
                label: label.clone(),
                description: description.clone(),
            }),
            _ => return Err(reader.unexpected("id,label,description", line)),
        }
    }

    reader.expect_label(OBSERVATIONS_LABEL)?;
    let header_line = reader.expect_line("observations header")?;
    let column_names = split_fields(header_line, reader.line_no)?;
    if column_names.is_empty() {
        return Err(reader.unexpected("observations header", header_line));
    }

    let mut observations = Vec::new();
    while let Some(line) = reader.next_line() {
        if line.is_empty() {
            break;
        }
        let fields = split_fields(line, reader.line_no)?;
        if fields.len() != column_names.len() {
            return Err(ParseError::new(format!(
                "line {}: expected {} fields, found {}",
                reader.line_no,
                column_names.len(),
                fields.len()
            )));
        }

        let date = NaiveDate::parse_from_str(&fields[0], DATE_FORMAT).map_err(|e| {
            ParseError::new(format!(
                "line {}: bad date '{}': {e}",
                reader.line_no, fields[0]
            ))
        })?;

        let mut values = RateMap::new();
        for (name, raw) in column_names.iter().zip(fields.iter()).skip(1) {
            // Series without a published value for the day are left blank
            if raw.is_empty() {
                continue;
            }
            let value: f64 = raw.parse().map_err(|e| {
                ParseError::new(format!(
                    "line {}: bad value '{raw}' for {name}: {e}",
                    reader.line_no
                ))
            })?;
            values.insert(name.clone(), value);
        }
        observations.push(RateObservation { date, values });
    }

    Ok(CsvFeedResponse {
        terms_uri,
        series,
        column_names,
        observations,
    })
}

pub struct BankOfCanadaSource {
    client: reqwest::Client,
    base_url: String,
    series: Vec<String>,
    lookback_days: i64,
}

impl BankOfCanadaSource {
    pub fn new(client: reqwest::Client, config: &BankOfCanadaConfig) -> Self {
        BankOfCanadaSource {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            series: config.series.clone(),
            lookback_days: config.lookback_days,
        }
    }

    pub fn observations_url(&self, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "{}/valet/observations/{}/csv?start_date={}&end_date={}",
            self.base_url,
            self.series.join(","),
            start.format(DATE_FORMAT),
            end.format(DATE_FORMAT)
        )
    }

    pub async fn fetch_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ProviderResponse, CycleError> {
        let url = self.observations_url(start, end);
        let text = fetch_text(&self.client, &url, ProviderId::BankOfCanada).await?;

        let response = parse_observations_csv(&text)
            .map_err(|e| CycleError::format(ProviderId::BankOfCanada, e))?;
        debug!(
            series = response.series.len(),
            observations = response.observations.len(),
            "Parsed Bank of Canada observations"
        );
        Ok(ProviderResponse::CsvFeed(response))
    }
}

#[async_trait]
impl RateSource for BankOfCanadaSource {
    fn id(&self) -> ProviderId {
        ProviderId::BankOfCanada
    }

    #[instrument(name = "BankOfCanadaFetch", skip(self))]
    async fn fetch(&self) -> Result<ProviderResponse, CycleError> {
        let end = Utc::now().date_naive();
        let start = end - Duration::days(self.lookback_days);
        self.fetch_range(start, end).await
    }
}
