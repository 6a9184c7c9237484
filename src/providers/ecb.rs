use crate::core::config::EcbConfig;
use crate::core::error::{CycleError, ParseError};
use crate::core::rates::{CentralBankResponse, ProviderId, ProviderResponse, RateMap, RateObservation};
use crate::core::source::RateSource;
use crate::providers::util::fetch_text;
use async_trait::async_trait;
use chrono::NaiveDate;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use tracing::{debug, instrument};

#[derive(Clone, Copy)]
enum TextField {
    Subject,
    Sender,
}

fn attribute(element: &BytesStart, name: &str) -> Result<Option<String>, ParseError> {
    match element.try_get_attribute(name) {
        Ok(Some(attr)) => attr
            .unescape_value()
            .map(|v| Some(v.into_owned()))
            .map_err(|e| ParseError::new(format!("attribute {name}: {e}"))),
        Ok(None) => Ok(None),
        Err(e) => Err(ParseError::new(format!("attribute {name}: {e}"))),
    }
}

/// Applies one `Cube` element: a `time` cube opens a new observation, a
/// `currency`/`rate` cube adds to the open one. The outer wrapper carries
/// neither and is skipped.
fn apply_cube(
    element: &BytesStart,
    current: &mut Option<RateObservation>,
    observations: &mut Vec<RateObservation>,
) -> Result<(), ParseError> {
    if let Some(time) = attribute(element, "time")? {
        let date = NaiveDate::parse_from_str(&time, "%Y-%m-%d")
            .map_err(|e| ParseError::new(format!("bad cube time '{time}': {e}")))?;
        if let Some(done) = current.take() {
            observations.push(done);
        }
        *current = Some(RateObservation {
            date,
            values: RateMap::new(),
        });
        return Ok(());
    }

    let Some(currency) = attribute(element, "currency")? else {
        return Ok(());
    };
    let raw = attribute(element, "rate")?
        .ok_or_else(|| ParseError::new(format!("cube for {currency} has no rate")))?;
    let rate: f64 = raw
        .parse()
        .map_err(|e| ParseError::new(format!("bad rate '{raw}' for {currency}: {e}")))?;
    let observation = current
        .as_mut()
        .ok_or_else(|| ParseError::new(format!("rate for {currency} outside a dated cube")))?;
    observation.values.insert(currency, rate);
    Ok(())
}

/// Parses the ECB euro foreign exchange reference rates envelope.
pub fn parse_reference_rates_xml(text: &str) -> Result<CentralBankResponse, ParseError> {
    let mut reader = Reader::from_str(text);
    let mut subject = None;
    let mut sender = None;
    let mut text_field: Option<TextField> = None;
    let mut current: Option<RateObservation> = None;
    let mut observations = Vec::new();

    loop {
        match reader.read_event() {
            Err(e) => {
                return Err(ParseError::new(format!(
                    "invalid XML at position {}: {e}",
                    reader.buffer_position()
                )));
            }
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"subject" => text_field = Some(TextField::Subject),
                b"name" => text_field = Some(TextField::Sender),
                b"Cube" => apply_cube(&e, &mut current, &mut observations)?,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"Cube" => {
                apply_cube(&e, &mut current, &mut observations)?
            }
            Ok(Event::Text(t)) => {
                if let Some(field) = text_field {
                    let value = t
                        .unescape()
                        .map_err(|e| ParseError::new(format!("text: {e}")))?
                        .trim()
                        .to_string();
                    if !value.is_empty() {
                        match field {
                            TextField::Subject => subject = Some(value),
                            TextField::Sender => sender = Some(value),
                        }
                    }
                }
            }
            Ok(Event::End(_)) => text_field = None,
            Ok(_) => {}
        }
    }

    if let Some(done) = current.take() {
        observations.push(done);
    }
    if observations.is_empty() {
        return Err(ParseError::new("no dated rate cubes in payload"));
    }

    Ok(CentralBankResponse {
        subject,
        sender,
        observations,
    })
}

pub struct EcbSource {
    client: reqwest::Client,
    base_url: String,
}

impl EcbSource {
    pub fn new(client: reqwest::Client, config: &EcbConfig) -> Self {
        EcbSource {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl RateSource for EcbSource {
    fn id(&self) -> ProviderId {
        ProviderId::Ecb
    }

    #[instrument(name = "EcbFetch", skip(self))]
    async fn fetch(&self) -> Result<ProviderResponse, CycleError> {
        let url = format!("{}/stats/eurofxref/eurofxref-daily.xml", self.base_url);
        let text = fetch_text(&self.client, &url, ProviderId::Ecb).await?;

        let response =
            parse_reference_rates_xml(&text).map_err(|e| CycleError::format(ProviderId::Ecb, e))?;
        debug!(
            observations = response.observations.len(),
            "Parsed ECB reference rates"
        );
        Ok(ProviderResponse::CentralBank(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::FailureKind;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DAILY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gesmes:Envelope xmlns:gesmes="http://www.gesmes.org/xml/2002-08-01" xmlns="http://www.ecb.int/vocabulary/2002-08-01/eurofxref">
	<gesmes:subject>Reference rates</gesmes:subject>
	<gesmes:Sender>
		<gesmes:name>European Central Bank</gesmes:name>
	</gesmes:Sender>
	<Cube>
		<Cube time='2024-03-05'>
			<Cube currency='USD' rate='1.0849'/>
			<Cube currency='JPY' rate='162.94'/>
			<Cube currency='CAD' rate='1.4720'/>
		</Cube>
	</Cube>
</gesmes:Envelope>"#;

    #[test]
    fn test_parse_daily_reference_rates() {
        let response = parse_reference_rates_xml(DAILY).unwrap();

        assert_eq!(response.subject.as_deref(), Some("Reference rates"));
        assert_eq!(response.sender.as_deref(), Some("European Central Bank"));
        assert_eq!(response.observations.len(), 1);

        let obs = &response.observations[0];
        assert_eq!(obs.date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert_eq!(obs.values.len(), 3);
        assert_eq!(obs.values["JPY"], 162.94);
    }

    #[test]
    fn test_parse_multiple_days() {
        let payload = r#"<Envelope><Cube>
            <Cube time="2024-03-05"><Cube currency="USD" rate="1.0849"/></Cube>
            <Cube time="2024-03-04"><Cube currency="USD" rate="1.0852"/></Cube>
        </Cube></Envelope>"#;
        let response = parse_reference_rates_xml(payload).unwrap();
        assert_eq!(response.observations.len(), 2);
        assert_eq!(response.observations[1].values["USD"], 1.0852);
    }

    #[test]
    fn test_parse_rejects_payload_without_rates() {
        let err = parse_reference_rates_xml("<Envelope><Cube></Cube></Envelope>").unwrap_err();
        assert!(err.to_string().contains("no dated rate cubes"));
    }

    #[test]
    fn test_parse_rejects_rate_outside_dated_cube() {
        let payload = r#"<Envelope><Cube><Cube currency="USD" rate="1.08"/></Cube></Envelope>"#;
        assert!(parse_reference_rates_xml(payload).is_err());
    }

    #[test]
    fn test_parse_rejects_bad_rate_and_time() {
        let bad_rate = DAILY.replace("162.94", "abc");
        assert!(parse_reference_rates_xml(&bad_rate).is_err());

        let bad_time = DAILY.replace("2024-03-05", "yesterday");
        assert!(parse_reference_rates_xml(&bad_time).is_err());
    }

    #[test]
    fn test_zero_rate_is_rejected_before_rebasing() {
        let payload = DAILY.replace("1.4720", "0");
        let response = ProviderResponse::CentralBank(parse_reference_rates_xml(&payload).unwrap());
        let err = response.snapshot().unwrap_err();
        assert!(err.to_string().contains("CAD"));
    }

    #[tokio::test]
    async fn test_fetch_from_mock_server() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stats/eurofxref/eurofxref-daily.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DAILY))
            .mount(&mock_server)
            .await;

        let config = EcbConfig {
            base_url: mock_server.uri(),
            interval_secs: 86400,
        };
        let source = EcbSource::new(reqwest::Client::new(), &config);
        let response = source.fetch().await.unwrap();
        assert!(matches!(response, ProviderResponse::CentralBank(ref r) if r.observations.len() == 1));
    }

    #[tokio::test]
    async fn test_fetch_json_instead_of_xml_is_format_failure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"rates":{}}"#))
            .mount(&mock_server)
            .await;

        let config = EcbConfig {
            base_url: mock_server.uri(),
            interval_secs: 86400,
        };
        let err = EcbSource::new(reqwest::Client::new(), &config)
            .fetch()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Format);
    }
}
