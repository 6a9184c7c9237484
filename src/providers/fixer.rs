use crate::core::error::{CycleError, ParseError};
use crate::core::rates::{JsonRateResponse, ProviderId, ProviderResponse};
use crate::core::source::RateSource;
use crate::providers::util::fetch_text;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Parses a Fixer `latest` payload. Structural problems are format errors;
/// a well-formed `success: false` is reported as the provider's own error.
pub fn parse_latest_json(text: &str) -> Result<JsonRateResponse, CycleError> {
    let response: JsonRateResponse = serde_json::from_str(text).map_err(|e| {
        CycleError::format(
            ProviderId::Fixer,
            ParseError::new(format!("invalid JSON rate response: {e}")),
        )
    })?;

    if !response.success {
        let (code, message) = match &response.error {
            Some(error) => (
                error.code,
                error
                    .info
                    .clone()
                    .or_else(|| error.kind.clone())
                    .unwrap_or_default(),
            ),
            None => (0, "request unsuccessful without error details".to_string()),
        };
        return Err(CycleError::Provider {
            provider: ProviderId::Fixer,
            code,
            message,
        });
    }

    Ok(response)
}

pub struct FixerSource {
    client: reqwest::Client,
    base_url: String,
    access_key: String,
}

impl FixerSource {
    pub fn new(client: reqwest::Client, base_url: &str, access_key: &str) -> Self {
        FixerSource {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_key: access_key.to_string(),
        }
    }
}

#[async_trait]
impl RateSource for FixerSource {
    fn id(&self) -> ProviderId {
        ProviderId::Fixer
    }

    #[instrument(name = "FixerFetch", skip(self))]
    async fn fetch(&self) -> Result<ProviderResponse, CycleError> {
        let url = format!("{}/api/latest?access_key={}", self.base_url, self.access_key);
        let text = fetch_text(&self.client, &url, ProviderId::Fixer).await?;

        let response = parse_latest_json(&text)?;
        debug!(rates = response.rates.len(), "Parsed Fixer rates");
        Ok(ProviderResponse::JsonRate(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::FailureKind;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SUCCESS: &str = r#"{"success":true,"timestamp":1000,"rates":{"EUR":1.0,"USD":1.1,"CAD":1.5}}"#;

    #[test]
    fn test_parse_success_payload() {
        let response = parse_latest_json(SUCCESS).unwrap();
        assert!(response.success);
        assert_eq!(response.timestamp, Some(1000));
        assert_eq!(response.rates.len(), 3);
        assert_eq!(response.rates["CAD"], 1.5);
        assert!(response.error.is_none());
    }

    #[test]
    fn test_parse_full_fixer_payload() {
        let payload = r#"{
            "success": true,
            "timestamp": 1519296206,
            "base": "EUR",
            "date": "2018-02-22",
            "rates": {"AUD": 1.566015, "CAD": 1.560132, "USD": 1.23396}
        }"#;
        let response = parse_latest_json(payload).unwrap();
        assert_eq!(response.base.as_deref(), Some("EUR"));
        assert_eq!(response.date.as_deref(), Some("2018-02-22"));
        assert_eq!(response.rates["USD"], 1.23396);
    }

    #[test]
    fn test_parse_unsuccessful_payload_surfaces_error() {
        let payload = r#"{"success":false,"error":{"code":101,"type":"invalid_access_key","info":"You have not supplied a valid API Access Key."}}"#;
        let err = parse_latest_json(payload).unwrap_err();

        assert_eq!(err.kind(), FailureKind::Provider);
        match err {
            CycleError::Provider { code, message, .. } => {
                assert_eq!(code, 101);
                assert_eq!(message, "You have not supplied a valid API Access Key.");
            }
            other => panic!("Expected provider error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_unsuccessful_payload_falls_back_to_error_type() {
        let payload = r#"{"success":false,"error":{"code":104,"type":"usage_limit_reached"}}"#;
        let err = parse_latest_json(payload).unwrap_err();
        assert!(err.to_string().contains("104"));
        assert!(err.to_string().contains("usage_limit_reached"));
    }

    #[test]
    fn test_parse_malformed_payload_is_format_failure() {
        for payload in ["", "not json", r#"{"rates":{"USD":1.1}}"#, r#"{"success":true,"rates":{"USD":"x"}}"#] {
            let err = parse_latest_json(payload).unwrap_err();
            assert_eq!(err.kind(), FailureKind::Format, "payload {payload:?}");
        }
    }

    #[test]
    fn test_zero_rate_is_rejected_before_rebasing() {
        let payload = r#"{"success":true,"timestamp":1000,"base":"EUR","rates":{"EUR":1.0,"USD":0.0}}"#;
        let response = ProviderResponse::JsonRate(parse_latest_json(payload).unwrap());
        let err = response.snapshot().unwrap_err();
        assert!(err.to_string().contains("USD"));
    }

    #[tokio::test]
    async fn test_fetch_sends_access_key() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/latest"))
            .and(query_param("access_key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SUCCESS))
            .expect(1)
            .mount(&mock_server)
            .await;

        let source = FixerSource::new(reqwest::Client::new(), &mock_server.uri(), "test-key");
        let response = source.fetch().await.unwrap();
        assert!(matches!(response, ProviderResponse::JsonRate(ref r) if r.rates.len() == 3));
    }
}
